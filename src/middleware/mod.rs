pub mod tracking;

pub use tracking::{track_requests, Tracker};
