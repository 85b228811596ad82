//! Per-request annotation store.
//!
//! Application code running inside a tracked request can attach ad-hoc
//! key/value pairs that end up in the `meta` field of that request's
//! [`TrackingRecord`](crate::TrackingRecord):
//!
//! ```ignore
//! request_tracker::context::put("tenant", "acme");
//! ```
//!
//! Storage lives in a tokio task-local opened by the middleware for each
//! request, so two requests never see each other's annotations even when
//! they run on the same worker thread.  Tasks spawned from a handler do not
//! inherit the scope; writes made there are dropped.

use std::cell::RefCell;
use std::future::Future;

use serde_json::{Map, Value};
use tracing::trace;

tokio::task_local! {
    static REQUEST_META: RefCell<Map<String, Value>>;
}

/// Run `fut` with a fresh, empty annotation store.
///
/// The store is dropped together with the future, whether it completes,
/// panics or is cancelled.
pub async fn scope<F>(fut: F) -> F::Output
where
    F: Future,
{
    REQUEST_META.scope(RefCell::new(Map::new()), fut).await
}

/// Returns true when called from inside a request scope.
pub fn is_active() -> bool {
    REQUEST_META.try_with(|_| ()).is_ok()
}

pub fn put(key: impl Into<String>, value: impl Into<Value>) {
    let key = key.into();
    let value = value.into();
    if REQUEST_META
        .try_with(|meta| meta.borrow_mut().insert(key.clone(), value))
        .is_err()
    {
        trace!(key = %key, "tracking meta written outside a request scope; dropped");
    }
}

pub fn remove(key: &str) {
    let _ = REQUEST_META.try_with(|meta| meta.borrow_mut().remove(key));
}

pub fn clear() {
    let _ = REQUEST_META.try_with(|meta| meta.borrow_mut().clear());
}

/// Copy of the current annotations, or `None` when nothing was recorded
/// (or when called outside a request scope).
pub fn snapshot() -> Option<Map<String, Value>> {
    REQUEST_META
        .try_with(|meta| {
            let meta = meta.borrow();
            if meta.is_empty() {
                None
            } else {
                Some(meta.clone())
            }
        })
        .ok()
        .flatten()
}
