/// Errors returned by [`ConnectionManager`](crate::ConnectionManager) operations.
///
/// Transport failures are not errors from the caller's point of view; they
/// surface as `retrying` and, once the retry budget is spent, `error` statuses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RealtimeError {
    #[error("connection manager has been closed")]
    Closed,
    #[error("connection runtime is no longer running")]
    RuntimeStopped,
}
