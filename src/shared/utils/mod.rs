pub mod keyed_lock;
pub mod retry;

pub use keyed_lock::{KeyGuard, KeyedLocks};
pub use retry::{retry_with_backoff, with_storage_retry, RetryConfig};
