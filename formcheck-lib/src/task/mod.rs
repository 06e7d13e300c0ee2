//! Cancellable asynchronous work.

mod cancel;

pub use cancel::{CancelHandle, Cancellable, Cancelled};
