//! # azservice Retry
//!
//! Bounded exponential-backoff retry shared by every azservice store call.
//!
//! A failed attempt is retried after `min(base_delay * (2^n - 1) / 2,
//! max_delay)` where `n` is the retry number, until `max_retries` retries
//! have been used; the last failure is then returned to the caller exactly
//! as the operation produced it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use azservice_retry::{RetryConfig, RetryExecutor};
//! use std::time::Duration;
//!
//! # async fn fetch() -> Result<String, std::io::Error> { Ok(String::new()) }
//! #[tokio::main]
//! async fn main() -> Result<(), std::io::Error> {
//!     let executor = RetryExecutor::new(RetryConfig::new(
//!         3,
//!         Duration::from_millis(100),
//!         Duration::from_secs(1),
//!     ));
//!
//!     let body = executor.run(|| fetch()).await?;
//!     println!("{}", body);
//!     Ok(())
//! }
//! ```

mod backoff;
mod config;
mod executor;

pub use backoff::BackoffState;
pub use config::{MAX_BACKOFF_EXPONENT, RetryConfig, RetryPolicySettings};
pub use executor::RetryExecutor;

pub use tokio_util::sync::CancellationToken;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::backoff::BackoffState;
    pub use crate::config::{RetryConfig, RetryPolicySettings};
    pub use crate::executor::RetryExecutor;
    pub use tokio_util::sync::CancellationToken;
}
