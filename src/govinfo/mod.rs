//! GovInfo request-execution core.
//!
//! Everything between a validated tool call and a normalised result:
//!
//! ```text
//!   RequestSpec ──▶ RateLimiter::acquire ──▶ HttpExecutor ──▶ normalize ──▶ Page / record / Content
//!                        ▲                        │
//!                        └──── retry + backoff ◀──┘
//! ```
//!
//! Failures at any stage surface as an [`ApiError`] value.

pub mod error;
pub mod executor;
pub mod normalize;
pub mod rate_limit;
pub mod request;
pub mod retry;

pub use error::{ApiError, ApiResult, ErrorKind};
pub use executor::{ExecutorOptions, HttpExecutor, RawResponse};
pub use normalize::{Content, ContentFormat, DateRange, ListingShape, Page, PartitionedPage};
pub use rate_limit::RateLimiter;
pub use request::{Method, RequestSpec};
pub use retry::{RetryPolicy, RetryState};
