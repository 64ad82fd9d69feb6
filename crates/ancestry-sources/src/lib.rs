//! HTTP-backed [`ancestry_core::sources::SourceAdapter`] implementations
//! (§4.2, §6.4): a civil/parish registration-index client and a
//! genealogy-tree API client, both built on
//! [`ancestry_foundation::http::HttpClient`] and retried with
//! [`ancestry_foundation::retry::with_backoff`] — the same building blocks
//! the workspace's package-loading code uses to talk to its registry.

pub mod civil_index;
pub mod rate_limit;
pub mod tree_api;

pub use civil_index::CivilIndexAdapter;
pub use rate_limit::RateLimiter;
pub use tree_api::TreeApiAdapter;
