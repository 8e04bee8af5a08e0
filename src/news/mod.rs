//! Fetching news for a place.
//!
//! - [`search`]: the upstream search API client and its trait seam
//! - [`fetcher`]: one category, one call, with keyword expansion
//! - [`scheduler`]: paced, sequential fan-out over every category

pub mod fetcher;
pub mod scheduler;
pub mod search;
