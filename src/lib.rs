//! # Local News Feed
//!
//! Turns a point on the map into a feed of local news.
//!
//! ## Architecture
//!
//! A load request flows through:
//! 1. **Admission**: [`guard::LoadGuard`] drops duplicate and repeated requests
//! 2. **Resolving**: [`geocode::GeocodeResolver`] maps the coordinate to a place name
//! 3. **Fetching**: [`news::scheduler::AggregationScheduler`] queries every
//!    category in turn, pausing between calls to respect the API rate limit
//! 4. **Deduplicating**: [`dedup::ArticleSet`] keeps the first copy of each story
//! 5. **Filtering**: [`filter::FilterCriteria`] narrows by category, age and text
//!
//! [`pipeline::NewsService`] ties these together behind a single `load`
//! operation.

pub mod cli;
pub mod config;
pub mod dedup;
pub mod error;
pub mod filter;
pub mod geocode;
pub mod guard;
pub mod models;
pub mod news;
pub mod output;
pub mod pipeline;
pub mod session;
pub mod utils;

pub use error::PipelineError;
pub use filter::FilterCriteria;
pub use models::{Article, Category, Coordinate, NewsFeed};
pub use pipeline::NewsService;
