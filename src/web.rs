//! Web search.
//!
//! - [`BingSearchTool`] - The `bing_search` tool
//! - [`SearchProvider`] - Trait for search backends
//! - [`BingSearchProvider`] - Bing Web Search v7 integration
//!
//! # Example
//!
//! ```ignore
//! use tasuku::web::{BingSearchProvider, BingSearchTool};
//!
//! let provider = BingSearchProvider::new(Some(api_key));
//! tools.register(BingSearchTool::new(provider));
//! ```

pub mod provider;
pub mod search;

pub use provider::{BingSearchProvider, SearchProvider, SearchResponse, SearchResult};
pub use search::{BingSearchTool, ResponseSize};
