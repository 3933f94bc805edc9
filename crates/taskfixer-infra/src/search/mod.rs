//! Web search backends.

pub mod duckduckgo;

pub use duckduckgo::DuckDuckGoSearch;
