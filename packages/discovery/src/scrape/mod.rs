//! Scraper implementations.

mod http;

pub use http::HttpScraper;
