// file: src/api/mod.rs
// description: metadata service client module exports
// reference: internal module structure

pub mod cache;
pub mod client;
pub mod retry;

pub use cache::LookupCache;
pub use client::{LookupRecord, LookupResponse, MetadataClient, MetadataSource, parse_response};
pub use retry::RetryPolicy;
