// file: src/rewrite/mod.rs
// description: document rewriting module exports
// reference: internal module structure

pub mod replacement;
pub mod rewriter;
pub mod url;

pub use replacement::{ReplacementEngine, match_case};
pub use rewriter::{DocumentRewriter, UpdateResult};
pub use url::{build_target_url, sanitize_fragment};
