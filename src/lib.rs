//! Semantic category matching.
//!
//! Documents and queries are turned into averaged word-embedding vectors;
//! each category gets a reference vector, and a query resolves to the
//! category with the highest cosine similarity. A keyword table covers
//! queries the embeddings cannot place, and a separate fuzzy intent matcher
//! handles conversational phrases.

pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod error;
pub mod fuzzy;
pub mod intent;
pub mod matcher;
pub mod reference;
pub mod splitter;
pub mod tokenizer;
pub mod vectorizer;

pub use error::{CategorizerError, Diagnostic, Result};
