//! Vector index access.
//!
//! `VectorIndex` is the seam the RAG pipeline queries through; the managed
//! Pinecone index is the production implementation.

mod pinecone;

use async_trait::async_trait;

use crate::core::errors::ApiError;
use crate::ranking::RawMatch;

pub use pinecone::PineconeIndex;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Backend name for logs and status output.
    fn name(&self) -> &str;

    /// Nearest neighbours of `vector`, metadata included, best first.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RawMatch>, ApiError>;
}
