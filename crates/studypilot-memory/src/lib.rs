pub mod embedding;
pub mod retriever;

pub use embedding::{EmbeddingProvider, OllamaEmbeddingProvider, StubEmbeddingProvider};
pub use retriever::{QdrantRetriever, Retriever, StaticRetriever};
