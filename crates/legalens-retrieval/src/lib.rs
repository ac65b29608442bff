pub mod embed;
pub mod qdrant;

pub use embed::{Embedder, OpenAiEmbedder};
pub use qdrant::QdrantIndex;
