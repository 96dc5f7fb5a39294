// embeddings/: Pretrained fastText header vectors.
//
// Provides:
// - Lazy model download to a local cache path
// - fastText .bin.gz reader
// - In-memory keyed vectors with cosine similarity queries

pub mod download;
pub mod fasttext;
pub mod vectors;
