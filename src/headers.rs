// headers.rs: Similar-header lookup on top of the fastText header vectors.
//
// Results of a similarity query are wrapped in `Header` records and sorted by the
// requested field (descending).

use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config;
use crate::embeddings::download::{self, HttpFetcher, ModelFetcher};
use crate::embeddings::fasttext;
use crate::embeddings::vectors::KeyedVectors;
use crate::error::{HeaderError, Result};

/// A header name similar to the queried one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    /// Cosine similarity to the queried header.
    pub score: f32,
    /// Occurrences in the training corpus.
    pub freq: u64,
}

/// Header fields a result list can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Name,
    Score,
    Freq,
}

impl SortField {
    pub const ALL: [SortField; 3] = [SortField::Name, SortField::Score, SortField::Freq];

    pub fn as_str(self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::Score => "score",
            SortField::Freq => "freq",
        }
    }

    /// Names accepted by `from_str`, in field order.
    pub fn field_names() -> Vec<&'static str> {
        Self::ALL.iter().map(|f| f.as_str()).collect()
    }

    /// Descending order on this field.
    fn compare_desc(self, a: &Header, b: &Header) -> Ordering {
        match self {
            SortField::Name => b.name.cmp(&a.name),
            SortField::Score => b.score.total_cmp(&a.score),
            SortField::Freq => b.freq.cmp(&a.freq),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = HeaderError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| {
                HeaderError::InvalidArgument(format!(
                    "sort_by must be one of {:?}, got {s:?}",
                    Self::field_names()
                ))
            })
    }
}

/// Finds dataset field names that are semantically close to a given header.
///
/// Construction makes sure the fastText header model is on disk (downloading it once
/// if needed) and loads it. Queries are read-only, so an analyzer can be shared across
/// threads.
#[derive(Debug)]
pub struct HeaderAnalyzer {
    model_path: Option<PathBuf>,
    vectors: KeyedVectors,
}

impl HeaderAnalyzer {
    /// Load the header model from `model_file` (or the default cache path), downloading
    /// it over HTTP when missing. `model_file` must end in `.bin.gz`.
    pub fn new(model_file: Option<&Path>) -> Result<Self> {
        Self::with_fetcher(model_file, &HttpFetcher::default())
    }

    pub fn with_fetcher(model_file: Option<&Path>, fetcher: &dyn ModelFetcher) -> Result<Self> {
        let path = download::resolve_model_path(model_file)?;
        let path = download::ensure_model_present(&path, fetcher)?;
        let vectors = fasttext::read_fasttext(&path)?;
        Ok(Self {
            model_path: Some(path),
            vectors,
        })
    }

    /// Wrap vectors that are already in memory.
    pub fn from_vectors(vectors: KeyedVectors) -> Self {
        Self {
            model_path: None,
            vectors,
        }
    }

    pub fn model_path(&self) -> Option<&Path> {
        self.model_path.as_deref()
    }

    pub fn vectors(&self) -> &KeyedVectors {
        &self.vectors
    }

    /// `topn` headers most similar to `word`, sorted descending by `sort_by`
    /// (`"name"`, `"score"` or `"freq"`).
    ///
    /// The candidate set is always the top `topn` by similarity; `sort_by` only
    /// reorders it. `word` must be in the model vocabulary (`KeyNotFound` otherwise);
    /// out-of-vocabulary headers are not approximated from their character n-grams.
    pub fn similar_by_word(&self, word: &str, topn: usize, sort_by: &str) -> Result<Vec<Header>> {
        let sort_by: SortField = sort_by.parse()?;

        let similar = self.vectors.similar_by_word(word, topn)?;
        let mut out = similar
            .into_iter()
            .map(|(name, score)| {
                let freq = self.vectors.count(&name)?;
                Ok(Header { name, score, freq })
            })
            .collect::<Result<Vec<_>>>()?;

        out.sort_by(|a, b| sort_by.compare_desc(a, b));

        log::debug!(
            "similar_by_word({word:?}, topn={topn}, sort_by={sort_by}) -> {} headers",
            out.len()
        );
        Ok(out)
    }

    /// `similar_by_word` with the default top-n and score ordering.
    pub fn similar_headers(&self, word: &str) -> Result<Vec<Header>> {
        self.similar_by_word(word, config::query::DEFAULT_TOPN, config::query::DEFAULT_SORT_BY)
    }

    /// Cosine similarity between two known header names.
    pub fn similarity(&self, word_a: &str, word_b: &str) -> Result<f32> {
        self.vectors.similarity(word_a, word_b)
    }
}
