// vectors.rs: In-memory word vectors with corpus counts.
//
// Vectors are L2-normalized once at construction, so cosine similarity is a plain dot product.

use std::collections::HashMap;

use crate::error::{HeaderError, Result};

/// Read-only vocabulary of words, their corpus counts and unit-length vectors.
#[derive(Debug, Clone)]
pub struct KeyedVectors {
    dim: usize,
    words: Vec<String>,
    counts: Vec<u64>,
    index: HashMap<String, usize>,
    // Row-major, `words.len() * dim`.
    vectors: Vec<f32>,
}

impl KeyedVectors {
    /// Build from `(word, count, vector)` entries. Later duplicates of a word are ignored.
    pub fn from_entries<I, S>(dim: usize, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, u64, Vec<f32>)>,
        S: Into<String>,
    {
        let entries = entries.into_iter();
        let (lower, _) = entries.size_hint();
        let mut kv = Self {
            dim,
            words: Vec::with_capacity(lower),
            counts: Vec::with_capacity(lower),
            index: HashMap::with_capacity(lower),
            vectors: Vec::new(),
        };

        for (word, count, vector) in entries {
            let word = word.into();
            if vector.len() != dim {
                return Err(HeaderError::ModelLoad(format!(
                    "vector for {word:?} has {} dims, expected {dim}",
                    vector.len()
                )));
            }
            if kv.index.contains_key(&word) {
                continue;
            }
            kv.index.insert(word.clone(), kv.words.len());
            kv.words.push(word);
            kv.counts.push(count);
            kv.vectors.extend(l2_normalize(vector));
        }

        Ok(kv)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Vocabulary in model order.
    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn contains(&self, word: &str) -> bool {
        self.index.contains_key(word)
    }

    /// Corpus frequency of `word`.
    pub fn count(&self, word: &str) -> Result<u64> {
        Ok(self.counts[self.lookup(word)?])
    }

    /// Unit-length vector of `word`.
    pub fn vector(&self, word: &str) -> Result<&[f32]> {
        Ok(self.row(self.lookup(word)?))
    }

    /// The `topn` vocabulary words closest to `word` by cosine similarity, excluding `word`.
    ///
    /// Highest similarity first; equal scores keep vocabulary order. Only vocabulary words
    /// can be queried: no vector is synthesized from character n-grams for unknown words.
    pub fn similar_by_word(&self, word: &str, topn: usize) -> Result<Vec<(String, f32)>> {
        let query = self.lookup(word)?;
        if topn == 0 {
            return Ok(Vec::new());
        }

        let q = self.row(query);
        let mut scored: Vec<(usize, f32)> = (0..self.words.len())
            .filter(|&i| i != query)
            .map(|i| (i, dot(q, self.row(i))))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(topn);

        Ok(scored
            .into_iter()
            .map(|(i, score)| (self.words[i].clone(), score))
            .collect())
    }

    /// Cosine similarity between two vocabulary words.
    pub fn similarity(&self, word_a: &str, word_b: &str) -> Result<f32> {
        let a = self.lookup(word_a)?;
        let b = self.lookup(word_b)?;
        Ok(dot(self.row(a), self.row(b)))
    }

    fn lookup(&self, word: &str) -> Result<usize> {
        self.index
            .get(word)
            .copied()
            .ok_or_else(|| HeaderError::KeyNotFound(word.to_string()))
    }

    fn row(&self, i: usize) -> &[f32] {
        &self.vectors[i * self.dim..(i + 1) * self.dim]
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Scale to unit length; zero vectors stay zero.
fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}
