// fasttext.rs: Reader for gzip-compressed Facebook fastText binaries (.bin.gz).
//
// Only the parts needed for word vectors are parsed: training args, dictionary and the
// dense input matrix. The output matrix is never read.
//
// Word vector = mean of the word's own input row and the rows of its character n-grams,
// the same way fastText's getWordVector computes it.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::config::fasttext as ft;
use crate::embeddings::vectors::KeyedVectors;
use crate::error::{HeaderError, Result};

/// Subset of fastText training args that affect word vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct FastTextArgs {
    pub dim: usize,
    pub model: i32,
    pub bucket: usize,
    pub minn: usize,
    pub maxn: usize,
}

/// Load a `.bin.gz` fastText model from disk.
pub fn read_fasttext(path: &Path) -> Result<KeyedVectors> {
    let file = File::open(path)
        .map_err(|e| HeaderError::io(format!("failed to open model {}", path.display()), e))?;
    log::info!("Loading header model from {}", path.display());

    let kv = read_fasttext_from(GzDecoder::new(BufReader::new(file)))?;

    log::info!("Header model loaded (words={}, dims={})", kv.len(), kv.dim());
    Ok(kv)
}

/// Parse a fastText binary from an already-decompressed byte stream.
pub fn read_fasttext_from<R: Read>(reader: R) -> Result<KeyedVectors> {
    let mut r = ModelReader { inner: reader };

    let magic = r.i32()?;
    if magic != ft::MAGIC {
        return Err(HeaderError::ModelLoad(format!(
            "not a fastText binary (magic {magic})"
        )));
    }
    let version = r.i32()?;
    if version > ft::MAX_VERSION {
        return Err(HeaderError::ModelLoad(format!(
            "unsupported fastText version {version}"
        )));
    }

    let mut args = r.args()?;
    if version == ft::LEGACY_VERSION && args.model == ft::MODEL_SUPERVISED {
        args.maxn = 0;
    }

    let dict = r.dictionary()?;

    let quantized = r.u8()? != 0;
    if quantized {
        return Err(HeaderError::ModelLoad(
            "quantized fastText models are not supported".to_string(),
        ));
    }

    let rows = r.len_i64("matrix rows")?;
    let cols = r.len_i64("matrix cols")?;
    if cols != args.dim || rows != dict.words.len() + args.bucket {
        return Err(HeaderError::ModelLoad(format!(
            "input matrix is {rows}x{cols}, expected {}x{}",
            dict.words.len() + args.bucket,
            args.dim
        )));
    }
    let len = matrix_len(rows, cols)?;
    let matrix = r.f32s(len)?;

    log::debug!(
        "fastText v{version}: dim={} bucket={} minn={} maxn={} nwords={}",
        args.dim,
        args.bucket,
        args.minn,
        args.maxn,
        dict.words.len()
    );

    let nwords = dict.words.len();
    let entries = dict.words.into_iter().enumerate().map(|(id, (word, count))| {
        let mut ids = vec![id];
        ids.extend(subword_ids(&word, &args, nwords, dict.pruneidx.as_ref()));
        let vector = mean_rows(&matrix, args.dim, &ids);
        (word, count, vector)
    });

    KeyedVectors::from_entries(args.dim, entries)
}

struct Dictionary {
    // Words only (labels dropped), in model order, with corpus counts.
    words: Vec<(String, u64)>,
    // None when pruning is disabled (pruneidx_size < 0).
    pruneidx: Option<HashMap<i32, i32>>,
}

struct ModelReader<R> {
    inner: R,
}

impl<R: Read> ModelReader<R> {
    fn bytes<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf).map_err(truncated)?;
        Ok(buf)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes::<1>()?[0])
    }

    fn i8(&mut self) -> Result<i8> {
        Ok(i8::from_le_bytes(self.bytes()?))
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.bytes()?))
    }

    fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.bytes()?))
    }

    fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.bytes()?))
    }

    fn len_i32(&mut self, what: &str) -> Result<usize> {
        let v = self.i32()?;
        usize::try_from(v).map_err(|_| HeaderError::ModelLoad(format!("negative {what}: {v}")))
    }

    fn len_i64(&mut self, what: &str) -> Result<usize> {
        let v = self.i64()?;
        usize::try_from(v).map_err(|_| HeaderError::ModelLoad(format!("invalid {what}: {v}")))
    }

    fn args(&mut self) -> Result<FastTextArgs> {
        let dim = self.len_i32("dim")?;
        let _ws = self.i32()?;
        let _epoch = self.i32()?;
        let _min_count = self.i32()?;
        let _neg = self.i32()?;
        let _word_ngrams = self.i32()?;
        let _loss = self.i32()?;
        let model = self.i32()?;
        let bucket = self.len_i32("bucket")?;
        let minn = self.len_i32("minn")?;
        let maxn = self.len_i32("maxn")?;
        let _lr_update_rate = self.i32()?;
        let _t = self.f64()?;
        Ok(FastTextArgs {
            dim,
            model,
            bucket,
            minn,
            maxn,
        })
    }

    fn dictionary(&mut self) -> Result<Dictionary> {
        let size = self.len_i32("dictionary size")?;
        let nwords = self.len_i32("word count")?;
        let _nlabels = self.i32()?;
        let _ntokens = self.i64()?;
        let pruneidx_size = self.i64()?;

        // Counts come from the file; grow as entries are actually read.
        let mut words = Vec::new();
        for _ in 0..size {
            let word = self.cstring()?;
            let count = self.i64()?;
            let entry_type = self.i8()?;
            if entry_type == ft::ENTRY_WORD {
                words.push((word, count.max(0) as u64));
            }
        }
        if words.len() != nwords {
            return Err(HeaderError::ModelLoad(format!(
                "dictionary declares {nwords} words, found {}",
                words.len()
            )));
        }

        let pruneidx = if pruneidx_size < 0 {
            None
        } else {
            let mut map = HashMap::new();
            for _ in 0..pruneidx_size {
                let first = self.i32()?;
                let second = self.i32()?;
                map.insert(first, second);
            }
            Some(map)
        };

        Ok(Dictionary { words, pruneidx })
    }

    fn cstring(&mut self) -> Result<String> {
        let mut buf = Vec::new();
        loop {
            match self.u8()? {
                0 => break,
                b => buf.push(b),
            }
        }
        String::from_utf8(buf)
            .map_err(|e| HeaderError::ModelLoad(format!("dictionary word is not UTF-8: {e}")))
    }

    fn f32s(&mut self, n: usize) -> Result<Vec<f32>> {
        // Chunked so the raw bytes never exist alongside the whole matrix, and so a
        // corrupt header cannot reserve memory the stream does not back.
        const CHUNK_FLOATS: usize = 16 * 1024;
        let mut out: Vec<f32> = Vec::new();
        let mut raw = vec![0u8; CHUNK_FLOATS.min(n) * 4];
        while out.len() < n {
            let take = CHUNK_FLOATS.min(n - out.len());
            let buf = &mut raw[..take * 4];
            self.inner.read_exact(buf).map_err(truncated)?;
            out.try_reserve(take).map_err(|e| {
                HeaderError::ModelLoad(format!("cannot allocate input matrix: {e}"))
            })?;
            out.extend(
                buf.chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])),
            );
        }
        Ok(out)
    }
}

/// Number of floats in a `rows x cols` matrix, rejecting shapes no allocation can hold.
fn matrix_len(rows: usize, cols: usize) -> Result<usize> {
    rows.checked_mul(cols)
        .filter(|n| n.checked_mul(4).is_some_and(|bytes| bytes <= isize::MAX as usize))
        .ok_or_else(|| HeaderError::ModelLoad(format!("input matrix {rows}x{cols} is too large")))
}

fn truncated(e: std::io::Error) -> HeaderError {
    HeaderError::ModelLoad(format!("truncated or corrupt model data: {e}"))
}

/// fastText's FNV-1a variant: bytes are sign-extended before xor.
pub(crate) fn hash(s: &[u8]) -> u32 {
    s.iter().fold(ft::FNV_OFFSET_BASIS, |h, &b| {
        (h ^ (b as i8 as i32 as u32)).wrapping_mul(ft::FNV_PRIME)
    })
}

/// Input-matrix rows of the character n-grams of `<word>`.
fn subword_ids(
    word: &str,
    args: &FastTextArgs,
    nwords: usize,
    pruneidx: Option<&HashMap<i32, i32>>,
) -> Vec<usize> {
    if args.maxn == 0 || args.bucket == 0 {
        return Vec::new();
    }

    let mut ids = Vec::new();
    for ngram in char_ngrams(word, args.minn, args.maxn) {
        let h = (hash(ngram.as_bytes()) % args.bucket as u32) as i32;
        let id = match pruneidx {
            None => h,
            Some(map) => match map.get(&h) {
                Some(&mapped) => mapped,
                None => continue,
            },
        };
        if id >= 0 {
            ids.push(nwords + id as usize);
        }
    }
    ids
}

/// Character n-grams of `<word>` with lengths `minn..=maxn`, skipping the bare
/// boundary markers.
pub(crate) fn char_ngrams(word: &str, minn: usize, maxn: usize) -> Vec<String> {
    let bracketed: Vec<char> = format!("<{word}>").chars().collect();
    let len = bracketed.len();

    let mut out = Vec::new();
    for start in 0..len {
        for n in 1..=maxn {
            let end = start + n;
            if end > len {
                break;
            }
            if n < minn || (n == 1 && (start == 0 || end == len)) {
                continue;
            }
            out.push(bracketed[start..end].iter().collect());
        }
    }
    out
}

fn mean_rows(matrix: &[f32], dim: usize, rows: &[usize]) -> Vec<f32> {
    let mut v = vec![0.0f32; dim];
    for &row in rows {
        let src = &matrix[row * dim..(row + 1) * dim];
        v.iter_mut().zip(src).for_each(|(acc, x)| *acc += x);
    }
    let n = rows.len() as f32;
    v.iter_mut().for_each(|x| *x /= n);
    v
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;

    /// Description of a synthetic model used to produce fastText binaries in tests.
    pub(crate) struct TestModel {
        pub version: i32,
        pub dim: usize,
        pub bucket: usize,
        pub minn: i32,
        pub maxn: i32,
        pub quantized: bool,
        /// (entry, count, type)
        pub entries: Vec<(&'static str, i64, i8)>,
        pub pruneidx: Option<Vec<(i32, i32)>>,
        /// `nwords + bucket` rows of `dim` floats.
        pub rows: Vec<Vec<f32>>,
    }

    impl TestModel {
        /// Model without subwords: the word rows are the word vectors.
        pub(crate) fn plain(dim: usize, words: Vec<(&'static str, i64, Vec<f32>)>) -> Self {
            Self {
                version: ft::MAX_VERSION,
                dim,
                bucket: 0,
                minn: 0,
                maxn: 0,
                quantized: false,
                entries: words.iter().map(|(w, c, _)| (*w, *c, 0)).collect(),
                pruneidx: None,
                rows: words.into_iter().map(|(_, _, v)| v).collect(),
            }
        }

        pub(crate) fn to_bytes(&self) -> Vec<u8> {
            let mut b = Vec::new();
            b.extend(ft::MAGIC.to_le_bytes());
            b.extend(self.version.to_le_bytes());
            // dim ws epoch minCount neg wordNgrams loss model bucket minn maxn lrUpdateRate
            for v in [self.dim as i32, 5, 5, 1, 5, 1, 2, 1, self.bucket as i32, self.minn, self.maxn, 100] {
                b.extend(v.to_le_bytes());
            }
            b.extend(1e-4f64.to_le_bytes());

            let nwords = self.entries.iter().filter(|e| e.2 == 0).count() as i32;
            let nlabels = self.entries.len() as i32 - nwords;
            b.extend((self.entries.len() as i32).to_le_bytes());
            b.extend(nwords.to_le_bytes());
            b.extend(nlabels.to_le_bytes());
            b.extend(1000i64.to_le_bytes());
            let prune_len = self.pruneidx.as_ref().map_or(-1, |p| p.len() as i64);
            b.extend(prune_len.to_le_bytes());
            for (word, count, kind) in &self.entries {
                b.extend(word.as_bytes());
                b.push(0);
                b.extend(count.to_le_bytes());
                b.push(*kind as u8);
            }
            for (k, v) in self.pruneidx.iter().flatten() {
                b.extend(k.to_le_bytes());
                b.extend(v.to_le_bytes());
            }

            b.push(self.quantized as u8);
            b.extend((self.rows.len() as i64).to_le_bytes());
            b.extend((self.dim as i64).to_le_bytes());
            for row in &self.rows {
                for x in row {
                    b.extend(x.to_le_bytes());
                }
            }
            b
        }

        pub(crate) fn to_gz(&self) -> Vec<u8> {
            let mut enc = GzEncoder::new(Vec::new(), Compression::fast());
            enc.write_all(&self.to_bytes()).unwrap();
            enc.finish().unwrap()
        }
    }

    #[test]
    fn test_hash_matches_fnv1a() {
        assert_eq!(hash(b""), 2_166_136_261);
        assert_eq!(hash(b"a"), 0xe40c_292c);
    }

    #[test]
    fn test_hash_sign_extends_non_ascii() {
        // 0xC3 as i8 is negative, so the xor uses 0xFFFFFFC3.
        let expected = (ft::FNV_OFFSET_BASIS ^ 0xFFFF_FFC3).wrapping_mul(ft::FNV_PRIME);
        assert_eq!(hash(&[0xC3]), expected);
    }

    #[test]
    fn test_char_ngrams() {
        assert_eq!(char_ngrams("ab", 3, 3), vec!["<ab", "ab>"]);
        assert_eq!(char_ngrams("ab", 1, 2), vec!["<a", "a", "ab", "b", "b>"]);
        // Multi-byte characters count as one.
        assert_eq!(char_ngrams("é", 2, 2), vec!["<é", "é>"]);
    }

    #[test]
    fn test_reads_plain_model() {
        let model = TestModel::plain(
            2,
            vec![("email", 500, vec![3.0, 0.0]), ("mail", 900, vec![0.0, 2.0])],
        );
        let kv = read_fasttext_from(model.to_bytes().as_slice()).unwrap();

        assert_eq!(kv.dim(), 2);
        assert_eq!(kv.words(), &["email".to_string(), "mail".to_string()]);
        assert_eq!(kv.count("mail").unwrap(), 900);
        assert!(kv.similarity("email", "mail").unwrap().abs() < 1e-6);
    }

    #[test]
    fn test_labels_are_not_vocabulary() {
        let mut model = TestModel::plain(1, vec![("zip", 4, vec![1.0])]);
        model.entries.push(("__label__x", 2, 1));
        let kv = read_fasttext_from(model.to_bytes().as_slice()).unwrap();
        assert_eq!(kv.len(), 1);
        assert!(!kv.contains("__label__x"));
    }

    #[test]
    fn test_word_vector_averages_subword_rows() {
        let bucket = 7;
        let mut rows = vec![vec![1.0, 0.0]];
        for i in 0..bucket {
            rows.push(vec![0.0, (i + 1) as f32]);
        }
        let model = TestModel {
            version: ft::MAX_VERSION,
            dim: 2,
            bucket,
            minn: 3,
            maxn: 3,
            quantized: false,
            entries: vec![("ab", 10, 0)],
            pruneidx: None,
            rows: rows.clone(),
        };

        let args = FastTextArgs { dim: 2, model: 1, bucket, minn: 3, maxn: 3 };
        let ids = subword_ids("ab", &args, 1, None);
        // "<ab" and "ab>"
        assert_eq!(ids.len(), 2);
        let mut all = vec![0];
        all.extend(&ids);
        let expected = mean_rows(&rows.concat(), 2, &all);
        let norm = expected.iter().map(|x| x * x).sum::<f32>().sqrt();

        let kv = read_fasttext_from(model.to_bytes().as_slice()).unwrap();
        let got = kv.vector("ab").unwrap();
        for (g, e) in got.iter().zip(&expected) {
            assert!((g - e / norm).abs() < 1e-6);
        }
    }

    #[test]
    fn test_pruned_ngrams_are_skipped() {
        let args = FastTextArgs { dim: 1, model: 1, bucket: 5, minn: 3, maxn: 3 };
        let empty = HashMap::new();
        assert!(subword_ids("ab", &args, 1, Some(&empty)).is_empty());

        let h = (hash(b"<ab") % 5) as i32;
        let map = HashMap::from([(h, 0)]);
        assert_eq!(subword_ids("ab", &args, 1, Some(&map)), vec![1]);
    }

    #[test]
    fn test_legacy_supervised_model_ignores_ngrams() {
        let mut model = TestModel::plain(1, vec![("a", 1, vec![2.0])]);
        model.version = ft::LEGACY_VERSION;
        model.bucket = 2;
        model.minn = 1;
        model.maxn = 2;
        model.rows.extend([vec![-5.0], vec![-5.0]]);
        let mut bytes = model.to_bytes();
        // Patch args.model (8th i32 after magic+version) to supervised.
        let offset = 8 + 7 * 4;
        bytes[offset..offset + 4].copy_from_slice(&ft::MODEL_SUPERVISED.to_le_bytes());

        let kv = read_fasttext_from(bytes.as_slice()).unwrap();
        assert_eq!(kv.vector("a").unwrap(), &[1.0f32]);
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = TestModel::plain(1, vec![("a", 1, vec![1.0])]).to_bytes();
        bytes[0] ^= 0xFF;
        let err = read_fasttext_from(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, HeaderError::ModelLoad(_)), "{err}");
    }

    #[test]
    fn test_rejects_quantized() {
        let mut model = TestModel::plain(1, vec![("a", 1, vec![1.0])]);
        model.quantized = true;
        let err = read_fasttext_from(model.to_bytes().as_slice()).unwrap_err();
        assert!(err.to_string().contains("quantized"));
    }

    /// Header of a one-word model whose dim/bucket claim `dim x (1 + bucket)` floats,
    /// followed by no matrix data at all.
    fn oversized_header(dim: usize, bucket: usize) -> Vec<u8> {
        let mut model = TestModel::plain(1, vec![("a", 1, vec![1.0])]);
        model.dim = dim;
        model.bucket = bucket;
        model.rows.clear();
        let mut bytes = model.to_bytes();
        let rows_at = bytes.len() - 16;
        bytes[rows_at..rows_at + 8].copy_from_slice(&((1 + bucket) as i64).to_le_bytes());
        bytes
    }

    #[test]
    fn test_huge_matrix_shape_is_load_error() {
        let max = i32::MAX as usize;
        let err = read_fasttext_from(oversized_header(max, max).as_slice()).unwrap_err();
        assert!(err.to_string().contains("too large"), "{err}");

        // Allocatable on paper, but the stream ends right away.
        let err = read_fasttext_from(oversized_header(1000, max).as_slice()).unwrap_err();
        assert!(matches!(err, HeaderError::ModelLoad(_)), "{err}");
    }

    #[test]
    fn test_matrix_len_bounds() {
        assert_eq!(matrix_len(3, 4).unwrap(), 12);
        assert!(matrix_len(usize::MAX, 2).is_err());
        assert!(matrix_len(isize::MAX as usize / 2, 1).is_err());
    }

    #[test]
    fn test_out_of_vocabulary_word_is_key_not_found() {
        // n-gram rows exist, but only vocabulary words are answerable.
        let model = TestModel {
            version: ft::MAX_VERSION,
            dim: 1,
            bucket: 3,
            minn: 2,
            maxn: 3,
            quantized: false,
            entries: vec![("zip", 5, 0)],
            pruneidx: None,
            rows: vec![vec![1.0], vec![0.5], vec![0.25], vec![0.125]],
        };
        let kv = read_fasttext_from(model.to_bytes().as_slice()).unwrap();
        assert!(kv.contains("zip"));
        assert!(kv.similar_by_word("zipcode", 1).unwrap_err().is_key_not_found());
    }

    #[test]
    fn test_rejects_truncated() {
        let bytes = TestModel::plain(2, vec![("a", 1, vec![1.0, 2.0])]).to_bytes();
        let err = read_fasttext_from(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, HeaderError::ModelLoad(_)));
    }

    #[test]
    fn test_read_fasttext_from_gz_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("m.bin.gz");
        let model = TestModel::plain(1, vec![("a", 3, vec![1.0]), ("b", 4, vec![-1.0])]);
        std::fs::write(&path, model.to_gz()).unwrap();

        let kv = read_fasttext(&path).unwrap();
        assert_eq!(kv.len(), 2);
        assert_eq!(kv.count("b").unwrap(), 4);
    }

    #[test]
    fn test_non_gzip_file_is_model_load_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("m.bin.gz");
        std::fs::write(&path, b"this is not gzip").unwrap();
        let err = read_fasttext(&path).unwrap_err();
        assert!(matches!(err, HeaderError::ModelLoad(_)), "{err}");
    }
}
