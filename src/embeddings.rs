use crate::error::{CategorizerError, Result};
use crate::vectorizer::cosine_similarity;
use csv::{ReaderBuilder, StringRecord};
use log::{info, warn};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Maps a word to its embedding.
///
/// Every vector a provider hands out has the same length, reported by
/// [`EmbeddingProvider::dimension`]. Providers are read-only and may be
/// shared between worker threads.
pub trait EmbeddingProvider: Send + Sync {
    fn lookup(&self, word: &str) -> Option<&[f32]>;

    fn dimension(&self) -> usize;
}

/// In-memory word vectors, stored row-major in one flat buffer.
#[derive(Debug, Clone)]
pub struct WordVectors {
    dimension: usize,
    words: Vec<String>,
    index: HashMap<String, usize>,
    data: Vec<f32>,
}

impl WordVectors {
    /// Builds a table from `(word, vector)` pairs. All vectors must share
    /// one non-zero length; a repeated word keeps its first vector.
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Vec<f32>)>,
    {
        let mut table = WordVectors::empty();
        for (word, vector) in entries {
            table.push(word, vector)?;
        }
        Ok(table)
    }

    /// Loads a word2vec text file: an optional `count dim` header line,
    /// then one `word v1 v2 ... vn` line per word.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| CategorizerError::source_unavailable(path, format!("open failed: {}", e)))?;
        let vectors = Self::from_reader(file, path)?;
        info!(
            "Loaded {} word vectors ({} dims) from {}",
            vectors.len(),
            vectors.dimension,
            path.display()
        );
        Ok(vectors)
    }

    pub fn from_reader<R: Read>(reader: R, origin: &Path) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b' ')
            .flexible(true)
            .quoting(false)
            .from_reader(reader);

        let mut table = WordVectors::empty();
        let mut declared_dimension: Option<usize> = None;
        let mut record = StringRecord::new();
        let mut first = true;

        loop {
            let has_record = reader.read_record(&mut record).map_err(|e| {
                CategorizerError::source_unavailable(origin, format!("read failed: {}", e))
            })?;
            if !has_record {
                break;
            }
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let fields: Vec<&str> = record.iter().filter(|f| !f.is_empty()).collect();
            if fields.is_empty() {
                continue;
            }

            if first {
                first = false;
                if let Some(dim) = parse_header(&fields) {
                    declared_dimension = Some(dim);
                    continue;
                }
            }

            let (word, values) = fields.split_first().ok_or_else(|| {
                CategorizerError::source_unavailable(origin, format!("line {}: empty entry", line))
            })?;
            let vector = values
                .iter()
                .map(|v| v.parse::<f32>())
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| {
                    CategorizerError::source_unavailable(
                        origin,
                        format!("line {}: bad number for '{}': {}", line, word, e),
                    )
                })?;

            if let Some(dim) = declared_dimension {
                if vector.len() != dim {
                    return Err(CategorizerError::source_unavailable(
                        origin,
                        format!(
                            "line {}: '{}' has {} values, header declares {}",
                            line,
                            word,
                            vector.len(),
                            dim
                        ),
                    ));
                }
            }

            table.push(word.to_string(), vector).map_err(|e| {
                CategorizerError::source_unavailable(origin, format!("line {}: {}", line, e))
            })?;
        }

        if table.is_empty() {
            return Err(CategorizerError::source_unavailable(
                origin,
                "no word vectors found",
            ));
        }
        Ok(table)
    }

    fn empty() -> Self {
        WordVectors {
            dimension: 0,
            words: Vec::new(),
            index: HashMap::new(),
            data: Vec::new(),
        }
    }

    fn push(&mut self, word: String, vector: Vec<f32>) -> Result<()> {
        if vector.is_empty() {
            return Err(CategorizerError::DimensionMismatch {
                category: word,
                expected: self.dimension.max(1),
                found: 0,
            });
        }
        if self.words.is_empty() {
            self.dimension = vector.len();
        } else if vector.len() != self.dimension {
            return Err(CategorizerError::DimensionMismatch {
                category: word,
                expected: self.dimension,
                found: vector.len(),
            });
        }
        if self.index.contains_key(&word) {
            warn!("Duplicate word vector for '{}' ignored", word);
            return Ok(());
        }
        self.index.insert(word.clone(), self.words.len());
        self.words.push(word);
        self.data.extend_from_slice(&vector);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn row(&self, slot: usize) -> &[f32] {
        let start = slot * self.dimension;
        &self.data[start..start + self.dimension]
    }

    /// The `topn` vocabulary words closest to `vector` by cosine similarity,
    /// best first. Ties keep vocabulary order.
    pub fn nearest_words(&self, vector: &[f32], topn: usize) -> Vec<(String, f64)> {
        if vector.len() != self.dimension {
            return Vec::new();
        }
        let mut scored: Vec<(usize, f64)> = (0..self.words.len())
            .filter_map(|slot| cosine_similarity(vector, self.row(slot)).map(|s| (slot, s)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
            .into_iter()
            .take(topn)
            .map(|(slot, score)| (self.words[slot].clone(), score))
            .collect()
    }
}

impl EmbeddingProvider for WordVectors {
    fn lookup(&self, word: &str) -> Option<&[f32]> {
        self.index.get(word).map(|&slot| self.row(slot))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn parse_header(fields: &[&str]) -> Option<usize> {
    match fields {
        [count, dim] => {
            count.parse::<usize>().ok()?;
            dim.parse::<usize>().ok().filter(|d| *d > 0)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn origin() -> PathBuf {
        PathBuf::from("inline.vec")
    }

    #[test]
    fn loads_text_format_with_header() {
        let text = "3 2\nhead 1.0 0.5\nache 0.25 -1\nfungus -0.5 2.0 \n";
        let vectors = WordVectors::from_reader(text.as_bytes(), &origin()).unwrap();
        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors.dimension(), 2);
        assert_eq!(vectors.lookup("ache"), Some(&[0.25f32, -1.0][..]));
        assert_eq!(vectors.lookup("fungus"), Some(&[-0.5f32, 2.0][..]));
        assert!(vectors.lookup("missing").is_none());
    }

    #[test]
    fn header_is_optional() {
        let text = "skin 1 2 3\nnail 4 5 6\n";
        let vectors = WordVectors::from_reader(text.as_bytes(), &origin()).unwrap();
        assert_eq!(vectors.dimension(), 3);
        assert_eq!(vectors.len(), 2);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let text = "skin 1 2 3\nnail 4 5\n";
        let err = WordVectors::from_reader(text.as_bytes(), &origin()).unwrap_err();
        assert!(matches!(err, CategorizerError::SourceUnavailable { .. }));
    }

    #[test]
    fn header_dimension_is_enforced() {
        let text = "1 4\nskin 1 2 3\n";
        let err = WordVectors::from_reader(text.as_bytes(), &origin()).unwrap_err();
        assert!(err.to_string().contains("header declares 4"));
    }

    #[test]
    fn non_numeric_values_are_rejected() {
        let text = "skin 1 two 3\n";
        assert!(WordVectors::from_reader(text.as_bytes(), &origin()).is_err());
    }

    #[test]
    fn empty_file_is_unavailable() {
        let err = WordVectors::from_reader("".as_bytes(), &origin()).unwrap_err();
        assert!(matches!(err, CategorizerError::SourceUnavailable { .. }));
    }

    #[test]
    fn missing_file_is_unavailable() {
        let err = WordVectors::load(Path::new("/nonexistent/model.vec")).unwrap_err();
        assert!(matches!(err, CategorizerError::SourceUnavailable { .. }));
    }

    #[test]
    fn duplicate_words_keep_first_vector() {
        let vectors = WordVectors::from_entries(vec![
            ("a".to_string(), vec![1.0]),
            ("a".to_string(), vec![2.0]),
        ])
        .unwrap();
        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors.lookup("a"), Some(&[1.0f32][..]));
    }

    #[test]
    fn nearest_words_rank_by_direction() {
        let vectors = WordVectors::from_entries(vec![
            ("east".to_string(), vec![1.0, 0.0]),
            ("north".to_string(), vec![0.0, 1.0]),
            ("northeast".to_string(), vec![1.0, 1.0]),
        ])
        .unwrap();
        let nearest = vectors.nearest_words(&[0.9, 1.0], 2);
        assert_eq!(nearest.len(), 2);
        assert_eq!(nearest[0].0, "northeast");
        assert_eq!(nearest[1].0, "north");
    }

    #[test]
    fn loads_fixture_model() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("test_data")
            .join("models")
            .join("migraine.vec");
        let vectors = WordVectors::load(&path).expect("fixture model loads");
        assert_eq!(vectors.dimension(), 4);
        assert!(vectors.lookup("headache").is_some());
    }
}
