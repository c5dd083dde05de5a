use crate::corpus::Document;
use crate::embeddings::EmbeddingProvider;
use crate::error::{CategorizerError, Diagnostic, Result};
use crate::vectorizer::{mean_vector, Vectorizer};
use log::{info, warn};
use rayon::prelude::*;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// One category's anchor vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceEntry {
    pub name: String,
    pub vector: Vec<f32>,
    pub description: Option<String>,
}

/// Category name to reference vector, in insertion order.
///
/// The order is significant: the matcher walks categories in this order and
/// keeps the first one on equal similarity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceMap {
    entries: Vec<ReferenceEntry>,
}

/// The store is one JSON object keyed by category name, written in map
/// order: `{"migraine": {"vector": [...], "description": "..."}, ...}`.
struct StoredReferences<'a>(&'a [ReferenceEntry]);

#[derive(Serialize)]
struct StoredEntryRef<'a> {
    vector: &'a [f32],
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

impl Serialize for StoredReferences<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for entry in self.0 {
            map.serialize_entry(
                &entry.name,
                &StoredEntryRef {
                    vector: &entry.vector,
                    description: entry.description.as_deref(),
                },
            )?;
        }
        map.end()
    }
}

/// A category value is either `{"vector": [...], "description"?: "..."}` or
/// a bare numeric array.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Bare(Vec<f32>),
    Described {
        vector: Vec<f32>,
        #[serde(default)]
        description: Option<String>,
    },
}

impl ReferenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry. Names must be unique and every vector must have the
    /// dimension of the first one.
    pub fn insert(&mut self, entry: ReferenceEntry) -> Result<()> {
        if let Some(expected) = self.dimension() {
            if entry.vector.len() != expected {
                return Err(CategorizerError::DimensionMismatch {
                    category: entry.name,
                    expected,
                    found: entry.vector.len(),
                });
            }
        }
        if self.get(&entry.name).is_some() {
            return Err(CategorizerError::source_unavailable(
                "<reference map>",
                format!("duplicate category '{}'", entry.name),
            ));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ReferenceEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceEntry> {
        self.entries.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.entries.first().map(|e| e.vector.len())
    }

    /// Writes the map as pretty JSON, replacing `path` only once the new
    /// content is fully on disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        let stored = StoredReferences(&self.entries);

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, &stored)
                .map_err(|e| CategorizerError::Io(e.into()))?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| CategorizerError::Io(e.error))?;

        info!(
            "Saved {} reference vectors to {}",
            self.entries.len(),
            path.display()
        );
        Ok(())
    }

    /// Reads and validates a keyed store, keeping the file's category order.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| CategorizerError::source_unavailable(path, format!("read failed: {}", e)))?;
        let stored: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&json)
            .map_err(|e| CategorizerError::source_unavailable(path, format!("invalid JSON: {}", e)))?;

        let mut map = ReferenceMap::new();
        for (name, value) in stored {
            if name.trim().is_empty() {
                return Err(CategorizerError::source_unavailable(
                    path,
                    "category with empty name",
                ));
            }
            let (vector, description) = match serde_json::from_value(value) {
                Ok(StoredEntry::Described {
                    vector,
                    description,
                }) => (vector, description),
                Ok(StoredEntry::Bare(vector)) => (vector, None),
                Err(e) => {
                    return Err(CategorizerError::source_unavailable(
                        path,
                        format!("category '{}': {}", name, e),
                    ))
                }
            };
            if vector.is_empty() {
                return Err(CategorizerError::source_unavailable(
                    path,
                    format!("category '{}' has an empty vector", name),
                ));
            }
            if let Some(expected) = map.dimension() {
                if vector.len() != expected {
                    return Err(CategorizerError::source_unavailable(
                        path,
                        format!(
                            "category '{}' has {} values, expected {}",
                            name,
                            vector.len(),
                            expected
                        ),
                    ));
                }
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(CategorizerError::source_unavailable(
                    path,
                    format!("category '{}' has non-finite values", name),
                ));
            }
            map.insert(ReferenceEntry {
                name,
                vector,
                description,
            })?;
        }

        info!(
            "Loaded {} reference vectors ({} dims) from {}",
            map.len(),
            map.dimension().unwrap_or(0),
            path.display()
        );
        Ok(map)
    }
}

/// Sample documents of one category and the model that embeds them.
pub struct CategorySamples<'a> {
    pub name: &'a str,
    pub documents: &'a [Document],
    pub provider: &'a dyn EmbeddingProvider,
    pub description: Option<&'a str>,
}

#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub categories: usize,
    pub documents: usize,
    pub documents_used: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl BuildReport {
    /// Categories left out of the map for lack of usable documents.
    pub fn omitted(&self) -> Vec<&str> {
        self.diagnostics
            .iter()
            .filter_map(|d| match d {
                Diagnostic::EmptyCategory { category } => Some(category.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ReferenceBuild {
    pub map: ReferenceMap,
    pub report: BuildReport,
}

#[derive(Default, Clone)]
pub struct ReferenceBuilder {
    vectorizer: Vectorizer,
}

impl ReferenceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds one reference vector per category, in the order given.
    ///
    /// Documents are vectorized on the rayon pool; their vectors are then
    /// averaged in document order on the calling thread.
    pub fn build(&self, samples: &[CategorySamples<'_>]) -> Result<ReferenceBuild> {
        let mut map = ReferenceMap::new();
        let mut report = BuildReport::default();

        for sample in samples {
            report.categories += 1;
            report.documents += sample.documents.len();

            let outcomes: Vec<Option<Vec<f32>>> = sample
                .documents
                .par_iter()
                .map(|doc| self.vectorizer.vectorize(&doc.tokens, sample.provider).vector)
                .collect();

            let mut usable: Vec<&[f32]> = Vec::with_capacity(outcomes.len());
            for (doc, outcome) in sample.documents.iter().zip(&outcomes) {
                match outcome {
                    Some(vector) => usable.push(vector),
                    None => {
                        warn!(
                            "Category '{}': no known words in document '{}'",
                            sample.name, doc.id
                        );
                        report.diagnostics.push(Diagnostic::NoEmbeddingsResolved {
                            category: sample.name.to_string(),
                            document: doc.id.clone(),
                        });
                    }
                }
            }
            report.documents_used += usable.len();

            let Some(reference) = mean_vector(&usable) else {
                warn!(
                    "Category '{}' has no usable documents and is omitted",
                    sample.name
                );
                report.diagnostics.push(Diagnostic::EmptyCategory {
                    category: sample.name.to_string(),
                });
                continue;
            };

            info!(
                "Category '{}': reference built from {} of {} documents",
                sample.name,
                usable.len(),
                sample.documents.len()
            );

            map.insert(ReferenceEntry {
                name: sample.name.to_string(),
                vector: reference,
                description: sample.description.map(str::to_string),
            })?;
        }

        Ok(ReferenceBuild { map, report })
    }
}
