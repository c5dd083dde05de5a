use crate::error::{CategorizerError, Result};
use crate::tokenizer::tokenize;
use log::{info, warn};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use walkdir::WalkDir;

/// Optional per-category file holding the human-readable answer text.
pub const DESCRIPTION_FILE: &str = "description.txt";

#[derive(Debug, Clone)]
pub struct Document {
    /// Path relative to the category folder.
    pub id: String,
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CategoryCorpus {
    pub name: String,
    pub description: Option<String>,
    pub documents: Vec<Document>,
}

pub type ProgressCallback = Arc<Mutex<dyn FnMut(usize, usize) + Send>>;

/// Reads a dataset laid out as `<root>/<category>/**/*.txt`.
///
/// Documents are expected to be plain text already extracted from their
/// original format.
pub struct CorpusScanner {
    progress_callback: Option<ProgressCallback>,
}

impl CorpusScanner {
    pub fn new() -> Self {
        CorpusScanner {
            progress_callback: None,
        }
    }

    pub fn set_progress_callback<F>(&mut self, callback: F)
    where
        F: FnMut(usize, usize) + Send + 'static,
    {
        self.progress_callback = Some(Arc::new(Mutex::new(callback)));
    }

    /// Category folder names directly under `root`, sorted by name.
    pub fn list_categories(&self, root: &Path) -> Result<Vec<String>> {
        if !root.is_dir() {
            return Err(CategorizerError::source_unavailable(
                root,
                "dataset directory does not exist",
            ));
        }

        let mut names: Vec<String> = fs::read_dir(root)?
            .filter_map(|entry| match entry {
                Ok(e) if e.path().is_dir() => Some(e.file_name().to_string_lossy().to_string()),
                Ok(_) => None,
                Err(err) => {
                    warn!("Skipping unreadable entry in {}: {}", root.display(), err);
                    None
                }
            })
            .collect();
        names.sort();
        Ok(names)
    }

    /// Scans every category folder under `root`.
    pub fn scan(&self, root: &Path) -> Result<Vec<CategoryCorpus>> {
        self.list_categories(root)?
            .into_iter()
            .map(|name| {
                let dir = root.join(&name);
                self.scan_category(&name, &dir)
            })
            .collect()
    }

    /// Tokenizes every `.txt` document of one category, in path order.
    pub fn scan_category(&self, name: &str, dir: &Path) -> Result<CategoryCorpus> {
        if !dir.is_dir() {
            return Err(CategorizerError::source_unavailable(
                dir,
                "category directory does not exist",
            ));
        }

        let mut paths: Vec<PathBuf> = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) if e.file_type().is_file() => Some(e.into_path()),
                Ok(_) => None,
                Err(err) => {
                    warn!("WalkDir error while scanning {}: {}", dir.display(), err);
                    None
                }
            })
            .filter(|path| is_document(path))
            .collect();
        paths.sort();

        let total = paths.len();
        let processed = Arc::new(AtomicUsize::new(0));

        let documents: Vec<Document> = paths
            .par_iter()
            .filter_map(|path| {
                let outcome = match fs::read_to_string(path) {
                    Ok(text) => Some(Document {
                        id: path
                            .strip_prefix(dir)
                            .unwrap_or(path)
                            .to_string_lossy()
                            .to_string(),
                        tokens: tokenize(&text),
                    }),
                    Err(err) => {
                        warn!("Failed to read {}: {}", path.display(), err);
                        None
                    }
                };
                Self::report_progress(&self.progress_callback, &processed, total);
                outcome
            })
            .collect();

        let description = read_description(dir);

        info!(
            "Scanned category '{}': {} documents from {}",
            name,
            documents.len(),
            dir.display()
        );

        Ok(CategoryCorpus {
            name: name.to_string(),
            description,
            documents,
        })
    }

    fn report_progress(
        callback: &Option<ProgressCallback>,
        processed: &Arc<AtomicUsize>,
        total: usize,
    ) {
        if let Some(ref cb_handle) = callback {
            let current = processed.fetch_add(1, Ordering::Relaxed) + 1;
            let step = (total / 100).max(1);
            if current % step == 0 || current == total {
                if let Ok(mut cb) = cb_handle.lock() {
                    cb(current.min(total), total);
                }
            }
        }
    }
}

impl Default for CorpusScanner {
    fn default() -> Self {
        Self::new()
    }
}

fn is_document(path: &Path) -> bool {
    let is_txt = path
        .extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("txt"))
        .unwrap_or(false);
    let is_description = path
        .file_name()
        .map(|name| name == DESCRIPTION_FILE)
        .unwrap_or(false);
    is_txt && !is_description
}

fn read_description(dir: &Path) -> Option<String> {
    let text = fs::read_to_string(dir.join(DESCRIPTION_FILE)).ok()?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
