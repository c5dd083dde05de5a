use crate::error::{CategorizerError, Result};
use crate::fuzzy::partial_ratio;
use fastrand::Rng;
use log::{debug, info};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Reply used by callers when no intent clears the threshold.
pub const FALLBACK_REPLY: &str = "Извините, я вас не понял. Попробуйте переформулировать запрос.";

pub const DEFAULT_THRESHOLD: u8 = 70;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Intent {
    #[serde(default)]
    pub tag: Option<String>,
    pub patterns: Vec<String>,
    pub responses: Vec<String>,
}

impl Intent {
    pub fn new(patterns: &[&str], responses: &[&str]) -> Self {
        Intent {
            tag: None,
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            responses: responses.iter().map(|r| r.to_string()).collect(),
        }
    }
}

#[derive(Deserialize)]
struct CatalogFile {
    intents: Vec<Intent>,
}

/// Ordered, validated list of intents. Order decides which intent wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentCatalog {
    intents: Vec<Intent>,
}

impl IntentCatalog {
    /// Every intent needs at least one pattern and one response.
    pub fn new(intents: Vec<Intent>) -> Result<Self> {
        Self::validated(intents, Path::new("<intent catalog>"))
    }

    /// Loads `{"intents": [{"patterns": [...], "responses": [...]}, ...]}`.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| CategorizerError::source_unavailable(path, format!("read failed: {}", e)))?;
        let catalog = Self::from_json(&json, path)?;
        info!("Loaded {} intents from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn from_json(json: &str, origin: &Path) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)
            .map_err(|e| CategorizerError::source_unavailable(origin, format!("invalid JSON: {}", e)))?;
        Self::validated(file.intents, origin)
    }

    fn validated(intents: Vec<Intent>, origin: &Path) -> Result<Self> {
        for (index, intent) in intents.iter().enumerate() {
            let label = intent.tag.clone().unwrap_or_else(|| format!("#{}", index));
            if intent.patterns.is_empty() {
                return Err(CategorizerError::source_unavailable(
                    origin,
                    format!("intent {} has no patterns", label),
                ));
            }
            if intent.responses.is_empty() {
                return Err(CategorizerError::source_unavailable(
                    origin,
                    format!("intent {} has no responses", label),
                ));
            }
        }
        Ok(IntentCatalog { intents })
    }

    pub fn intents(&self) -> &[Intent] {
        &self.intents
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentMatch {
    pub index: usize,
    /// Best partial-ratio score over the intent's patterns, 0 to 100.
    pub score: u8,
}

pub struct IntentMatcher {
    threshold: u8,
}

impl IntentMatcher {
    pub fn new(threshold: u8) -> Self {
        IntentMatcher {
            threshold: threshold.min(100),
        }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// First intent, in catalog order, whose best pattern score reaches the
    /// threshold. Later intents are not examined once one qualifies, even if
    /// they would score higher.
    pub fn find_intent(&self, utterance: &str, catalog: &IntentCatalog) -> Option<IntentMatch> {
        let needle = utterance.to_lowercase();
        catalog
            .intents()
            .iter()
            .enumerate()
            .find_map(|(index, intent)| {
                let score = intent
                    .patterns
                    .iter()
                    .map(|pattern| partial_ratio(&needle, &pattern.to_lowercase()))
                    .max()
                    .unwrap_or(0);
                debug!("Intent #{} scored {} for '{}'", index, score, utterance);
                (score >= self.threshold).then_some(IntentMatch { index, score })
            })
    }

    /// A response of the winning intent, picked uniformly with `rng`.
    pub fn match_intent<'c>(
        &self,
        utterance: &str,
        catalog: &'c IntentCatalog,
        rng: &mut Rng,
    ) -> Option<&'c str> {
        let hit = self.find_intent(utterance, catalog)?;
        let responses = &catalog.intents()[hit.index].responses;
        responses.get(rng.usize(..responses.len())).map(String::as_str)
    }
}

impl Default for IntentMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}
