use crate::intent::DEFAULT_THRESHOLD;
use std::path::PathBuf;

/// Runtime paths and knobs, read from `RUBRICATOR_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub models_dir: PathBuf,
    pub reference_file: PathBuf,
    pub intents_file: PathBuf,
    pub intent_threshold: u8,
    pub nearest_words: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            data_dir: PathBuf::from("data"),
            models_dir: PathBuf::from("models"),
            reference_file: PathBuf::from("reference_system.json"),
            intents_file: PathBuf::from("intents.json"),
            intent_threshold: DEFAULT_THRESHOLD,
            nearest_words: 5,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let path = |key: &str, default: PathBuf| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
                .unwrap_or(default)
        };
        let number = |key: &str, default: usize| {
            lookup(key)
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(default)
        };

        Settings {
            data_dir: path("RUBRICATOR_DATA_DIR", defaults.data_dir),
            models_dir: path("RUBRICATOR_MODELS_DIR", defaults.models_dir),
            reference_file: path("RUBRICATOR_REFERENCE_FILE", defaults.reference_file),
            intents_file: path("RUBRICATOR_INTENTS_FILE", defaults.intents_file),
            intent_threshold: number(
                "RUBRICATOR_INTENT_THRESHOLD",
                usize::from(defaults.intent_threshold),
            )
            .min(100) as u8,
            nearest_words: number("RUBRICATOR_NEAREST_WORDS", defaults.nearest_words)
                .max(1),
        }
    }

    /// Embedding file for one category's model.
    pub fn model_path(&self, category: &str) -> PathBuf {
        self.models_dir.join(format!("{}.vec", category))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(vars: &[(&str, &str)]) -> Settings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_without_environment() {
        assert_eq!(settings_from(&[]), Settings::default());
    }

    #[test]
    fn environment_overrides_defaults() {
        let settings = settings_from(&[
            ("RUBRICATOR_DATA_DIR", "/srv/corpus"),
            ("RUBRICATOR_INTENT_THRESHOLD", "55"),
            ("RUBRICATOR_NEAREST_WORDS", "10"),
        ]);
        assert_eq!(settings.data_dir, PathBuf::from("/srv/corpus"));
        assert_eq!(settings.intent_threshold, 55);
        assert_eq!(settings.nearest_words, 10);
        assert_eq!(settings.models_dir, PathBuf::from("models"));
    }

    #[test]
    fn invalid_values_fall_back_or_clamp() {
        let settings = settings_from(&[
            ("RUBRICATOR_INTENT_THRESHOLD", "250"),
            ("RUBRICATOR_NEAREST_WORDS", "many"),
            ("RUBRICATOR_REFERENCE_FILE", "   "),
        ]);
        assert_eq!(settings.intent_threshold, 100);
        assert_eq!(settings.nearest_words, 5);
        assert_eq!(settings.reference_file, PathBuf::from("reference_system.json"));
    }

    #[test]
    fn model_path_uses_category_name() {
        let settings = Settings::default();
        assert_eq!(
            settings.model_path("migraine"),
            PathBuf::from("models").join("migraine.vec")
        );
    }
}
