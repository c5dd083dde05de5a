use crate::embeddings::EmbeddingProvider;
use crate::error::{CategorizerError, Result};
use crate::reference::ReferenceMap;
use crate::tokenizer::tokenize;
use crate::vectorizer::{cosine_similarity, Vectorized, Vectorizer};
use log::debug;

/// A user query, kept both as lower-cased text (for keyword fallback) and
/// as tokens (for embedding lookup).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub text: String,
    pub tokens: Vec<String>,
}

impl Query {
    pub fn parse(text: &str) -> Self {
        Query {
            text: text.to_lowercase(),
            tokens: tokenize(text),
        }
    }

    pub fn from_tokens(tokens: Vec<String>) -> Self {
        Query {
            text: tokens.join(" ").to_lowercase(),
            tokens,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    /// Closest reference vector by cosine similarity.
    Semantic,
    /// Keyword found in the query text.
    Fallback,
}

/// Result of matching one query. All of `category`, `score` and `source`
/// are `None` when nothing matched.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryMatch {
    pub category: Option<String>,
    /// Cosine similarity in `[-1, 1]`; only set for semantic matches.
    pub score: Option<f64>,
    pub source: Option<MatchSource>,
    pub unknown_tokens: Vec<String>,
}

impl CategoryMatch {
    fn none(unknown_tokens: Vec<String>) -> Self {
        CategoryMatch {
            category: None,
            score: None,
            source: None,
            unknown_tokens,
        }
    }

    pub fn is_match(&self) -> bool {
        self.category.is_some()
    }

    /// Text to show for the matched category: its stored description, else
    /// the fallback table's response for that category.
    pub fn answer<'a>(
        &'a self,
        references: &'a ReferenceMap,
        fallback: &'a FallbackTable,
    ) -> Option<&'a str> {
        let category = self.category.as_deref()?;
        references
            .get(category)
            .and_then(|entry| entry.description.as_deref())
            .or_else(|| fallback.response_for(category))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackEntry {
    pub keyword: String,
    pub category: String,
    pub response: String,
}

/// Static keyword lookup used when no embedding could score the query.
/// Entries are tried in order; the first keyword contained in the query wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallbackTable {
    entries: Vec<FallbackEntry>,
}

impl FallbackTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a keyword that maps to a category of the same name.
    pub fn with_entry(mut self, keyword: &str, response: &str) -> Self {
        self.entries.push(FallbackEntry {
            keyword: keyword.to_lowercase(),
            category: keyword.to_string(),
            response: response.to_string(),
        });
        self
    }

    /// The knowledge base shipped with the binary.
    pub fn builtin() -> Self {
        FallbackTable::new()
            .with_entry(
                "dermatomycosis",
                "Грибковая инфекция кожи, вызываемая различными патогенными грибками.",
            )
            .with_entry(
                "migraine",
                "Неврологическое заболевание, сопровождающееся сильными головными болями.",
            )
            .with_entry(
                "вкр",
                "Выпускная квалификационная работа — это итоговое исследование студента.",
            )
    }

    pub fn lookup(&self, lowered_query: &str) -> Option<&FallbackEntry> {
        self.entries
            .iter()
            .find(|entry| lowered_query.contains(entry.keyword.as_str()))
    }

    pub fn response_for(&self, category: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.category == category)
            .map(|entry| entry.response.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Default, Clone)]
pub struct CategoryMatcher {
    vectorizer: Vectorizer,
}

impl CategoryMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `query` to its closest category.
    ///
    /// Falls back to keyword lookup when the query has no known words or no
    /// category could be scored. A reference vector whose dimension differs
    /// from the query's aborts the whole match.
    pub fn match_query<P>(
        &self,
        query: &Query,
        references: &ReferenceMap,
        provider: &P,
        fallback: &FallbackTable,
    ) -> Result<CategoryMatch>
    where
        P: EmbeddingProvider + ?Sized,
    {
        let vectorized = self.vectorizer.vectorize(&query.tokens, provider);
        self.match_vectorized(query, vectorized, references, fallback)
    }

    /// Like [`CategoryMatcher::match_query`], but tries each named provider
    /// in order and embeds the query with the first one that knows any of
    /// its words.
    pub fn match_with_providers(
        &self,
        query: &Query,
        references: &ReferenceMap,
        providers: &[(&str, &dyn EmbeddingProvider)],
        fallback: &FallbackTable,
    ) -> Result<CategoryMatch> {
        let vectorized = match self.resolve_query_vector(&query.tokens, providers) {
            Some((name, vectorized)) => {
                debug!("Query embedded with the '{}' model", name);
                vectorized
            }
            None => Vectorized {
                vector: None,
                unknown_tokens: query.tokens.clone(),
            },
        };
        self.match_vectorized(query, vectorized, references, fallback)
    }

    pub fn resolve_query_vector<'p>(
        &self,
        tokens: &[String],
        providers: &[(&'p str, &dyn EmbeddingProvider)],
    ) -> Option<(&'p str, Vectorized)> {
        providers.iter().find_map(|(name, provider)| {
            let vectorized = self.vectorizer.vectorize(tokens, *provider);
            vectorized.is_resolved().then_some((*name, vectorized))
        })
    }

    fn match_vectorized(
        &self,
        query: &Query,
        vectorized: Vectorized,
        references: &ReferenceMap,
        fallback: &FallbackTable,
    ) -> Result<CategoryMatch> {
        let Vectorized {
            vector,
            unknown_tokens,
        } = vectorized;

        if let Some(query_vector) = vector {
            if let Some((category, score)) = closest_category(&query_vector, references)? {
                return Ok(CategoryMatch {
                    category: Some(category.to_string()),
                    score: Some(score),
                    source: Some(MatchSource::Semantic),
                    unknown_tokens,
                });
            }
        }

        match fallback.lookup(&query.text) {
            Some(entry) => {
                debug!("Keyword fallback matched '{}'", entry.keyword);
                Ok(CategoryMatch {
                    category: Some(entry.category.clone()),
                    score: None,
                    source: Some(MatchSource::Fallback),
                    unknown_tokens,
                })
            }
            None => Ok(CategoryMatch::none(unknown_tokens)),
        }
    }
}

/// Category with the highest cosine similarity to `query`.
///
/// Categories are visited in map order and only a strictly greater score
/// replaces the current best, so ties go to the earlier category. Zero
/// vectors are skipped. Returns `None` when nothing could be scored.
pub fn closest_category<'m>(
    query: &[f32],
    references: &'m ReferenceMap,
) -> Result<Option<(&'m str, f64)>> {
    let mut best: Option<(&str, f64)> = None;

    for entry in references.iter() {
        if entry.vector.len() != query.len() {
            return Err(CategorizerError::DimensionMismatch {
                category: entry.name.clone(),
                expected: entry.vector.len(),
                found: query.len(),
            });
        }
        let Some(score) = cosine_similarity(query, &entry.vector) else {
            debug!("Skipping '{}': zero vector", entry.name);
            continue;
        };
        debug!("Similarity to '{}': {:.4}", entry.name, score);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((entry.name.as_str(), score)),
        }
    }

    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::WordVectors;
    use crate::reference::ReferenceEntry;

    fn entry(name: &str, vector: Vec<f32>, description: Option<&str>) -> ReferenceEntry {
        ReferenceEntry {
            name: name.to_string(),
            vector,
            description: description.map(str::to_string),
        }
    }

    fn references() -> ReferenceMap {
        let mut map = ReferenceMap::new();
        map.insert(entry("skin", vec![1.0, 0.0], Some("about skin"))).unwrap();
        map.insert(entry("head", vec![0.0, 1.0], None)).unwrap();
        map
    }

    fn provider() -> WordVectors {
        WordVectors::from_entries(vec![
            ("rash".to_string(), vec![0.9, 0.1]),
            ("ache".to_string(), vec![0.2, 0.8]),
            ("void".to_string(), vec![0.0, 0.0]),
        ])
        .unwrap()
    }

    fn query(words: &[&str]) -> Query {
        Query::from_tokens(words.iter().map(|w| w.to_string()).collect())
    }

    #[test]
    fn picks_closest_category() {
        let result = CategoryMatcher::new()
            .match_query(&query(&["ache"]), &references(), &provider(), &FallbackTable::new())
            .unwrap();
        assert_eq!(result.category.as_deref(), Some("head"));
        assert_eq!(result.source, Some(MatchSource::Semantic));
        assert!(result.score.unwrap() > 0.9);
    }

    #[test]
    fn ties_go_to_first_category_in_map_order() {
        let mut map = ReferenceMap::new();
        map.insert(entry("A", vec![1.0, 1.0], None)).unwrap();
        map.insert(entry("B", vec![1.0, 1.0], None)).unwrap();
        let q = [0.3f32, 0.7];
        for _ in 0..20 {
            let (name, _) = closest_category(&q, &map).unwrap().unwrap();
            assert_eq!(name, "A");
        }
    }

    #[test]
    fn dimension_mismatch_aborts() {
        let mut map = ReferenceMap::new();
        map.insert(entry("short", vec![0.5; 50], None)).unwrap();
        let q = vec![0.1f32; 100];
        let err = closest_category(&q, &map).unwrap_err();
        assert!(matches!(
            err,
            CategorizerError::DimensionMismatch {
                expected: 50,
                found: 100,
                ..
            }
        ));
    }

    #[test]
    fn dimension_mismatch_is_not_a_fallback_trigger() {
        let mut map = ReferenceMap::new();
        map.insert(entry("three", vec![1.0, 0.0, 0.0], None)).unwrap();
        let fallback = FallbackTable::new().with_entry("rash", "skin");
        let err = CategoryMatcher::new()
            .match_query(&query(&["rash"]), &map, &provider(), &fallback)
            .unwrap_err();
        assert!(matches!(err, CategorizerError::DimensionMismatch { .. }));
    }

    #[test]
    fn zero_reference_vectors_are_skipped() {
        let mut map = ReferenceMap::new();
        map.insert(entry("blank", vec![0.0, 0.0], None)).unwrap();
        map.insert(entry("head", vec![0.0, 1.0], None)).unwrap();
        let (name, score) = closest_category(&[-1.0, -1.0], &map).unwrap().unwrap();
        assert_eq!(name, "head");
        assert!(score < 0.0);
    }

    #[test]
    fn unknown_words_use_keyword_fallback() {
        let fallback = FallbackTable::builtin();
        let q = Query::parse("Что такое ВКР?");
        let result = CategoryMatcher::new()
            .match_query(&q, &references(), &provider(), &fallback)
            .unwrap();
        assert_eq!(result.category.as_deref(), Some("вкр"));
        assert_eq!(result.source, Some(MatchSource::Fallback));
        assert_eq!(result.score, None);
        assert_eq!(result.unknown_tokens, q.tokens);
        assert!(result
            .answer(&references(), &fallback)
            .unwrap()
            .starts_with("Выпускная"));
    }

    #[test]
    fn zero_query_vector_falls_back() {
        let fallback = FallbackTable::new().with_entry("void", "nothing here");
        let result = CategoryMatcher::new()
            .match_query(&query(&["void"]), &references(), &provider(), &fallback)
            .unwrap();
        assert_eq!(result.source, Some(MatchSource::Fallback));
        assert_eq!(result.answer(&references(), &fallback), Some("nothing here"));
    }

    #[test]
    fn first_fallback_keyword_wins() {
        let fallback = FallbackTable::new()
            .with_entry("migraine", "first")
            .with_entry("mig", "second");
        let hit = fallback.lookup("chronic migraine").unwrap();
        assert_eq!(hit.response, "first");
        let hit = fallback.lookup("mig only").unwrap();
        assert_eq!(hit.response, "second");
    }

    #[test]
    fn no_information_is_not_an_error() {
        let result = CategoryMatcher::new()
            .match_query(
                &query(&["xyzzy"]),
                &references(),
                &provider(),
                &FallbackTable::builtin(),
            )
            .unwrap();
        assert!(!result.is_match());
        assert_eq!(result.score, None);
        assert_eq!(result.source, None);
        assert_eq!(result.answer(&references(), &FallbackTable::builtin()), None);
    }

    #[test]
    fn empty_reference_map_falls_back() {
        let fallback = FallbackTable::new().with_entry("rash", "see a dermatologist");
        let result = CategoryMatcher::new()
            .match_query(&query(&["rash"]), &ReferenceMap::new(), &provider(), &fallback)
            .unwrap();
        assert_eq!(result.source, Some(MatchSource::Fallback));
    }

    #[test]
    fn answer_prefers_reference_description() {
        let fallback = FallbackTable::new().with_entry("skin", "from table");
        let result = CategoryMatcher::new()
            .match_query(&query(&["rash"]), &references(), &provider(), &fallback)
            .unwrap();
        assert_eq!(result.category.as_deref(), Some("skin"));
        assert_eq!(result.answer(&references(), &fallback), Some("about skin"));
    }

    #[test]
    fn first_resolving_provider_is_used() {
        let derm = WordVectors::from_entries(vec![("rash".to_string(), vec![1.0, 0.0])]).unwrap();
        let head = WordVectors::from_entries(vec![("ache".to_string(), vec![0.0, 1.0])]).unwrap();
        let providers: Vec<(&str, &dyn EmbeddingProvider)> = vec![
            ("skin", &derm as &dyn EmbeddingProvider),
            ("head", &head as &dyn EmbeddingProvider),
        ];
        let matcher = CategoryMatcher::new();

        let (name, vectorized) = matcher
            .resolve_query_vector(&query(&["ache"]).tokens, &providers)
            .unwrap();
        assert_eq!(name, "head");
        assert_eq!(vectorized.vector, Some(vec![0.0, 1.0]));

        let result = matcher
            .match_with_providers(&query(&["ache"]), &references(), &providers, &FallbackTable::new())
            .unwrap();
        assert_eq!(result.category.as_deref(), Some("head"));

        let none = matcher
            .match_with_providers(&query(&["zzz"]), &references(), &providers, &FallbackTable::new())
            .unwrap();
        assert!(!none.is_match());
        assert_eq!(none.unknown_tokens, vec!["zzz".to_string()]);
    }
}
