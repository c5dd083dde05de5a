use crate::embeddings::EmbeddingProvider;

/// Outcome of turning one token sequence into a vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Vectorized {
    /// Mean of the resolved word vectors, `None` when no token resolved.
    pub vector: Option<Vec<f32>>,
    /// Tokens the provider did not know, in input order with duplicates.
    pub unknown_tokens: Vec<String>,
}

impl Vectorized {
    pub fn is_resolved(&self) -> bool {
        self.vector.is_some()
    }
}

#[derive(Default, Clone)]
pub struct Vectorizer;

impl Vectorizer {
    pub fn new() -> Self {
        Self
    }

    /// Averages the embeddings of every known token.
    ///
    /// Unknown tokens are left out of both the sum and the count. An input
    /// without a single known token produces no vector at all rather than a
    /// zero vector, which would otherwise look like a valid direction.
    pub fn vectorize<P>(&self, tokens: &[String], provider: &P) -> Vectorized
    where
        P: EmbeddingProvider + ?Sized,
    {
        let mut sum = vec![0.0f64; provider.dimension()];
        let mut resolved = 0usize;
        let mut unknown_tokens = Vec::new();

        for token in tokens {
            match provider.lookup(token) {
                Some(embedding) => {
                    for (acc, value) in sum.iter_mut().zip(embedding) {
                        *acc += f64::from(*value);
                    }
                    resolved += 1;
                }
                None => unknown_tokens.push(token.clone()),
            }
        }

        let vector = if resolved == 0 {
            None
        } else {
            let count = resolved as f64;
            Some(sum.into_iter().map(|v| (v / count) as f32).collect())
        };

        Vectorized {
            vector,
            unknown_tokens,
        }
    }
}

/// Element-wise mean of equally sized vectors. `None` for an empty input.
pub fn mean_vector(vectors: &[&[f32]]) -> Option<Vec<f32>> {
    let first = vectors.first()?;
    let mut sum = vec![0.0f64; first.len()];
    for vector in vectors {
        debug_assert_eq!(vector.len(), sum.len());
        for (acc, value) in sum.iter_mut().zip(vector.iter()) {
            *acc += f64::from(*value);
        }
    }
    let count = vectors.len() as f64;
    Some(sum.into_iter().map(|v| (v / count) as f32).collect())
}

pub fn euclidean_norm(vector: &[f32]) -> f64 {
    vector
        .iter()
        .map(|v| f64::from(*v) * f64::from(*v))
        .sum::<f64>()
        .sqrt()
}

/// Cosine of the angle between `a` and `b`.
///
/// Returns `None` when either vector has zero length, since it has no
/// direction to compare. Callers must check dimensions beforehand.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    debug_assert_eq!(a.len(), b.len());
    let norm_a = euclidean_norm(a);
    let norm_b = euclidean_norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    let dot: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum();
    Some((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}
