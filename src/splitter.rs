use crate::error::{CategorizerError, Result};
use crate::vectorizer::{euclidean_norm, mean_vector};

/// Two groups of labelled vectors split by magnitude, with their centroids.
#[derive(Debug, Clone, PartialEq)]
pub struct BinarySplit {
    pub low: Vec<(String, Vec<f32>)>,
    pub high: Vec<(String, Vec<f32>)>,
    pub low_centroid: Vec<f32>,
    pub high_centroid: Vec<f32>,
}

/// Orders `entries` by Euclidean norm and cuts them at `len / 2`.
///
/// The lower half goes to `low`, the rest to `high`, so an odd count gives
/// `high` the extra entry. Equal norms keep their input order. Needs at
/// least two vectors of one dimension.
pub fn split(mut entries: Vec<(String, Vec<f32>)>) -> Result<BinarySplit> {
    if entries.len() < 2 {
        return Err(CategorizerError::InsufficientVectors {
            found: entries.len(),
        });
    }
    let dimension = entries[0].1.len();
    if let Some((name, vector)) = entries.iter().find(|(_, v)| v.len() != dimension) {
        return Err(CategorizerError::DimensionMismatch {
            category: name.clone(),
            expected: dimension,
            found: vector.len(),
        });
    }

    entries.sort_by(|a, b| euclidean_norm(&a.1).total_cmp(&euclidean_norm(&b.1)));
    let high = entries.split_off(entries.len() / 2);
    let low = entries;

    let low_centroid = centroid(&low)?;
    let high_centroid = centroid(&high)?;

    Ok(BinarySplit {
        low,
        high,
        low_centroid,
        high_centroid,
    })
}

fn centroid(group: &[(String, Vec<f32>)]) -> Result<Vec<f32>> {
    let vectors: Vec<&[f32]> = group.iter().map(|(_, v)| v.as_slice()).collect();
    mean_vector(&vectors).ok_or(CategorizerError::InsufficientVectors { found: group.len() })
}
