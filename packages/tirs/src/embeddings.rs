//! Intent embedding oracle.
//!
//! Maps free-text intents to fixed-length vectors so the drift detector can
//! measure semantic distance from an agent's baseline. The oracle is
//! pluggable: the core only requires deterministic output for equal inputs.
//! The default [`HashingEmbedder`] hashes word tokens into sign-corrected
//! buckets and L2-normalizes, so it needs no model weights and no network.

use sha2::{Digest, Sha256};

/// Pluggable text-to-vector oracle.
///
/// Implementations must be deterministic: equal inputs produce equal
/// vectors. Vector contents are otherwise opaque to the detector.
pub trait Embedder: Send + Sync {
    /// Embed a text into a fixed-length vector.
    fn embed(&self, text: &str) -> Vec<f32>;

    /// Output dimension, fixed at construction.
    fn dimension(&self) -> usize;
}

/// Cosine distance between two vectors, clamped to [0, 1].
///
/// Mismatched lengths or zero-magnitude vectors are maximally dissimilar.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 1.0;
    }

    (1.0 - dot / (mag_a * mag_b)).clamp(0.0, 1.0)
}

/// Deterministic feature-hashing embedder.
///
/// Each lowercased word token is hashed twice: once to pick a bucket, once
/// to pick a sign. Token counts accumulate into the buckets and the result
/// is L2-normalized. Disjoint token sets land in (almost surely) different
/// buckets, giving near-orthogonal vectors.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(128)
    }
}

impl HashingEmbedder {
    /// Create an embedder with the given output dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn token_bucket(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());
        let bucket = u64::from_le_bytes(digest[0..8].try_into().unwrap_or([0u8; 8]));
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        ((bucket % self.dimension as u64) as usize, sign)
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let (bucket, sign) = self.token_bucket(token);
            vector[bucket] += sign;
        }

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in vector.iter_mut() {
                *value /= magnitude;
            }
        }

        vector
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_for_equal_inputs() {
        let embedder = HashingEmbedder::new(128);
        let a = embedder.embed("approve expense report");
        let b = embedder.embed("approve expense report");
        assert_eq!(a, b);
    }

    #[test]
    fn test_dimension_fixed() {
        let embedder = HashingEmbedder::new(64);
        assert_eq!(embedder.embed("anything at all").len(), 64);
        assert_eq!(embedder.dimension(), 64);
    }

    #[test]
    fn test_identical_texts_are_zero_distance() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("verify invoice for vendor");
        let b = embedder.embed("verify invoice for vendor");
        assert!(cosine_distance(&a, &b) < 1e-6);
    }

    #[test]
    fn test_disjoint_texts_are_far() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("approve small travel expense");
        let b = embedder.embed("delete audit log history purge");
        assert!(cosine_distance(&a, &b) > 0.5);
    }

    #[test]
    fn test_empty_text_is_maximally_distant() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("");
        let b = embedder.embed("approve expense");
        assert_eq!(cosine_distance(&a, &b), 1.0);
    }

    #[test]
    fn test_distance_clamped() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        let d = cosine_distance(&a, &b);
        assert!((0.0..=1.0).contains(&d));
        assert_eq!(d, 1.0);
    }
}
