//! Binary quantization and Hamming/cosine scoring helpers used by both the
//! in-memory backend and (conceptually) mirrored by the Postgres
//! `binary_quantize()` SQL function (spec §4.1, §6).

/// Binary-quantize a vector: one bit per dimension, set iff the component
/// is positive. Packed into bytes, matching the bit layout pgvector's
/// `binary_quantize()` produces.
#[must_use]
pub fn binary_quantize(vector: &[f32]) -> Vec<u8> {
    let mut bytes = vec![0u8; vector.len().div_ceil(8)];
    for (i, &v) in vector.iter().enumerate() {
        if v > 0.0 {
            bytes[i / 8] |= 1 << (i % 8);
        }
    }
    bytes
}

/// Hamming distance between two binary-quantized vectors (lower = closer).
#[must_use]
pub fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// True cosine similarity between two (half-precision surrogate, here
/// plain `f32`) vectors.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Candidate-phase pool size: `max(10*k, 50)` (spec §4.1).
#[must_use]
pub fn candidate_pool_size(k: usize) -> usize {
    (10 * k).max(50)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_zero_hamming_distance() {
        let v = vec![0.5, -0.2, 0.1, -0.9];
        let q = binary_quantize(&v);
        assert_eq!(hamming_distance(&q, &q), 0);
    }

    #[test]
    fn cosine_of_identical_vector_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn pool_size_has_a_floor_of_fifty() {
        assert_eq!(candidate_pool_size(1), 50);
        assert_eq!(candidate_pool_size(10), 100);
    }
}
