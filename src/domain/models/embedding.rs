//! Embedding vector helpers
//!
//! Content hashing for cache keys and the deterministic fallback embedding
//! used whenever the embedding provider is unavailable.

use sha2::{Digest, Sha256};

/// Hex SHA-256 digest of a text, used as its cache key.
pub fn content_key(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Deterministic hash-seeded embedding of `text` with `dimension` entries.
///
/// Same input, same vector, always. The vector is L2-normalized but carries
/// no semantic geometry: two related texts are no closer than two unrelated
/// ones. It exists so routing stays reproducible when the provider is down.
pub fn fallback_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let mut embedding = Vec::with_capacity(dimension);
    let mut counter: u64 = 0;

    // Counter-mode expansion: SHA-256(text || counter) yields 8 lanes of 4 bytes.
    while embedding.len() < dimension {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(counter.to_le_bytes());
        let block = hasher.finalize();

        for lane in block.chunks_exact(4) {
            if embedding.len() == dimension {
                break;
            }
            let raw = u32::from_le_bytes([lane[0], lane[1], lane[2], lane[3]]);
            embedding.push((f64::from(raw) / f64::from(u32::MAX)).mul_add(2.0, -1.0) as f32);
        }
        counter += 1;
    }

    normalize(&mut embedding);
    embedding
}

/// Scale a vector to unit L2 norm in place. Zero vectors become uniform.
pub fn normalize(vector: &mut [f32]) {
    if vector.is_empty() {
        return;
    }
    // f64 accumulation avoids drift on high-dimensional vectors
    let magnitude = vector
        .iter()
        .map(|x| f64::from(*x) * f64::from(*x))
        .sum::<f64>()
        .sqrt();

    if magnitude > 1e-10 {
        for val in vector.iter_mut() {
            *val = (f64::from(*val) / magnitude) as f32;
        }
    } else {
        let uniform = (1.0 / (vector.len() as f64).sqrt()) as f32;
        vector.fill(uniform);
    }
}

/// Dot product in f64. Callers guarantee equal lengths.
pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum()
}
