//! Skip-gram embeddings with negative sampling, in real, dual-real and
//! complex-valued flavors, trained by lock-free worker threads.

use serde::{Deserialize, Serialize};

pub mod analogy;
pub mod batch;
pub mod config;
pub mod kernel;
pub mod output;
pub mod progress;
pub mod store;
pub mod text;
pub mod train;
pub mod unigram;
pub mod vectors;
pub mod vocab;

pub use config::{ConfigError, ModelType, SignStrategy, TrainConfig};
pub use train::Word2CVec;
pub use vocab::{VocabWord, Vocabulary};

/// Maximum length of a word, plus slack for a terminator.
pub const MAX_STRING: usize = 100;

/// Sentences longer than this are split.
pub const MAX_SENTENCE_LENGTH: usize = 1000;

/// The end-of-sentence pseudo-word. Always vocabulary index 0.
pub const EOS: &str = "</s>";

#[allow(non_camel_case_types)]
pub type real = f32; // Precision of float numbers

/// The linear congruential generator every part of training draws from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rng(pub u64);

impl Rng {
    pub fn rand_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(25214903917).wrapping_add(11);
        self.0
    }

    /// Get a uniformly distributed random number in `0.0 .. 1.0`.
    pub fn rand_real(&mut self) -> real {
        (self.rand_u64() & 0xFFFF) as real / 65536.0
    }
}

pub fn norm(v: &[real]) -> real {
    v.iter().copied().map(|e| e * e).sum::<real>().sqrt()
}

pub fn normalize(v: &mut [real]) {
    let len = norm(v);
    for e in v {
        *e /= len;
    }
}

pub fn dot(a: &[real], b: &[real]) -> real {
    assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(&a, &b)| a * b).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rng_follows_the_lcg_sequence() {
        let mut rng = Rng(0);
        assert_eq!(rng.rand_u64(), 11);
        assert_eq!(rng.rand_u64(), 11 * 25214903917 + 11);

        let mut rng = Rng(1);
        for _ in 0..1000 {
            let x = rng.rand_real();
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn normalize_gives_unit_length() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((norm(&v) - 1.0).abs() < 1e-6);
        assert_eq!(dot(&v, &[1.0, 0.0]), 0.6);
    }
}
