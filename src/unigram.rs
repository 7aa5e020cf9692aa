use crate::vocab::Vocabulary;

/// Negative samples are drawn from the unigram distribution raised to this power.
const POWER: f64 = 0.75;

/// A lookup table mapping uniformly random slots to vocabulary indices, so
/// that index `i` comes up with probability proportional to `count(i)^0.75`.
pub struct UnigramTable {
    table: Vec<u32>,
}

impl UnigramTable {
    pub fn new(vocab: &Vocabulary, table_size: usize) -> Self {
        let vocab_size = vocab.len();
        let train_words_pow = vocab
            .words()
            .iter()
            .map(|vw| (vw.count as f64).powf(POWER))
            .sum::<f64>();

        let mut table = Vec::with_capacity(table_size);
        let mut i = 0;
        let mut d1 = (vocab.count(i) as f64).powf(POWER) / train_words_pow;
        for a in 0..table_size {
            table.push(i as u32);
            if (a as f64 / table_size as f64) > d1 {
                i += 1;
                if i < vocab_size {
                    d1 += (vocab.count(i) as f64).powf(POWER) / train_words_pow;
                }
            }
            if i >= vocab_size {
                i = vocab_size - 1;
            }
        }
        UnigramTable { table }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Picks the slot for a raw random draw. May return 0 (`</s>`); callers
    /// redirect that themselves.
    pub fn sample(&self, r: u64) -> usize {
        self.table[(r >> 16) as usize % self.table.len()] as usize
    }

    pub fn slots(&self) -> &[u32] {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Rng;

    fn vocab() -> Vocabulary {
        let mut vocab = Vocabulary::new(1000);
        for (word, n) in [("a", 1000), ("b", 300), ("c", 50), ("d", 7)] {
            for _ in 0..n {
                vocab.add_occurrence(word.to_string());
            }
        }
        for _ in 0..20 {
            vocab.add_occurrence(crate::EOS.to_string());
        }
        vocab.sort(1);
        vocab
    }

    #[test]
    fn every_slot_is_a_vocabulary_index() {
        let vocab = vocab();
        let table = UnigramTable::new(&vocab, 10_000);
        assert_eq!(table.len(), 10_000);
        assert!(table.slots().iter().all(|&i| (i as usize) < vocab.len()));
        assert_eq!(*table.slots().last().unwrap() as usize, vocab.len() - 1);
    }

    #[test]
    fn sampling_follows_the_power_law() {
        let vocab = vocab();
        let table = UnigramTable::new(&vocab, 1_000_000);
        let total: f64 = vocab
            .words()
            .iter()
            .map(|vw| (vw.count as f64).powf(POWER))
            .sum();

        let mut hits = vec![0usize; vocab.len()];
        let mut rng = Rng(7);
        let draws = 400_000;
        for _ in 0..draws {
            hits[table.sample(rng.rand_u64())] += 1;
        }
        for (i, vw) in vocab.words().iter().enumerate() {
            let expected = (vw.count as f64).powf(POWER) / total;
            let observed = hits[i] as f64 / draws as f64;
            assert!(
                (expected - observed).abs() < 0.01,
                "word {i}: expected {expected}, observed {observed}"
            );
        }
    }
}
