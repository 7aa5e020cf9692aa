//! Word analogy questions ("a is to b as c is to d") scored against the
//! word matrix while training runs.

use std::cmp::Reverse;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use ordered_float::OrderedFloat;

use crate::store::Matrix;
use crate::vocab::Vocabulary;
use crate::{dot, normalize, real};

/// Smallest positive normal `f32`; a prediction must score above this.
const MIN_SCORE: real = 1.175494e-38;

pub struct AnalogyEval {
    /// Word indices `[a, b, c, d]`.
    questions: Vec<[usize; 4]>,
    ignored: usize,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnalogyScore {
    pub correct: usize,
    pub total: usize,
}

impl AnalogyScore {
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64 * 100.0
        }
    }
}

impl AnalogyEval {
    /// Reads questions, one per line. Lines starting with `:` name a
    /// category and are skipped; questions with a word outside the
    /// vocabulary, or without exactly four words, are ignored.
    pub fn load(path: &Path, vocab: &Vocabulary) -> Result<Self> {
        let f = BufReader::new(
            File::open(path)
                .with_context(|| format!("analogy file {} not found", path.display()))?,
        );
        let mut questions = vec![];
        let mut ignored = 0;
        for line in f.lines() {
            let line = line.context("error reading analogy file")?;
            let line = line.trim();
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            let indices = line
                .split_whitespace()
                .map(|w| vocab.search(w))
                .collect::<Option<Vec<usize>>>();
            match indices.as_deref() {
                Some(&[a, b, c, d]) => questions.push([a, b, c, d]),
                _ => ignored += 1,
            }
        }
        log::info!(
            "{}/{} analogy questions loaded",
            questions.len(),
            questions.len() + ignored
        );
        Ok(AnalogyEval { questions, ignored })
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn ignored(&self) -> usize {
        self.ignored
    }

    /// Answers every question with the word nearest to `b - a + c` and
    /// counts the right answers. Works on a copy of `embeddings`; other
    /// threads may keep training meanwhile.
    pub fn evaluate(&self, embeddings: &Matrix) -> AnalogyScore {
        let size = embeddings.dim();
        let mut m = embeddings.snapshot();
        for row in m.chunks_exact_mut(size) {
            normalize(row);
        }

        let mut pred = vec![0.0; size];
        let correct = self
            .questions
            .iter()
            .filter(|&&[a, b, c, d]| {
                let (va, vb, vc) = (
                    &m[a * size..][..size],
                    &m[b * size..][..size],
                    &m[c * size..][..size],
                );
                for i in 0..size {
                    pred[i] = -va[i] + vb[i] + vc[i];
                }
                let best = m
                    .chunks_exact(size)
                    .map(|row| dot(&pred, row))
                    .enumerate()
                    .filter(|&(_, score)| score > MIN_SCORE)
                    .min_by_key(|&(_, score)| Reverse(OrderedFloat(score)))
                    .map_or(0, |(j, _)| j);
                best == d
            })
            .count();

        let score = AnalogyScore {
            correct,
            total: self.questions.len(),
        };
        log::info!(
            "Accuracy over the {} analogy questions: {:.6}%",
            score.total,
            score.accuracy()
        );
        score
    }
}
