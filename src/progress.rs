use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

use crate::real;
use crate::store::Real;

/// Words a worker processes between two reports.
pub const REPORT_INTERVAL: u64 = 10_000;

/// Training progress shared by all workers, and the learning rate derived
/// from it.
pub struct Progress {
    word_count_actual: AtomicU64,
    alpha: Real,
    starting_alpha: real,
    /// `iter * train_words + 1`
    total: u64,
    adagrad: bool,
    start: Instant,
    bar: ProgressBar,
}

impl Progress {
    pub fn new(
        starting_alpha: real,
        iter: usize,
        train_words: u64,
        adagrad: bool,
        show: bool,
    ) -> Self {
        let total = iter as u64 * train_words + 1;
        let bar = if show {
            let bar = ProgressBar::new(total);
            if let Ok(style) =
                ProgressStyle::with_template("{bar:40} {percent:>3}% {per_sec} alpha {msg}")
            {
                bar.set_style(style);
            }
            bar
        } else {
            ProgressBar::hidden()
        };
        let alpha = Real::default();
        alpha.set(starting_alpha);
        Progress {
            word_count_actual: AtomicU64::new(0),
            alpha,
            starting_alpha,
            total,
            adagrad,
            start: Instant::now(),
            bar,
        }
    }

    /// The current learning rate.
    pub fn alpha(&self) -> real {
        self.alpha.get()
    }

    pub fn words_processed(&self) -> u64 {
        self.word_count_actual.load(Ordering::Relaxed)
    }

    /// Adds `n` newly processed words to the total and decays the learning
    /// rate accordingly.
    pub fn report(&self, n: u64) {
        let word_count_actual = self.word_count_actual.fetch_add(n, Ordering::Relaxed) + n;
        self.bar.set_position(word_count_actual);

        let mut alpha = self.alpha.get();
        if !self.adagrad {
            alpha = self.starting_alpha * (1.0 - word_count_actual as real / self.total as real);
        }
        if alpha < self.starting_alpha * 0.0001 {
            alpha = self.starting_alpha * 0.0001;
        }
        self.alpha.set(alpha);
        self.bar.set_message(format!("{alpha:.6}"));
    }

    /// Counts words at the end of an epoch without touching the learning
    /// rate.
    pub fn add_words(&self, n: u64) {
        let word_count_actual = self.word_count_actual.fetch_add(n, Ordering::Relaxed) + n;
        self.bar.set_position(word_count_actual);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
        log::debug!(
            "{} words processed in {:.1}s",
            self.words_processed(),
            self.start.elapsed().as_secs_f64()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learning_rate_decays_linearly_to_a_floor() {
        let p = Progress::new(0.025, 1, 99_999, false, false);
        assert_eq!(p.alpha(), 0.025);
        p.report(50_000);
        assert!((p.alpha() - 0.0125).abs() < 1e-6);
        p.report(60_000);
        assert_eq!(p.alpha(), 0.025 * 0.0001);
        assert_eq!(p.words_processed(), 110_000);
    }

    #[test]
    fn adagrad_keeps_the_rate() {
        let p = Progress::new(0.1, 5, 1000, true, false);
        p.report(4000);
        assert_eq!(p.alpha(), 0.1);
        p.add_words(1000);
        assert_eq!(p.words_processed(), 5000);
        assert_eq!(p.alpha(), 0.1);
    }
}
