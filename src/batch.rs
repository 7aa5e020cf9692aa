//! Turning one worker's shard of the corpus into batches of training pairs.
//!
//! A [`BatchGenerator`] walks its shard sentence by sentence, subsamples
//! frequent words, picks a random window shrink for every center position
//! and emits, for every context offset, one positive pair followed by the
//! negative samples drawn for it. It stops whenever the caller's batch is
//! full and picks up exactly where it left off on the next call.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{SignStrategy, TrainConfig};
use crate::progress::{Progress, REPORT_INTERVAL};
use crate::text::read_word;
use crate::unigram::UnigramTable;
use crate::vocab::Vocabulary;
use crate::{real, Rng, MAX_SENTENCE_LENGTH};

/// One (center, target) comparison for a kernel to train on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingPair {
    /// Index of the word whose word-role vector is trained; its update is
    /// buffered until `apply_update`.
    pub center: usize,
    /// Index of the word whose context-role vector is compared against.
    pub target: usize,
    /// `true` for an observed pair, `false` for a negative sample.
    pub label: bool,
    /// `+1.0` or `-1.0`. Tells order-aware models which side of the
    /// center the context came from.
    pub order_sign: real,
    /// Last pair of its group: commit the buffered center-word gradient.
    pub apply_update: bool,
}

/// The subsampling threshold for a word with `count` occurrences: the
/// word is kept when this is at least a uniform draw from `[0, 1)`.
/// Words rarer than `sample * train_words` always come out above 1.
pub fn keep_probability(count: u64, sample: real, train_words: u64) -> real {
    let k = sample * train_words as real;
    let ratio = count as real / k;
    ((((ratio as f64).sqrt() + 1.0) * k as f64) / count as f64) as real
}

/// The order sign of context offset `a` in a window of radius `window`
/// shrunk by `b`. Offsets run from `b` to `2 * window - b`; `window` itself
/// is the center.
pub fn order_sign(strategy: SignStrategy, a: usize, b: usize, window: usize) -> real {
    let positive = match strategy {
        SignStrategy::Asymmetric => a > window,
        SignStrategy::Alternating if a < window => (a - b) % 2 == 1,
        SignStrategy::Alternating => (a - b + 1) % 2 == 1,
    };
    if positive {
        1.0
    } else {
        -1.0
    }
}

/// What [`BatchGenerator::fill`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fill {
    /// The batch is full and more pairs will follow.
    Full,
    /// The last epoch is done. The batch holds whatever was generated
    /// before that, possibly nothing.
    Finished,
}

/// Everything workers share while generating.
#[derive(Clone, Copy)]
pub struct GeneratorContext<'a> {
    pub config: &'a TrainConfig,
    pub vocab: &'a Vocabulary,
    /// Required when `config.negative > 0`.
    pub table: Option<&'a UnigramTable>,
    pub progress: &'a Progress,
    /// Size of the training file in bytes.
    pub file_size: u64,
}

impl GeneratorContext<'_> {
    /// Byte offset where worker `id`'s shard begins.
    pub fn shard_start(&self, id: usize) -> u64 {
        self.file_size / self.config.num_threads as u64 * id as u64
    }
}

/// All the mutable state of a generator, enough to resume it later.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratorState {
    /// Position of the reader in the training file.
    offset: u64,
    /// Current context offset within the window.
    a: usize,
    /// How much the current window is shrunk.
    b: usize,
    /// The word at `sentence_position`.
    word: usize,
    sentence: Vec<usize>,
    sentence_position: usize,
    /// Pairs of the current group not yet handed out.
    group: VecDeque<TrainingPair>,
    /// In-vocabulary words read this epoch.
    word_count: u64,
    /// `word_count` at the last progress report.
    last_word_count: u64,
    epochs_left: usize,
    rng: Rng,
}

impl GeneratorState {
    pub fn epochs_left(&self) -> usize {
        self.epochs_left
    }
}

pub struct BatchGenerator<'a> {
    ctx: GeneratorContext<'a>,
    id: usize,
    reader: BufReader<File>,
    state: GeneratorState,
    on_epoch_end: Option<Box<dyn FnMut() + 'a>>,
}

impl<'a> BatchGenerator<'a> {
    /// A generator for worker `id`, positioned at the start of its shard.
    pub fn open(ctx: GeneratorContext<'a>, id: usize) -> Result<Self> {
        let window = ctx.config.window as u64;
        let mut rng = Rng(id as u64);
        let b = (rng.rand_u64() % window) as usize;
        let state = GeneratorState {
            offset: ctx.shard_start(id),
            a: b,
            b,
            word: 0,
            sentence: Vec::with_capacity(MAX_SENTENCE_LENGTH + 1),
            sentence_position: 0,
            group: VecDeque::with_capacity(ctx.config.negative + 1),
            word_count: 0,
            last_word_count: 0,
            epochs_left: ctx.config.iter,
            rng,
        };
        Self::resume(ctx, id, state)
    }

    /// A generator continuing from a [`snapshot`](Self::snapshot).
    pub fn resume(ctx: GeneratorContext<'a>, id: usize, state: GeneratorState) -> Result<Self> {
        let file = File::open(&ctx.config.train_file).with_context(|| {
            format!(
                "training data file {} not found",
                ctx.config.train_file.display()
            )
        })?;
        let mut reader = BufReader::new(file);
        reader
            .seek(SeekFrom::Start(state.offset))
            .context("error seeking within training file")?;
        Ok(BatchGenerator {
            ctx,
            id,
            reader,
            state,
            on_epoch_end: None,
        })
    }

    /// Runs `hook` at the end of every epoch, including the last.
    pub fn with_epoch_hook(mut self, hook: impl FnMut() + 'a) -> Self {
        self.on_epoch_end = Some(Box::new(hook));
        self
    }

    pub fn snapshot(&mut self) -> Result<GeneratorState> {
        self.state.offset = self
            .reader
            .stream_position()
            .context("error reading position in training file")?;
        Ok(self.state.clone())
    }

    /// Clears `batch` and fills it with up to `config.batch_size` pairs.
    pub fn fill(&mut self, batch: &mut Vec<TrainingPair>) -> Result<Fill> {
        batch.clear();
        if self.state.epochs_left == 0 {
            return Ok(Fill::Finished);
        }
        let window = self.ctx.config.window;
        loop {
            if let Some(pair) = self.state.group.pop_front() {
                batch.push(pair);
                if batch.len() >= self.ctx.config.batch_size {
                    return Ok(Fill::Full);
                }
                continue;
            }

            if self.state.a == self.state.b && !self.next_center()? {
                return Ok(Fill::Finished);
            }

            let end = window * 2 + 1 - self.state.b;
            while self.state.a < end && self.state.group.is_empty() {
                if self.state.a != window {
                    self.build_group();
                }
                self.state.a += 1;
            }

            if self.state.group.is_empty() {
                // Window done: move to the next center word.
                let st = &mut self.state;
                st.b = (st.rng.rand_u64() % window as u64) as usize;
                st.a = st.b;
                st.sentence_position += 1;
                if st.sentence_position >= st.sentence.len() {
                    st.sentence.clear();
                }
            }
        }
    }

    /// Sets up the next center word, reading a new sentence or starting a
    /// new epoch as needed. Returns `false` once the last epoch is over.
    fn next_center(&mut self) -> Result<bool> {
        let words_per_thread = self.ctx.vocab.train_words() / self.ctx.config.num_threads as u64;
        loop {
            let st = &mut self.state;
            if st.word_count - st.last_word_count > REPORT_INTERVAL {
                self.ctx.progress.report(st.word_count - st.last_word_count);
                st.last_word_count = st.word_count;
            }

            let at_end_of_file = if self.state.sentence.is_empty() {
                let eof = self.read_sentence()?;
                self.state.sentence_position = 0;
                eof
            } else {
                false
            };

            let st = &mut self.state;
            if (at_end_of_file && st.sentence.is_empty()) || st.word_count > words_per_thread {
                self.end_epoch()?;
                if self.state.epochs_left == 0 {
                    return Ok(false);
                }
                continue;
            }

            // An empty sentence (a blank line) yields no pairs but still
            // consumes its window draw.
            if let Some(&word) = st.sentence.get(st.sentence_position) {
                st.word = word;
            }
            return Ok(true);
        }
    }

    /// Reads words up to the next sentence break. Returns `true` if the end
    /// of the file was reached.
    fn read_sentence(&mut self) -> Result<bool> {
        let sample = self.ctx.config.sample;
        let train_words = self.ctx.vocab.train_words();
        let st = &mut self.state;
        loop {
            let Some(text) = read_word(&mut self.reader)
                .context("error reading a word from training data")?
            else {
                return Ok(true);
            };
            let Some(word) = self.ctx.vocab.search(&text) else {
                continue;
            };
            st.word_count += 1;
            if word == 0 {
                return Ok(false);
            }
            // The subsampling randomly discards frequent words while keeping the ranking same
            if sample > 0.0 {
                let ran = keep_probability(self.ctx.vocab.count(word), sample, train_words);
                if ran < st.rng.rand_real() {
                    continue;
                }
            }
            st.sentence.push(word);
            if st.sentence.len() >= MAX_SENTENCE_LENGTH {
                return Ok(false);
            }
        }
    }

    fn end_epoch(&mut self) -> Result<()> {
        let progress = self.ctx.progress;
        let st = &mut self.state;
        progress.add_words(st.word_count - st.last_word_count);
        st.epochs_left -= 1;
        st.word_count = 0;
        st.last_word_count = 0;
        st.sentence.clear();
        self.reader
            .seek(SeekFrom::Start(self.ctx.shard_start(self.id)))
            .context("error seeking within training file")?;
        log::debug!(
            "thread {}: epoch done, {} left",
            self.id,
            self.state.epochs_left
        );
        if let Some(hook) = &mut self.on_epoch_end {
            hook();
        }
        Ok(())
    }

    /// Queues the positive pair for context offset `a` and its negatives.
    fn build_group(&mut self) {
        let config = self.ctx.config;
        let st = &mut self.state;
        let c = st.sentence_position as isize - config.window as isize + st.a as isize;
        if c < 0 || c >= st.sentence.len() as isize {
            return;
        }
        let last_word = st.sentence[c as usize];
        let order_sign = order_sign(config.model.sign_strategy(), st.a, st.b, config.window);
        let pair = |target, label| TrainingPair {
            center: last_word,
            target,
            label,
            order_sign,
            apply_update: false,
        };

        st.group.push_back(pair(st.word, true));
        if let Some(table) = self.ctx.table {
            let vocab_size = self.ctx.vocab.len() as u64;
            for _ in 0..config.negative {
                let r = st.rng.rand_u64();
                let mut target = table.sample(r);
                if target == 0 {
                    target = (r % (vocab_size - 1) + 1) as usize;
                }
                if target == st.word {
                    continue;
                }
                st.group.push_back(pair(target, false));
            }
        }
        if let Some(last) = st.group.back_mut() {
            last.apply_update = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use tempdir::TempDir;

    use super::*;
    use crate::config::ModelType;

    struct Setup {
        _dir: TempDir,
        config: TrainConfig,
        vocab: Vocabulary,
        table: UnigramTable,
        progress: Progress,
        file_size: u64,
    }

    impl Setup {
        fn new(text: &str, configure: impl FnOnce(&mut TrainConfig)) -> Setup {
            let dir = TempDir::new("batch_test").unwrap();
            let path = dir.path().join("corpus.txt");
            std::fs::write(&path, text).unwrap();
            let mut config = TrainConfig::new(&path, ModelType::RealOriginal);
            config.min_count = 1;
            config.num_threads = 1;
            config.iter = 1;
            config.sample = 0.0;
            config.negative = 0;
            config.vocab_hash_size = 1000;
            configure(&mut config);
            let vocab = Vocabulary::learn_from_train_file(&config.train_file, 1, 1000).unwrap();
            let table = UnigramTable::new(&vocab, 10_000);
            let progress = Progress::new(
                config.alpha,
                config.iter,
                vocab.train_words(),
                false,
                false,
            );
            Setup {
                _dir: dir,
                config,
                vocab,
                table,
                progress,
                file_size: text.len() as u64,
            }
        }

        fn ctx(&self) -> GeneratorContext<'_> {
            GeneratorContext {
                config: &self.config,
                vocab: &self.vocab,
                table: Some(&self.table),
                progress: &self.progress,
                file_size: self.file_size,
            }
        }
    }

    fn drain(gen: &mut BatchGenerator) -> Vec<TrainingPair> {
        let mut all = vec![];
        let mut batch = vec![];
        loop {
            let fill = gen.fill(&mut batch).unwrap();
            all.extend_from_slice(&batch);
            if fill == Fill::Finished {
                return all;
            }
            assert_eq!(batch.len(), gen.ctx.config.batch_size);
        }
    }

    fn corpus() -> String {
        let mut text = String::new();
        for i in 0..200 {
            let words = [
                "the", "cat", "sat", "on", "a", "mat", "and", "the", "dog", "ran",
            ];
            for j in 0..(i % 7 + 3) {
                text.push_str(words[(i * 3 + j) % words.len()]);
                text.push(' ');
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn single_sentence_with_unit_window() {
        let setup = Setup::new("a b c\n", |c| c.window = 1);
        let (a, b, c) = (
            setup.vocab.search("a").unwrap(),
            setup.vocab.search("b").unwrap(),
            setup.vocab.search("c").unwrap(),
        );
        let mut gen = BatchGenerator::open(setup.ctx(), 0).unwrap();
        let pairs = drain(&mut gen);
        let got: Vec<(usize, usize, real)> = pairs
            .iter()
            .map(|p| (p.center, p.target, p.order_sign))
            .collect();
        assert_eq!(
            got,
            [(b, a, 1.0), (a, b, -1.0), (c, b, 1.0), (b, c, -1.0)]
        );
        assert!(pairs.iter().all(|p| p.label && p.apply_update));
    }

    #[test]
    fn groups_end_with_exactly_one_flush() {
        let setup = Setup::new(&corpus(), |c| {
            c.negative = 4;
            c.window = 3;
            c.batch_size = 37;
            c.iter = 2;
        });
        let vocab_size = setup.vocab.len();
        let mut gen = BatchGenerator::open(setup.ctx(), 0).unwrap();
        let pairs = drain(&mut gen);
        assert!(pairs.len() > 1000);

        let mut positive_target = None;
        for (i, p) in pairs.iter().enumerate() {
            assert!(p.center < vocab_size && p.target < vocab_size);
            assert!(p.order_sign == 1.0 || p.order_sign == -1.0);
            if p.label {
                if i > 0 {
                    assert!(pairs[i - 1].apply_update, "group before {i} never flushed");
                }
                positive_target = Some(p.target);
            } else {
                assert_ne!(p.target, 0);
                assert_ne!(Some(p.target), positive_target);
            }
            let last_of_group = pairs.get(i + 1).map_or(true, |next| next.label);
            assert_eq!(p.apply_update, last_of_group, "pair {i}");
        }
    }

    #[test]
    fn every_epoch_runs_the_hook() {
        let setup = Setup::new("a b c\n", |c| {
            c.window = 1;
            c.iter = 3;
        });
        let epochs = Cell::new(0);
        let mut gen = BatchGenerator::open(setup.ctx(), 0)
            .unwrap()
            .with_epoch_hook(|| epochs.set(epochs.get() + 1));
        let pairs = drain(&mut gen);
        assert_eq!(pairs.len(), 12);
        assert_eq!(epochs.get(), 3);
        assert_eq!(setup.progress.words_processed(), 12);

        let mut batch = vec![];
        assert_eq!(gen.fill(&mut batch).unwrap(), Fill::Finished);
        assert!(batch.is_empty());
        assert_eq!(epochs.get(), 3);
    }

    #[test]
    fn last_line_without_newline_is_trained() {
        let setup = Setup::new("a b c a b c a b c", |c| c.window = 1);
        let mut gen = BatchGenerator::open(setup.ctx(), 0).unwrap();
        let pairs = drain(&mut gen);
        assert_eq!(pairs.len(), 16);
    }

    #[test]
    fn resumed_generator_continues_identically() {
        let setup = Setup::new(&corpus(), |c| {
            c.negative = 2;
            c.window = 4;
            c.batch_size = 23;
            c.sample = 1e-2;
        });
        let mut batch = vec![];
        let mut gen = BatchGenerator::open(setup.ctx(), 0).unwrap();
        for _ in 0..5 {
            assert_eq!(gen.fill(&mut batch).unwrap(), Fill::Full);
        }
        let bytes = bincode::serialize(&gen.snapshot().unwrap()).unwrap();
        let expected = drain(&mut gen);

        let state: GeneratorState = bincode::deserialize(&bytes).unwrap();
        assert_eq!(state.epochs_left(), 1);
        let mut resumed = BatchGenerator::resume(setup.ctx(), 0, state).unwrap();
        assert_eq!(drain(&mut resumed), expected);
    }

    #[test]
    fn zero_threshold_keeps_every_word() {
        let text = format!("{}\n", ["x"; 50].join(" "));
        let setup = Setup::new(&text, |c| c.window = 1);
        let mut gen = BatchGenerator::open(setup.ctx(), 0).unwrap();
        assert_eq!(drain(&mut gen).len(), 2 * 49);

        let setup = Setup::new(&text, |c| {
            c.window = 1;
            c.sample = 1e-3;
        });
        let mut gen = BatchGenerator::open(setup.ctx(), 0).unwrap();
        assert!(drain(&mut gen).len() < 2 * 49);
    }

    #[test]
    fn subsampling_discards_only_frequent_words() {
        assert!(keep_probability(1, 1e-3, 1_000_000) > 1.0);
        assert!(keep_probability(1000, 1e-3, 1_000_000) > 1.0);
        let frequent = keep_probability(100_000, 1e-3, 1_000_000);
        assert!(frequent > 0.0 && frequent < 1.0);
        assert!(keep_probability(200_000, 1e-3, 1_000_000) < frequent);
    }

    #[test]
    fn order_signs() {
        use SignStrategy::*;
        let asym: Vec<real> = [0, 1, 2, 4, 5, 6]
            .iter()
            .map(|&a| order_sign(Asymmetric, a, 0, 3))
            .collect();
        assert_eq!(asym, [-1.0, -1.0, -1.0, 1.0, 1.0, 1.0]);

        let alt: Vec<real> = [0, 1, 2, 4, 5, 6]
            .iter()
            .map(|&a| order_sign(Alternating, a, 0, 3))
            .collect();
        assert_eq!(alt, [-1.0, 1.0, -1.0, 1.0, -1.0, 1.0]);

        // Shrunk window: counting starts at b.
        assert_eq!(order_sign(Alternating, 1, 1, 3), -1.0);
        assert_eq!(order_sign(Alternating, 4, 1, 3), -1.0);
    }
}
