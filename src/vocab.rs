//! Word counting, pruning and frequency sorting.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::text::read_words;
use crate::EOS;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VocabWord {
    pub word: String,
    pub count: u64,
}

/// Words in frequency order, with `</s>` pinned at index 0, plus a hash
/// index from text to position.
pub struct Vocabulary {
    words: Vec<VocabWord>,
    index: HashMap<String, usize>,
    /// Pruning is triggered when the vocabulary grows past 70% of this.
    hash_size: usize,
    /// Words with counts at or below this are dropped by the next reduction.
    min_reduce: u64,
    /// Total occurrences of the words kept.
    train_words: u64,
}

impl Vocabulary {
    /// An empty vocabulary holding only `</s>`.
    pub fn new(hash_size: usize) -> Self {
        let mut vocab = Vocabulary {
            words: Vec::with_capacity(1000),
            index: HashMap::new(),
            hash_size,
            min_reduce: 1,
            train_words: 0,
        };
        vocab.add_word(EOS.to_string());
        vocab
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[VocabWord] {
        &self.words
    }

    pub fn word(&self, i: usize) -> &str {
        &self.words[i].word
    }

    pub fn count(&self, i: usize) -> u64 {
        self.words[i].count
    }

    pub fn train_words(&self) -> u64 {
        self.train_words
    }

    /// Returns position of a word in the vocabulary; if the word is not found, returns None.
    pub fn search(&self, word: &str) -> Option<usize> {
        self.index.get(word).copied()
    }

    /// Adds a word with count 0 and returns its index.
    fn add_word(&mut self, word: String) -> usize {
        let n = self.words.len();
        self.index.insert(word.clone(), n);
        self.words.push(VocabWord { word, count: 0 });
        n
    }

    /// Counts one occurrence of `word`, adding it if it is new. Prunes the
    /// rarest words if the vocabulary has outgrown its hash table.
    pub fn add_occurrence(&mut self, word: String) {
        match self.index.get(&word) {
            Some(&i) => self.words[i].count += 1,
            None => {
                let i = self.add_word(word);
                self.words[i].count = 1;
            }
        }
        if self.words.len() as f64 > self.hash_size as f64 * 0.7 {
            self.reduce();
        }
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (i, vw) in self.words.iter().enumerate() {
            self.index.insert(vw.word.clone(), i);
        }
    }

    /// Reduces the vocabulary by removing infrequent tokens.
    ///
    /// The threshold goes up by one with every call.
    pub fn reduce(&mut self) {
        let min_reduce = self.min_reduce;
        let mut i = 0;
        self.words.retain(|vw| {
            let keep = i == 0 || vw.count > min_reduce;
            i += 1;
            keep
        });
        self.rebuild_index();
        self.min_reduce += 1;
        log::debug!(
            "vocabulary reduced to {} words (min_reduce now {})",
            self.words.len(),
            self.min_reduce
        );
    }

    /// Sorts the vocabulary by frequency and discards words occurring less
    /// than `min_count` times. `</s>` keeps the first position.
    pub fn sort(&mut self, min_count: u64) {
        self.words[1..].sort_by_key(|vw| Reverse(vw.count));

        let mut i = 0;
        self.words.retain(|vw| {
            let keep = i == 0 || vw.count >= min_count;
            i += 1;
            keep
        });
        self.rebuild_index();
        self.train_words = self.words.iter().map(|vw| vw.count).sum();
    }

    /// Scans a whole corpus, counting every word, then sorts and prunes.
    pub fn learn_from_train_file(
        train_file: &Path,
        min_count: u64,
        hash_size: usize,
    ) -> Result<Self> {
        let fin = BufReader::new(
            File::open(train_file)
                .with_context(|| format!("training data file {} not found", train_file.display()))?,
        );
        let mut vocab = Vocabulary::new(hash_size);
        let mut scanned: u64 = 0;
        for word in read_words(fin) {
            let word = word.context("error reading training data file")?;
            scanned += 1;
            if scanned % 1_000_000 == 0 {
                log::debug!("{}M words scanned", scanned / 1_000_000);
            }
            vocab.add_occurrence(word);
        }
        vocab.sort(min_count);
        log::info!("Vocab size: {}", vocab.len());
        log::info!("Words in train file: {}", vocab.train_words);
        Ok(vocab)
    }

    pub fn save(&self, vocab_file: &Path) -> Result<()> {
        let mut fo = BufWriter::new(
            File::create(vocab_file)
                .context("error creating vocab file for write")?,
        );
        for vw in &self.words {
            writeln!(fo, "{} {}", vw.word, vw.count)
                .context("error writing vocab file")?;
        }
        fo.flush().context("error writing vocab file")?;
        Ok(())
    }

    /// Loads `word count` lines written by [`Vocabulary::save`], then sorts
    /// and prunes as if the counts had come from a corpus scan.
    pub fn read(vocab_file: &Path, min_count: u64, hash_size: usize) -> Result<Self> {
        let fin = BufReader::new(File::open(vocab_file).context("vocabulary file not found")?);
        let mut vocab = Vocabulary::new(hash_size);

        for (line_num, line) in fin.lines().enumerate() {
            let line = line.context("error reading vocabulary file")?;
            if line.trim().is_empty() {
                continue;
            }
            let fields = line.split_whitespace().collect::<Vec<&str>>();
            anyhow::ensure!(
                fields.len() == 2,
                "vocabulary file syntax error on line {}",
                line_num + 1
            );
            let count = fields[1].parse::<u64>().with_context(|| {
                format!(
                    "error reading vocabulary file: \
                     unrecognized frequency number format on line {}",
                    line_num + 1
                )
            })?;
            let i = match vocab.search(fields[0]) {
                Some(i) => i,
                None => vocab.add_word(fields[0].to_string()),
            };
            vocab.words[i].count += count;
        }
        vocab.sort(min_count);
        log::info!("Vocab size: {}", vocab.len());
        log::info!("Words in train file: {}", vocab.train_words);
        Ok(vocab)
    }
}
