use std::fs;
use std::thread;

use anyhow::{anyhow, Context, Result};

use crate::analogy::AnalogyEval;
use crate::batch::{BatchGenerator, Fill, GeneratorContext};
use crate::config::{ModelType, TrainConfig};
use crate::kernel::{ComplexKernel, DualKernel, Kernel, RealKernel, Sigmoid};
use crate::output;
use crate::progress::Progress;
use crate::store::EmbeddingStore;
use crate::unigram::UnigramTable;
use crate::vocab::Vocabulary;

/// A training run: the configuration plus the vocabulary built for it.
pub struct Word2CVec {
    config: TrainConfig,
    vocab: Vocabulary,
    /// Size of the training file in bytes; worker shards are cut from it.
    file_size: u64,
}

impl Word2CVec {
    /// Checks the configuration and builds the vocabulary, either from the
    /// training file or from a saved vocabulary. Saves the vocabulary if
    /// asked to.
    pub fn new(config: TrainConfig) -> Result<Self> {
        config.validate()?;
        log::info!(
            "Starting training using file {}",
            config.train_file.display()
        );

        let vocab = match &config.read_vocab_file {
            Some(f) => Vocabulary::read(f, config.min_count, config.vocab_hash_size)?,
            None => Vocabulary::learn_from_train_file(
                &config.train_file,
                config.min_count,
                config.vocab_hash_size,
            )?,
        };
        let file_size = fs::metadata(&config.train_file)
            .with_context(|| {
                format!(
                    "training data file {} not found",
                    config.train_file.display()
                )
            })?
            .len();
        if let Some(f) = &config.save_vocab_file {
            vocab.save(f)?;
        }
        Ok(Word2CVec {
            config,
            vocab,
            file_size,
        })
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Trains and writes the vectors (or classes) to the output file. Does
    /// nothing without an output file.
    pub fn train_model(&self) -> Result<()> {
        let Some(output_file) = &self.config.output_file else {
            return Ok(());
        };
        let store = self.train()?;
        output::save(
            output_file,
            &self.vocab,
            &store.output_matrix(),
            store.output_size(),
            self.config.classes,
            self.config.binary,
        )?;
        log::info!(
            "{} written to {}",
            if self.config.classes > 0 {
                "word classes"
            } else {
                "word vectors"
            },
            output_file.display()
        );
        Ok(())
    }

    /// Runs all epochs on all threads and returns the learned parameters.
    pub fn train(&self) -> Result<EmbeddingStore> {
        let config = &self.config;
        anyhow::ensure!(
            self.vocab.len() >= 2,
            "vocabulary is empty: no word occurs at least {} times",
            config.min_count
        );

        let eval = match &config.eval_file {
            Some(f) if config.model == ModelType::RealOriginal => {
                Some(AnalogyEval::load(f, &self.vocab)?)
            }
            Some(_) => {
                log::warn!("analogy evaluation is only run for {}", ModelType::RealOriginal);
                None
            }
            None => None,
        };

        let store = EmbeddingStore::new(
            config.model,
            self.vocab.len(),
            config.layer1_size,
            config.adagrad,
        )?;
        let table = if config.negative > 0 {
            Some(UnigramTable::new(&self.vocab, config.unigram_table_size))
        } else {
            None
        };
        let progress = Progress::new(
            config.alpha,
            config.iter,
            self.vocab.train_words(),
            config.adagrad,
            config.debug_mode > 1,
        );
        let sigmoid = Sigmoid::new();
        let ctx = GeneratorContext {
            config,
            vocab: &self.vocab,
            table: table.as_ref(),
            progress: &progress,
            file_size: self.file_size,
        };

        let store_ref = &store;
        let sigmoid = &sigmoid;
        let eval = eval.as_ref();
        thread::scope(|s| {
            let threads = (0..config.num_threads)
                .map(|id| s.spawn(move || train_thread(ctx, id, store_ref, sigmoid, eval)))
                .collect::<Vec<_>>();
            threads
                .into_iter()
                .enumerate()
                .map(|(id, thread)| match thread.join() {
                    Ok(result) => result.with_context(|| format!("error in worker thread {id}")),
                    Err(_) => Err(anyhow!("worker thread {id} panicked")),
                })
                .collect::<Vec<Result<()>>>()
                .into_iter()
                .collect::<Result<()>>()
        })?;
        progress.finish();
        Ok(store)
    }
}

/// One worker: generates batches from shard `id` and trains the model's
/// kernel on them until the last epoch is done.
fn train_thread<'a>(
    ctx: GeneratorContext<'a>,
    id: usize,
    store: &'a EmbeddingStore,
    sigmoid: &'a Sigmoid,
    eval: Option<&'a AnalogyEval>,
) -> Result<()> {
    let mut gen = BatchGenerator::open(ctx, id)?;
    match store {
        EmbeddingStore::Real(params) => {
            if let (0, Some(eval)) = (id, eval) {
                gen = gen.with_epoch_hook(move || {
                    eval.evaluate(&params.word);
                });
            }
            run_worker(&mut gen, &RealKernel { params, sigmoid }, ctx.progress)
        }
        EmbeddingStore::Dual(params) => {
            run_worker(&mut gen, &DualKernel { params, sigmoid }, ctx.progress)
        }
        EmbeddingStore::Complex(params) => {
            run_worker(&mut gen, &ComplexKernel { params, sigmoid }, ctx.progress)
        }
    }
}

fn run_worker<K: Kernel>(gen: &mut BatchGenerator, kernel: &K, progress: &Progress) -> Result<()> {
    let mut scratch = kernel.scratch();
    let mut batch = vec![];
    loop {
        let fill = gen.fill(&mut batch)?;
        for pair in &batch {
            kernel.train_pair(pair, progress.alpha(), &mut scratch);
        }
        if fill == Fill::Finished {
            return Ok(());
        }
    }
}
