use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;

use word2cvec::{real, ModelType, TrainConfig, Word2CVec};

#[derive(Parser)]
#[command(about = "Complex-valued WORD VECTOR estimation toolkit", long_about = None, version)]
struct Options {
    /// Use text data from FILE to train the model
    #[arg(long = "train", value_name = "FILE")]
    train_file: PathBuf,

    /// Use FILE to save the resulting word vectors / word clusters
    #[arg(long = "output", value_name = "FILE")]
    output_file: Option<PathBuf>,

    /// Model to train: real_original, real_unique, 2real_asym, 2real_alt,
    /// complex_asym or complex_alt
    #[arg(long = "model", value_name = "TYPE")]
    model: ModelType,

    /// Set size of word vectors; default is 100
    #[arg(long = "size", default_value_t = 100)]
    layer1_size: usize,

    /// Set max skip length between words
    #[arg(long, default_value_t = 5)]
    window: usize,

    /// Set threshold for occurrence of words. Those that appear with higher
    /// frequency in the training data will be randomly down-sampled; default
    /// is 1e-3, useful range is (0, 1e-5)
    #[arg(long, default_value_t = 1e-3)]
    sample: real,

    /// Number of negative examples; default is 5, common values are 3 - 10 (0 = not used)
    #[arg(long, default_value_t = 5)]
    negative: usize,

    /// Use N threads
    #[arg(long = "threads", value_name = "N", default_value_t = 12)]
    num_threads: usize,

    /// Run more training iterations
    #[arg(long, default_value_t = 5)]
    iter: usize,

    /// Discard words that appear less than N times
    #[arg(long = "min-count", value_name = "N", default_value_t = 5)]
    min_count: u64,

    /// Set the starting learning rate
    #[arg(long, default_value_t = 0.025)]
    alpha: real,

    /// Output word classes rather than word vectors; 0 writes vectors
    #[arg(long, default_value_t = 0)]
    classes: usize,

    /// Set the debug mode (default = 2 = more info during training)
    #[arg(long = "debug", default_value_t = 2)]
    debug_mode: usize,

    /// Save the resulting vectors in binary mode
    #[arg(long)]
    binary: bool,

    /// The vocabulary will be saved to FILE
    #[arg(long = "save-vocab", value_name = "FILE")]
    save_vocab_file: Option<PathBuf>,

    /// The vocabulary will be read from FILE, not constructed from the training data
    #[arg(long = "read-vocab", value_name = "FILE")]
    read_vocab_file: Option<PathBuf>,

    /// Analogy questions to score the word vectors against after every
    /// epoch (real_original only)
    #[arg(long = "eval", value_name = "FILE")]
    eval_file: Option<PathBuf>,

    /// Use AdaGrad step sizes instead of a decaying learning rate (real models only)
    #[arg(long)]
    adagrad: bool,
}

impl Options {
    fn into_config(self) -> TrainConfig {
        let mut config = TrainConfig::new(self.train_file, self.model);
        config.output_file = self.output_file;
        config.eval_file = self.eval_file;
        config.save_vocab_file = self.save_vocab_file;
        config.read_vocab_file = self.read_vocab_file;
        config.layer1_size = self.layer1_size;
        config.window = self.window;
        config.sample = self.sample;
        config.negative = self.negative;
        config.num_threads = self.num_threads;
        config.iter = self.iter;
        config.min_count = self.min_count;
        config.alpha = self.alpha;
        config.classes = self.classes;
        config.binary = self.binary;
        config.adagrad = self.adagrad;
        config.debug_mode = self.debug_mode;
        config
    }
}

fn setup_logging(debug_mode: usize) -> Result<()> {
    let log_level = match debug_mode {
        0 => stderrlog::LogLevelNum::Warn,
        1 => stderrlog::LogLevelNum::Info,
        _ => stderrlog::LogLevelNum::Debug,
    };
    stderrlog::new()
        .module(module_path!())
        .verbosity(log_level)
        .init()
        .context("failed to initialize logging")
}

fn run(options: Options) -> Result<()> {
    setup_logging(options.debug_mode)?;
    let word2cvec = Word2CVec::new(options.into_config())?;
    word2cvec.train_model()
}

fn main() {
    let options = Options::parse();

    if let Err(err) = run(options) {
        eprintln!("{err:#}");
        process::exit(1);
    }
}
