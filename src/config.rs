use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::real;

/// Fatal configuration problems. Training never starts when one of these
/// comes up.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error(
        "model type '{0}' unknown, choices are: 'complex_asym', 'complex_alt', \
         'real_original', 'real_unique', '2real_asym', '2real_alt'"
    )]
    UnknownModel(String),

    #[error("{0} must be at least 1")]
    Zero(&'static str),

    #[error("adagrad is only supported by the real_* models, not {0}")]
    AdagradUnsupported(ModelType),
}

/// Which embedding parameterization to train.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelType {
    /// Separate word and context matrices.
    RealOriginal,
    /// Context vectors are the word vectors.
    RealUnique,
    /// One real embedding pair for right contexts, one for left contexts.
    TwoRealAsym,
    TwoRealAlt,
    /// Complex embeddings; the imaginary part's sign follows word order.
    ComplexAsym,
    ComplexAlt,
}

/// How the generator assigns `order_sign` to a context position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignStrategy {
    /// `+1` after the center word, `-1` before it.
    Asymmetric,
    /// Alternates with the distance from the window's start.
    Alternating,
}

impl ModelType {
    pub const ALL: [ModelType; 6] = [
        ModelType::RealOriginal,
        ModelType::RealUnique,
        ModelType::TwoRealAsym,
        ModelType::TwoRealAlt,
        ModelType::ComplexAsym,
        ModelType::ComplexAlt,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ModelType::RealOriginal => "real_original",
            ModelType::RealUnique => "real_unique",
            ModelType::TwoRealAsym => "2real_asym",
            ModelType::TwoRealAlt => "2real_alt",
            ModelType::ComplexAsym => "complex_asym",
            ModelType::ComplexAlt => "complex_alt",
        }
    }

    pub fn sign_strategy(self) -> SignStrategy {
        match self {
            ModelType::TwoRealAlt | ModelType::ComplexAlt => SignStrategy::Alternating,
            _ => SignStrategy::Asymmetric,
        }
    }

    pub fn is_real(self) -> bool {
        matches!(self, ModelType::RealOriginal | ModelType::RealUnique)
    }

    /// Number of floats written per word in the vector file.
    pub fn output_size(self, layer1_size: usize) -> usize {
        if self.is_real() {
            layer1_size
        } else {
            2 * layer1_size
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, ConfigError> {
        ModelType::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| ConfigError::UnknownModel(s.to_string()))
    }
}

/// Everything a training run needs to know, fixed before any thread starts.
#[derive(Clone, Debug)]
pub struct TrainConfig {
    pub train_file: PathBuf,
    pub output_file: Option<PathBuf>,
    pub eval_file: Option<PathBuf>,
    pub save_vocab_file: Option<PathBuf>,
    pub read_vocab_file: Option<PathBuf>,
    pub model: ModelType,
    /// Embedding dimension.
    pub layer1_size: usize,
    pub window: usize,
    pub sample: real,
    pub negative: usize,
    pub num_threads: usize,
    pub iter: usize,
    pub min_count: u64,
    pub alpha: real,
    /// Write K-means classes instead of vectors when nonzero.
    pub classes: usize,
    pub binary: bool,
    pub adagrad: bool,
    pub debug_mode: usize,
    /// Training pairs handed to a kernel at a time.
    pub batch_size: usize,
    /// The vocabulary is pruned when it grows past 70% of this.
    pub vocab_hash_size: usize,
    pub unigram_table_size: usize,
}

impl TrainConfig {
    pub fn new(train_file: impl Into<PathBuf>, model: ModelType) -> Self {
        TrainConfig {
            train_file: train_file.into(),
            output_file: None,
            eval_file: None,
            save_vocab_file: None,
            read_vocab_file: None,
            model,
            layer1_size: 100,
            window: 5,
            sample: 1e-3,
            negative: 5,
            num_threads: 12,
            iter: 5,
            min_count: 5,
            alpha: 0.025,
            classes: 0,
            binary: false,
            adagrad: false,
            debug_mode: 2,
            batch_size: 500,
            vocab_hash_size: 30_000_000, // Maximum 30 * 0.7 = 21M words in the vocabulary
            unigram_table_size: 100_000_000,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("size", self.layer1_size),
            ("window", self.window),
            ("threads", self.num_threads),
            ("iter", self.iter),
            ("batch size", self.batch_size),
            ("vocabulary hash size", self.vocab_hash_size),
            ("unigram table size", self.unigram_table_size),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }
        if self.adagrad && !self.model.is_real() {
            return Err(ConfigError::AdagradUnsupported(self.model));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_names_round_trip() {
        for m in ModelType::ALL {
            assert_eq!(m.name().parse::<ModelType>(), Ok(m));
        }
        assert_eq!(
            "complex_symm".parse::<ModelType>(),
            Err(ConfigError::UnknownModel("complex_symm".to_string()))
        );
    }

    #[test]
    fn sign_strategy_follows_suffix() {
        assert_eq!(
            ModelType::ComplexAlt.sign_strategy(),
            SignStrategy::Alternating
        );
        assert_eq!(
            ModelType::TwoRealAlt.sign_strategy(),
            SignStrategy::Alternating
        );
        assert_eq!(
            ModelType::ComplexAsym.sign_strategy(),
            SignStrategy::Asymmetric
        );
        assert_eq!(
            ModelType::RealOriginal.sign_strategy(),
            SignStrategy::Asymmetric
        );
    }

    #[test]
    fn validation_catches_bad_options() {
        let mut config = TrainConfig::new("corpus.txt", ModelType::ComplexAsym);
        assert_eq!(config.validate(), Ok(()));

        config.window = 0;
        assert_eq!(config.validate(), Err(ConfigError::Zero("window")));

        config.window = 5;
        config.adagrad = true;
        assert_eq!(
            config.validate(),
            Err(ConfigError::AdagradUnsupported(ModelType::ComplexAsym))
        );

        config.model = ModelType::RealUnique;
        assert_eq!(config.validate(), Ok(()));
    }
}
