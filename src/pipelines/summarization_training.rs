// Copyright 2019 Guillaume Becquin
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Summarization training pipeline
//!
//! Single entry point reading a `TrainingConfig` and either training a pointer-generator model on
//! the training part of a dataset (`Mode::Train`) or evaluating it on the held-out part
//! (`Mode::Test`). The optimizer and checkpoint manager are built from the configuration, and the
//! latest checkpoint is restored first when `use_checkpoint` is set.
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! # use rust_pgn::pgn::PointerGeneratorModel;
//! # fn build_model(gru_units: i64, att_units: i64) -> Box<dyn PointerGeneratorModel> { unimplemented!() }
//! use rust_pgn::data::Vocab;
//! use rust_pgn::pipelines::summarization_training::{
//!     load_dataset, train_test_interface, TrainingConfig,
//! };
//! use rust_pgn::Config;
//! use tch::Device;
//!
//! let config = TrainingConfig::from_file("path/to/params.json")?;
//! let vocab = Vocab::from_file("path/to/vocab.txt")?;
//! let dataset = load_dataset(
//!     &config,
//!     &vocab,
//!     "./data/train_X_pad.txt",
//!     "./data/train_y_pad.txt",
//!     Device::cuda_if_available(),
//! )?;
//! let model = build_model(config.gru_units, config.att_units);
//! let summary = train_test_interface(&config, model.as_ref(), &vocab, dataset)?;
//! # Ok(())
//! # }
//! ```

use crate::common::error::PgnError;
use crate::common::file_utils::DEFAULT_CHECKPOINT_DIRECTORY;
use crate::common::Config;
use crate::data::{read_tokenized_lines, BatchSource, MaxLengths, SummarizationDataset, Vocab};
use crate::metrics::Rouge;
use crate::pgn::PointerGeneratorModel;
use crate::training::{
    test, train, Adam, AdamConfig, Checkpoint, EvaluationSummary, TrainLoopConfig,
    TrainingSummary,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tch::Device;
use tracing::{info, warn};

/// Prefix of the checkpoint files written in the checkpoint directory
pub const CHECKPOINT_PREFIX: &str = "ckpt";

/// # Pipeline mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Train on the training part of the dataset
    Train,
    /// Evaluate on the held-out part of the dataset
    Test,
}

/// # Configuration for summarization training and evaluation
/// Missing fields take their default value, so that partial JSON files can be used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Pipeline mode (default: train)
    pub mode: Mode,
    /// Encoder and decoder sequence caps (default: 100 / 34)
    pub max_lens: MaxLengths,
    /// Number of examples per batch (default: 64)
    #[serde(alias = "batch_sz")]
    pub batch_size: usize,
    /// Fraction of the examples held out for evaluation (default: 0.05)
    pub test_percent: f64,
    /// Recurrent units of the encoder and decoder, used when building the model (default: 512)
    pub gru_units: i64,
    /// Attention units, used when building the model (default: 64)
    pub att_units: i64,
    /// Adam learning rate (default: 1e-3)
    pub learning_rate: f64,
    /// Element-wise gradient clipping value, disabled when absent (default: 2.0)
    #[serde(alias = "clipvalue")]
    pub clip_value: Option<f64>,
    /// Directory holding the checkpoints (default: `PGN_CHECKPOINT_DIR` or `./train_checkpoints`)
    pub checkpoint_dir: PathBuf,
    /// Checkpoint interval in epochs (default: 5)
    #[serde(alias = "save_chkp_epoch")]
    pub save_checkpoint_epoch: usize,
    /// Restore the latest checkpoint before running (default: false)
    pub use_checkpoint: bool,
    /// Number of training epochs (default: 15)
    pub train_epoch: usize,
    /// Weight of the coverage penalty during training (default: 0.5)
    #[serde(alias = "cov_loss_wt")]
    pub coverage_loss_weight: f64,
}

impl Config for TrainingConfig {}

impl Default for TrainingConfig {
    fn default() -> TrainingConfig {
        TrainingConfig {
            mode: Mode::Train,
            max_lens: MaxLengths::default(),
            batch_size: 64,
            test_percent: 0.05,
            gru_units: 512,
            att_units: 64,
            learning_rate: 1e-3,
            clip_value: Some(2.0),
            checkpoint_dir: DEFAULT_CHECKPOINT_DIRECTORY.clone(),
            save_checkpoint_epoch: 5,
            use_checkpoint: false,
            train_epoch: 15,
            coverage_loss_weight: 0.5,
        }
    }
}

impl TrainingConfig {
    /// Checks the values that would otherwise fail late in the run.
    pub fn validate(&self) -> Result<(), PgnError> {
        if self.batch_size == 0 {
            return Err(PgnError::InvalidConfigurationError(
                "batch_size must be positive".into(),
            ));
        }
        if self.save_checkpoint_epoch == 0 {
            return Err(PgnError::InvalidConfigurationError(
                "save_checkpoint_epoch must be positive".into(),
            ));
        }
        if !(self.learning_rate > 0.0) {
            return Err(PgnError::InvalidConfigurationError(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(0.0..1.0).contains(&self.test_percent) {
            return Err(PgnError::InvalidConfigurationError(format!(
                "test_percent must be in [0, 1), got {}",
                self.test_percent
            )));
        }
        if let Some(clip_value) = self.clip_value {
            if !(clip_value > 0.0) {
                return Err(PgnError::InvalidConfigurationError(format!(
                    "clip_value must be positive, got {}",
                    clip_value
                )));
            }
        }
        if self.max_lens.encoder == 0 || self.max_lens.decoder < 2 {
            return Err(PgnError::InvalidConfigurationError(format!(
                "Invalid max_lens {:?}",
                self.max_lens
            )));
        }
        Ok(())
    }

    pub fn adam_config(&self) -> AdamConfig {
        AdamConfig {
            learning_rate: self.learning_rate,
            clip_value: self.clip_value,
            ..Default::default()
        }
    }

    pub fn train_loop_config(&self) -> TrainLoopConfig {
        TrainLoopConfig {
            epochs: self.train_epoch,
            save_every: self.save_checkpoint_epoch,
            coverage_loss_weight: self.coverage_loss_weight,
        }
    }
}

/// # Outcome of `train_test_interface`
#[derive(Debug, Clone, PartialEq)]
pub enum RunSummary {
    Train(TrainingSummary),
    Test(EvaluationSummary),
}

/// Reads pre-tokenized source and target files (one whitespace separated sequence per line) and
/// encodes them with the sequence caps and batch size of the configuration.
pub fn load_dataset<P: AsRef<Path>>(
    config: &TrainingConfig,
    vocab: &Vocab,
    sources_path: P,
    targets_path: P,
    device: Device,
) -> Result<SummarizationDataset, PgnError> {
    config.validate()?;
    let sources = read_tokenized_lines(sources_path)?;
    let targets = read_tokenized_lines(targets_path)?;
    info!("Loaded {} examples", sources.len());
    SummarizationDataset::from_examples(
        vocab,
        &sources,
        &targets,
        config.max_lens,
        config.batch_size,
        device,
    )
}

/// Trains or evaluates a model according to `config.mode`.
///
/// The dataset is split with `config.test_percent`: training uses the leading part, evaluation the
/// held-out tail. When `config.use_checkpoint` is set the latest checkpoint of
/// `config.checkpoint_dir` is restored first; a missing checkpoint is reported and the run starts
/// from the current parameters.
///
/// # Arguments
///
/// * `config` - `TrainingConfig`
/// * `model` - pointer-generator model, built with `config.gru_units` and `config.att_units`
/// * `vocab` - base vocabulary of the model
/// * `dataset` - full dataset, batched with `config.batch_size`
pub fn train_test_interface<M>(
    config: &TrainingConfig,
    model: &M,
    vocab: &Vocab,
    dataset: SummarizationDataset,
) -> Result<RunSummary, PgnError>
where
    M: PointerGeneratorModel + ?Sized,
{
    config.validate()?;
    if dataset.batch_size() != config.batch_size {
        return Err(PgnError::InvalidConfigurationError(format!(
            "Dataset is batched by {}, configuration expects {}",
            dataset.batch_size(),
            config.batch_size
        )));
    }
    let (train_dataset, test_dataset) = dataset.split(config.test_percent)?;
    info!(
        "{} training examples, {} held-out examples",
        train_dataset.len(),
        test_dataset.len()
    );

    let mut optimizer = Adam::new(config.adam_config());
    let mut checkpoint = Checkpoint::new(&config.checkpoint_dir, CHECKPOINT_PREFIX);
    if config.use_checkpoint {
        match checkpoint.restore_latest(&model.parameter_groups(), &mut optimizer) {
            Ok(path) => info!("Restored checkpoint {}", path.display()),
            Err(PgnError::CheckpointUnavailable(message)) => {
                warn!("{}, starting from the current parameters", message)
            }
            Err(error) => return Err(error),
        }
    }

    match config.mode {
        Mode::Train => Ok(RunSummary::Train(train(
            model,
            &mut optimizer,
            &mut checkpoint,
            &train_dataset,
            config.train_loop_config(),
        )?)),
        Mode::Test => Ok(RunSummary::Test(test(
            model,
            vocab,
            &test_dataset,
            &Rouge::new(),
        )?)),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_values() {
        let config = TrainingConfig::default();
        assert_eq!(config.mode, Mode::Train);
        assert_eq!(config.max_lens, MaxLengths::default());
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.clip_value, Some(2.0));
        assert_eq!(config.save_checkpoint_epoch, 5);
        assert_eq!(config.train_epoch, 15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_with_legacy_keys() {
        let config: TrainingConfig = serde_json::from_str(
            r#"{"mode": "test", "batch_sz": 8, "clipvalue": 1.5, "cov_loss_wt": 1.0,
                "max_lens": {"encoder": 50, "decoder": 20}, "use_checkpoint": true}"#,
        )
        .unwrap();
        assert_eq!(config.mode, Mode::Test);
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.clip_value, Some(1.5));
        assert_eq!(config.coverage_loss_weight, 1.0);
        assert_eq!(config.max_lens.encoder, 50);
        assert!(config.use_checkpoint);
        assert_eq!(config.learning_rate, 1e-3);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let invalid = vec![
            TrainingConfig {
                batch_size: 0,
                ..Default::default()
            },
            TrainingConfig {
                save_checkpoint_epoch: 0,
                ..Default::default()
            },
            TrainingConfig {
                learning_rate: 0.0,
                ..Default::default()
            },
            TrainingConfig {
                test_percent: 1.0,
                ..Default::default()
            },
            TrainingConfig {
                clip_value: Some(-1.0),
                ..Default::default()
            },
        ];
        for config in invalid {
            assert!(matches!(
                config.validate(),
                Err(PgnError::InvalidConfigurationError(_))
            ));
        }
    }

    #[test]
    fn derived_configurations() {
        let config = TrainingConfig {
            learning_rate: 0.01,
            clip_value: None,
            train_epoch: 3,
            save_checkpoint_epoch: 2,
            ..Default::default()
        };
        let adam = config.adam_config();
        assert_eq!(adam.learning_rate, 0.01);
        assert_eq!(adam.clip_value, None);
        assert_eq!(adam.beta1, 0.9);
        let train_loop = config.train_loop_config();
        assert_eq!(train_loop.epochs, 3);
        assert_eq!(train_loop.save_every, 2);
    }
}
