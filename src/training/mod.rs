//! # Training and evaluation loop
//!
//! The loop is organised bottom-up:
//! - `masked_sequence_loss` and `coverage_loss` score one teacher-forced decoding pass
//! - `train_one_batch` runs a forward pass over a batch and either applies one optimizer update
//! (`StepMode::Train`) or decodes the greedy predictions into text (`StepMode::Test`)
//! - `train` and `test` drive the batch step over complete epochs, writing periodic checkpoints
//! during training and ROUGE scoring the predictions during evaluation
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! # use rust_pgn::pgn::PointerGeneratorModel;
//! # fn model() -> Box<dyn PointerGeneratorModel> { unimplemented!() }
//! use rust_pgn::data::{read_tokenized_lines, MaxLengths, SummarizationDataset, Vocab};
//! use rust_pgn::training::{train, Adam, AdamConfig, Checkpoint, TrainLoopConfig};
//! use tch::Device;
//!
//! let model = model();
//! let vocab = Vocab::from_file("path/to/vocab.txt")?;
//! let dataset = SummarizationDataset::from_examples(
//!     &vocab,
//!     &read_tokenized_lines("path/to/train_X.txt")?,
//!     &read_tokenized_lines("path/to/train_y.txt")?,
//!     MaxLengths::default(),
//!     64,
//!     Device::cuda_if_available(),
//! )?;
//!
//! let mut optimizer = Adam::new(AdamConfig {
//!     clip_value: Some(2.0),
//!     ..Default::default()
//! });
//! let mut checkpoint = Checkpoint::new("./train_checkpoints", "ckpt");
//! let summary = train(
//!     model.as_ref(),
//!     &mut optimizer,
//!     &mut checkpoint,
//!     &dataset,
//!     TrainLoopConfig::default(),
//! )?;
//! # Ok(())
//! # }
//! ```

mod checkpoint;
mod driver;
mod loss;
mod optimizer;
mod step;

pub use checkpoint::{Checkpoint, CheckpointSaver};
pub use driver::{test, train, EvaluationSummary, TrainLoopConfig, TrainingSummary};
pub use loss::{coverage_loss, masked_sequence_loss};
pub use optimizer::{Adam, AdamConfig, GradientOptimizer};
pub use step::{train_one_batch, StepMode, StepOutput};
