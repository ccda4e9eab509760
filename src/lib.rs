//! # Pointer-generator summarization training in Rust
//!
//! Training and evaluation loop for pointer-generator summarization models (See, Liu, Manning, 2017)
//! built on [tch-rs](https://github.com/LaurentMazare/tch-rs). The model architecture is provided by
//! the user through the `PointerGeneratorModel` trait; this crate provides:
//! - the vocabulary with per-example out-of-vocabulary (OOV) slots, datasets and batching (`data`)
//! - the masked sequence loss and the coverage penalty (`training`)
//! - the batch step, epoch drivers, Adam optimizer and checkpoint persistence (`training`)
//! - ROUGE scoring of the decoded predictions (`metrics`)
//! - a configuration driven entry point (`pipelines::summarization_training`)
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! # use rust_pgn::pgn::PointerGeneratorModel;
//! # fn build_model(gru_units: i64, att_units: i64) -> Box<dyn PointerGeneratorModel> { unimplemented!() }
//! use rust_pgn::data::Vocab;
//! use rust_pgn::pipelines::summarization_training::{
//!     load_dataset, train_test_interface, RunSummary, TrainingConfig,
//! };
//! use rust_pgn::Config;
//! use tch::Device;
//!
//! let config = TrainingConfig::from_file("path/to/params.json")?;
//! let vocab = Vocab::from_file("path/to/vocab.txt")?;
//! let dataset = load_dataset(
//!     &config,
//!     &vocab,
//!     "path/to/train_X.txt",
//!     "path/to/train_y.txt",
//!     Device::cuda_if_available(),
//! )?;
//! let model = build_model(config.gru_units, config.att_units);
//! if let RunSummary::Test(evaluation) = train_test_interface(&config, model.as_ref(), &vocab, dataset)? {
//!     println!("{}", evaluation.scores);
//! }
//! # Ok(())
//! # }
//! ```

pub mod common;
pub mod data;
pub mod metrics;
pub mod pgn;
pub mod pipelines;
pub mod training;

pub use common::error::PgnError;
pub use common::Config;
