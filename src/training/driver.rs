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

use crate::common::error::PgnError;
use crate::data::{batch_start_index, BatchSource, Vocab};
use crate::metrics::{Rouge, RougeScores};
use crate::pgn::PointerGeneratorModel;
use crate::training::checkpoint::CheckpointSaver;
use crate::training::optimizer::GradientOptimizer;
use crate::training::step::{train_one_batch, StepMode, StepOutput};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Progress is reported for every batch index that is a multiple of this value.
const LOG_EVERY: usize = 10;

/// # Epoch driver settings for training
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainLoopConfig {
    /// Number of passes over the training split
    pub epochs: usize,
    /// A checkpoint is written after every epoch whose 1-based number is a multiple of this value
    pub save_every: usize,
    /// Weight of the coverage penalty in the combined loss
    pub coverage_loss_weight: f64,
}

impl Default for TrainLoopConfig {
    fn default() -> Self {
        TrainLoopConfig {
            epochs: 15,
            save_every: 5,
            coverage_loss_weight: 0.5,
        }
    }
}

/// # Outcome of a training run
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrainingSummary {
    /// Mean normalised batch loss of every epoch
    pub epoch_losses: Vec<f64>,
    /// Checkpoint files written, in order
    pub checkpoints: Vec<PathBuf>,
}

/// # Outcome of an evaluation pass
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationSummary {
    /// Mean normalised batch loss (coverage penalty excluded)
    pub mean_loss: f64,
    /// Corpus-averaged ROUGE scores of the predictions against the references
    pub scores: RougeScores,
    pub predictions: Vec<String>,
    pub references: Vec<String>,
}

fn checked_steps<D: BatchSource + ?Sized>(dataset: &D) -> Result<usize, PgnError> {
    match dataset.steps_per_epoch() {
        0 => Err(PgnError::ValueError(format!(
            "Dataset of {} examples does not fill a single batch of {}",
            dataset.len(),
            dataset.batch_size()
        ))),
        steps => Ok(steps),
    }
}

/// Trains a model for a number of epochs over complete batches of a dataset.
///
/// After each epoch `e` (0-based) with `(e + 1) % save_every == 0`, the parameter groups and the
/// optimizer state are saved. Epochs finishing after the last multiple of `save_every` are not
/// checkpointed.
///
/// # Arguments
///
/// * `model` - pointer-generator model to train
/// * `optimizer` - optimizer updating the model parameter groups
/// * `checkpoint` - checkpoint writer
/// * `dataset` - training split
/// * `config` - `TrainLoopConfig` with the number of epochs, checkpoint interval and coverage weight
///
/// # Returns
///
/// * `TrainingSummary` with the mean loss of every epoch and the written checkpoints
pub fn train<M, O, C, D>(
    model: &M,
    optimizer: &mut O,
    checkpoint: &mut C,
    dataset: &D,
    config: TrainLoopConfig,
) -> Result<TrainingSummary, PgnError>
where
    M: PointerGeneratorModel + ?Sized,
    O: GradientOptimizer,
    C: CheckpointSaver + ?Sized,
    D: BatchSource + ?Sized,
{
    if config.save_every == 0 {
        return Err(PgnError::InvalidConfigurationError(
            "Checkpoint interval must be positive".into(),
        ));
    }
    let steps_per_epoch = checked_steps(dataset)?;
    let batch_size = dataset.batch_size();
    let mut summary = TrainingSummary::default();

    for epoch in 0..config.epochs {
        let start = Instant::now();
        let mut total_loss = 0f64;
        for batch_index in 0..steps_per_epoch {
            let batch = dataset.get_batch(batch_index)?;
            let output = train_one_batch(
                StepMode::Train {
                    optimizer: &mut *optimizer,
                },
                model,
                &batch,
                batch_start_index(batch_index, batch_size),
                config.coverage_loss_weight,
            )?;
            let batch_loss = output.batch_loss();
            total_loss += batch_loss;
            if batch_index % LOG_EVERY == 0 {
                info!(
                    "Epoch {} Batch {} Loss {:.4}",
                    epoch + 1,
                    batch_index,
                    batch_loss
                );
            }
        }

        if (epoch + 1) % config.save_every == 0 {
            let path = checkpoint.save(&model.parameter_groups(), &*optimizer)?;
            info!(
                "Saving checkpoint for epoch {} at {}",
                epoch + 1,
                path.display()
            );
            summary.checkpoints.push(path);
        }

        let epoch_loss = total_loss / steps_per_epoch as f64;
        info!("Epoch {} Loss {:.4}", epoch + 1, epoch_loss);
        info!(
            "Time taken for 1 epoch {:.2} sec",
            start.elapsed().as_secs_f64()
        );
        summary.epoch_losses.push(epoch_loss);
    }
    Ok(summary)
}

/// Evaluates a model on a held-out split and scores its greedy predictions with ROUGE.
///
/// The coverage penalty is excluded from the reported loss. Predictions keep the `<START>` marker.
///
/// # Arguments
///
/// * `model` - pointer-generator model to evaluate
/// * `vocab` - base vocabulary used to turn ids back into words
/// * `dataset` - held-out split, providing the OOV words of its examples
/// * `scorer` - ROUGE scorer
///
/// # Returns
///
/// * `EvaluationSummary` with the mean loss, averaged scores and the decoded texts
pub fn test<M, D>(
    model: &M,
    vocab: &Vocab,
    dataset: &D,
    scorer: &Rouge,
) -> Result<EvaluationSummary, PgnError>
where
    M: PointerGeneratorModel + ?Sized,
    D: BatchSource + ?Sized,
{
    let steps = checked_steps(dataset)?;
    let batch_size = dataset.batch_size();
    let mut total_loss = 0f64;
    let mut predictions = Vec::with_capacity(steps * batch_size);
    let mut references = Vec::with_capacity(steps * batch_size);

    for batch_index in 0..steps {
        let batch = dataset.get_batch(batch_index)?;
        let output = train_one_batch(
            StepMode::Test {
                vocab,
                oov_dictionary: dataset.oov_dictionary(),
            },
            model,
            &batch,
            batch_start_index(batch_index, batch_size),
            0.0,
        )?;
        if let StepOutput::Test {
            batch_loss,
            predictions: batch_predictions,
            references: batch_references,
        } = output
        {
            total_loss += batch_loss;
            if batch_index % LOG_EVERY == 0 {
                info!("Batch {} Loss {:.4}", batch_index, batch_loss);
            }
            predictions.extend(batch_predictions);
            references.extend(batch_references);
        }
    }

    let mean_loss = total_loss / steps as f64;
    let scores = scorer.get_average_scores(&predictions, &references)?;
    info!("Test Loss {:.4}", mean_loss);
    info!("ROUGE scores: {}", scores);
    Ok(EvaluationSummary {
        mean_loss,
        scores,
        predictions,
        references,
    })
}
