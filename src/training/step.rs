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
use crate::data::{Batch, OovDictionary, Vocab, START_TOKEN};
use crate::pgn::{DecoderInput, DecoderOutput, PointerGeneratorModel};
use crate::training::loss::{coverage_loss, masked_sequence_loss};
use crate::training::optimizer::GradientOptimizer;
use std::convert::TryFrom;
use tch::{Device, Kind, Tensor};
use tracing::debug;

/// Sample texts are emitted for every example whose batch position is a multiple of this value.
const SAMPLE_EVERY: i64 = 8;

/// # Execution mode of a batch step
pub enum StepMode<'a> {
    /// Forward pass, loss and one optimizer update of the four parameter groups
    Train {
        optimizer: &'a mut dyn GradientOptimizer,
    },
    /// Forward pass, loss and greedy decoding of the predictions into text
    Test {
        vocab: &'a Vocab,
        oov_dictionary: &'a OovDictionary,
    },
}

/// # Result of a batch step
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutput {
    Train {
        /// Loss normalised by the decoder sequence length
        batch_loss: f64,
    },
    Test {
        /// Loss normalised by the decoder sequence length
        batch_loss: f64,
        /// Greedy predictions, prefixed with the `<START>` marker
        predictions: Vec<String>,
        /// Reference texts reconstructed from the targets
        references: Vec<String>,
    },
}

impl StepOutput {
    pub fn batch_loss(&self) -> f64 {
        match self {
            StepOutput::Train { batch_loss } => *batch_loss,
            StepOutput::Test { batch_loss, .. } => *batch_loss,
        }
    }
}

/// Processes one batch in training or evaluation mode.
///
/// The combined loss is `masked_sequence_loss + coverage_loss_weight * coverage_loss`. The reported
/// batch loss is the combined loss divided by the decoder sequence length, while gradients are taken
/// on the unnormalised loss with respect to the encoder, attention, decoder and pointer parameters,
/// in that order.
///
/// # Arguments
///
/// * `mode` - `StepMode::Train` with the optimizer or `StepMode::Test` with the vocabulary and OOV words of the split
/// * `model` - pointer-generator model
/// * `batch` - padded batch, left unchanged
/// * `batch_start` - global index of the first example of the batch in the OOV dictionary
/// * `coverage_loss_weight` - weight of the coverage penalty
pub fn train_one_batch<M>(
    mode: StepMode<'_>,
    model: &M,
    batch: &Batch,
    batch_start: usize,
    coverage_loss_weight: f64,
) -> Result<StepOutput, PgnError>
where
    M: PointerGeneratorModel + ?Sized,
{
    match mode {
        StepMode::Train { optimizer } => {
            let (loss, _) = forward_loss(model, batch, coverage_loss_weight, true)?;
            let batch_loss = normalized_loss(&loss, batch);

            let parameters = model.parameter_groups();
            let variables = parameters.tensors();
            let gradients = Tensor::f_run_backward(&[&loss], variables.as_slice(), false, false)?;
            optimizer.apply_gradients(&gradients, &parameters)?;
            Ok(StepOutput::Train { batch_loss })
        }
        StepMode::Test {
            vocab,
            oov_dictionary,
        } => {
            let (loss, decoder_output) =
                tch::no_grad(|| forward_loss(model, batch, coverage_loss_weight, false))?;
            let batch_loss = normalized_loss(&loss, batch);
            let (predictions, references) = decode_texts(
                &decoder_output,
                &batch.decoder_targets,
                vocab,
                oov_dictionary,
                batch_start,
            )?;
            Ok(StepOutput::Test {
                batch_loss,
                predictions,
                references,
            })
        }
    }
}

fn forward_loss<M>(
    model: &M,
    batch: &Batch,
    coverage_loss_weight: f64,
    train: bool,
) -> Result<(Tensor, DecoderOutput), PgnError>
where
    M: PointerGeneratorModel + ?Sized,
{
    let encoder_output = model.encode(&batch.encoder_input_ids, train)?;
    let decoder_output = model.decode(
        &DecoderInput::from(batch),
        &encoder_output,
        true,
        None,
        train,
    )?;
    let loss = masked_sequence_loss(
        &batch.decoder_targets,
        &decoder_output.final_distributions,
        &batch.decoder_mask,
    )? + coverage_loss(
        &decoder_output.attentions,
        &decoder_output.coverages,
        &batch.decoder_mask,
    )? * coverage_loss_weight;
    Ok((loss, decoder_output))
}

fn normalized_loss(loss: &Tensor, batch: &Batch) -> f64 {
    loss.double_value(&[]) / batch.decoder_length() as f64
}

fn decode_texts(
    decoder_output: &DecoderOutput,
    targets: &Tensor,
    vocab: &Vocab,
    oov_dictionary: &OovDictionary,
    batch_start: usize,
) -> Result<(Vec<String>, Vec<String>), PgnError> {
    let predicted_ids = Tensor::f_stack(decoder_output.final_distributions.as_slice(), 0)?
        .argmax(-1, false)
        .transpose(0, 1)
        .to_kind(Kind::Int64)
        .to_device(Device::Cpu);
    let targets = targets.to_kind(Kind::Int64).to_device(Device::Cpu);
    let batch_size = targets.size()[0];
    if predicted_ids.size()[0] != batch_size {
        return Err(PgnError::ShapeMismatch(format!(
            "Predictions for {} examples, targets for {} examples",
            predicted_ids.size()[0],
            batch_size
        )));
    }

    let mut predictions = Vec::with_capacity(batch_size as usize);
    let mut references = Vec::with_capacity(batch_size as usize);
    for i in 0..batch_size {
        let global_index = batch_start + i as usize;
        let oov_words = oov_dictionary.lookup(global_index).ok_or_else(|| {
            PgnError::ValueError(format!(
                "No OOV entry for example {} in the OOV dictionary",
                global_index
            ))
        })?;
        let reference = vocab.token_to_word(&Vec::<i64>::try_from(&targets.get(i))?, oov_words)?;
        let prediction = format!(
            "{}{}",
            START_TOKEN,
            vocab.token_to_word(&Vec::<i64>::try_from(&predicted_ids.get(i))?, oov_words)?
        );
        if i % SAMPLE_EVERY == 0 {
            debug!("reference: {}", reference);
            debug!("prediction: {}", prediction);
        }
        references.push(reference);
        predictions.push(prediction);
    }
    Ok((predictions, references))
}
