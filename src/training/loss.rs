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
use tch::{Kind, Tensor};
use tracing::debug;

/// Probabilities are clipped to `[EPSILON, 1 - EPSILON]` before taking the log.
const EPSILON: f64 = 1e-7;

/// Masked cross-entropy of a teacher-forced decoding pass.
///
/// The prediction at step `t` is scored against the target at position `t + 1` (the leading
/// `<START>` token is consumed, not predicted). Each step is masked by the target padding mask,
/// averaged over the batch, and the step losses are summed over time. No normalisation by
/// sequence length is applied.
///
/// # Arguments
///
/// * `targets` - target ids `[batch, target_len]`
/// * `predictions` - per step probability distributions `[batch, extended_vocab]`, at least `target_len - 1` steps
/// * `padding_mask` - target padding mask `[batch, target_len]`
///
/// # Returns
///
/// * Scalar loss tensor
///
/// # Example
///
/// ```no_run
/// use rust_pgn::training::masked_sequence_loss;
/// use tch::{Device, Kind, Tensor};
///
/// let targets = Tensor::from_slice(&[1i64, 2, 3]).view([1, 3]);
/// let mask = Tensor::ones([1, 3], (Kind::Int64, Device::Cpu));
/// let predictions = vec![
///     Tensor::full([1, 4], 0.25, (Kind::Float, Device::Cpu)),
///     Tensor::full([1, 4], 0.25, (Kind::Float, Device::Cpu)),
/// ];
/// let loss = masked_sequence_loss(&targets, &predictions, &mask)?;
/// # Ok::<(), rust_pgn::PgnError>(())
/// ```
pub fn masked_sequence_loss(
    targets: &Tensor,
    predictions: &[Tensor],
    padding_mask: &Tensor,
) -> Result<Tensor, PgnError> {
    let (batch_size, target_length) = targets.size2()?;
    if padding_mask.size() != targets.size() {
        return Err(PgnError::ShapeMismatch(format!(
            "Padding mask shape {:?} does not match targets shape {:?}",
            padding_mask.size(),
            targets.size()
        )));
    }
    let time_steps = (target_length - 1).max(0);
    if (predictions.len() as i64) < time_steps {
        return Err(PgnError::ShapeMismatch(format!(
            "Got {} decoded distributions for {} scored target positions",
            predictions.len(),
            time_steps
        )));
    }
    let kind = predictions
        .first()
        .map(Tensor::kind)
        .unwrap_or(Kind::Float);
    let initial_loss = Tensor::scalar_tensor(0.0, (kind, targets.device()));

    let loss = predictions
        .iter()
        .take(time_steps as usize)
        .enumerate()
        .try_fold(initial_loss, |loss, (step, prediction)| {
            if prediction.dim() != 2 || prediction.size()[0] != batch_size {
                return Err(PgnError::ShapeMismatch(format!(
                    "Decoded distribution at step {} has shape {:?}, expected [{}, vocab]",
                    step,
                    prediction.size(),
                    batch_size
                )));
            }
            let position = step as i64 + 1;
            let target = targets.select(1, position).to_kind(Kind::Int64).unsqueeze(1);
            let step_loss = -prediction
                .clamp(EPSILON, 1.0 - EPSILON)
                .log()
                .f_gather(1, &target, false)?
                .squeeze_dim(1);
            let mask = padding_mask.select(1, position).to_kind(step_loss.kind());
            Ok(loss + (step_loss * mask).mean(kind))
        })?;

    debug!("loss: {:.6}", loss.double_value(&[]));
    Ok(loss)
}

/// Coverage penalty of a decoding pass.
///
/// A coverage accumulator starts at zero; for every decoding step in order, the overlap
/// `sum(min(attention, coverage))` over source positions is computed before the step attention is
/// added to the accumulator, so that a step never overlaps with itself. Overlaps are masked by the
/// target padding mask, averaged over the batch and summed over steps. The coverage vectors returned
/// by the model are only checked for consistency: the accumulator is recomputed here.
///
/// # Arguments
///
/// * `attentions` - per step attention distributions `[batch, source_len, 1]` or `[batch, source_len]`
/// * `coverages` - per step coverage vectors produced by the model
/// * `padding_mask` - target padding mask `[batch, target_len]`, step `t` is masked by column `t`.
///   A model may decode fewer steps than `target_len` (e.g. `target_len - 1` when the last target
///   token is never fed to the decoder); the trailing columns are then unused.
///
/// # Returns
///
/// * Scalar loss tensor
pub fn coverage_loss(
    attentions: &[Tensor],
    coverages: &[Tensor],
    padding_mask: &Tensor,
) -> Result<Tensor, PgnError> {
    if coverages.len() != attentions.len() {
        return Err(PgnError::ShapeMismatch(format!(
            "Got {} coverage vectors for {} attention distributions",
            coverages.len(),
            attentions.len()
        )));
    }
    let (batch_size, mask_steps) = padding_mask.size2()?;
    let steps = attentions.len() as i64;
    if steps > mask_steps {
        return Err(PgnError::ShapeMismatch(format!(
            "Padding mask covers {} steps, got {} attention distributions",
            mask_steps,
            attentions.len()
        )));
    }
    let attentions = attentions
        .iter()
        .map(squeeze_attention)
        .collect::<Result<Vec<Tensor>, PgnError>>()?;
    let first = match attentions.first() {
        Some(attention) => attention,
        None => return Ok(Tensor::scalar_tensor(0.0, (Kind::Float, padding_mask.device()))),
    };
    let attention_shape = first.size();
    if attention_shape[0] != batch_size {
        return Err(PgnError::ShapeMismatch(format!(
            "Attention batch size {} does not match padding mask batch size {}",
            attention_shape[0], batch_size
        )));
    }
    if let Some(attention) = attentions.iter().find(|a| a.size() != attention_shape) {
        return Err(PgnError::ShapeMismatch(format!(
            "Attention distributions have inconsistent shapes {:?} and {:?}",
            attention_shape,
            attention.size()
        )));
    }

    let kind = first.kind();
    let mask = padding_mask
        .narrow(1, 0, steps)
        .transpose(0, 1)
        .to_kind(kind);
    let (_, step_losses) = attentions.iter().enumerate().fold(
        (first.zeros_like(), Vec::with_capacity(attentions.len())),
        |(coverage, mut step_losses), (step, attention)| {
            let overlap = attention
                .minimum(&coverage)
                .sum_dim_intlist([1].as_slice(), false, kind);
            step_losses.push(overlap * mask.get(step as i64));
            (coverage + attention, step_losses)
        },
    );
    let loss = Tensor::stack(step_losses.as_slice(), 0)
        .mean_dim([1].as_slice(), false, kind)
        .sum(kind);

    debug!("coverage loss: {:.6}", loss.double_value(&[]));
    Ok(loss)
}

fn squeeze_attention(attention: &Tensor) -> Result<Tensor, PgnError> {
    let size = attention.size();
    match size.as_slice() {
        [_, _] => Ok(attention.shallow_clone()),
        [_, _, 1] => Ok(attention.squeeze_dim(-1)),
        _ => Err(PgnError::ShapeMismatch(format!(
            "Attention distribution of shape {:?}, expected [batch, source_len(, 1)]",
            size
        ))),
    }
}
