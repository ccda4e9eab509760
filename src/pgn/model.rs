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
use crate::data::Batch;
use crate::pgn::parameters::ParameterGroups;
use tch::Tensor;

/// # Output of the encoder
pub struct EncoderOutput {
    /// Encoder states for every source position `[batch, source_len, hidden]`
    pub encoder_outputs: Tensor,
    /// Final encoder hidden state, used to initialise the decoder `[batch, hidden]`
    pub hidden_state: Tensor,
}

/// # Teacher-forced decoder inputs
pub struct DecoderInput<'a> {
    /// Target ids fed to the decoder, starting with `<START>` `[batch, target_len]`
    pub decoder_targets: &'a Tensor,
    /// Source ids in the extended vocabulary, used by the copy distribution `[batch, source_len]`
    pub encoder_extended_ids: &'a Tensor,
    /// Source padding mask `[batch, source_len]`
    pub encoder_mask: &'a Tensor,
    /// Number of OOV slots of each example `[batch]`
    pub oov_counts: &'a Tensor,
}

impl<'a> From<&'a Batch> for DecoderInput<'a> {
    fn from(batch: &'a Batch) -> Self {
        DecoderInput {
            decoder_targets: &batch.decoder_targets,
            encoder_extended_ids: &batch.encoder_extended_ids,
            encoder_mask: &batch.encoder_mask,
            oov_counts: &batch.oov_counts,
        }
    }
}

/// # Output of a full teacher-forced decoding pass
pub struct DecoderOutput {
    /// Per decoding step, the distribution over the extended vocabulary `[batch, vocab + max_oov]`
    pub final_distributions: Vec<Tensor>,
    /// Per decoding step, the attention over source positions `[batch, source_len, 1]` or `[batch, source_len]`
    pub attentions: Vec<Tensor>,
    /// Per decoding step, the coverage vector maintained by the model (same shape as the attention)
    pub coverages: Vec<Tensor>,
    /// Last decoder hidden state, for decoding continuation
    pub decoder_hidden: Option<Tensor>,
    /// Last context vector, for decoding continuation
    pub context_vector: Option<Tensor>,
    /// Last coverage vector, for decoding continuation
    pub last_coverage: Option<Tensor>,
}

/// # Pointer-generator model capabilities used by the training loop
/// Implementors own the encoder, attention, decoder and pointer components. The `train`
/// flag follows the `ModuleT` convention (dropout and other training-only behaviour).
pub trait PointerGeneratorModel {
    /// Encodes a batch of source ids `[batch, source_len]`.
    fn encode(&self, encoder_input_ids: &Tensor, train: bool) -> Result<EncoderOutput, PgnError>;

    /// Runs the decoder over all target positions with teacher forcing.
    ///
    /// # Arguments
    ///
    /// * `input` - decoder targets and extended source information
    /// * `encoder_output` - output of `encode` for the same batch
    /// * `use_coverage` - enables the coverage mechanism in the attention
    /// * `prev_coverage` - optional initial coverage vector `[batch, source_len]`
    /// * `train` - training mode flag
    fn decode(
        &self,
        input: &DecoderInput,
        encoder_output: &EncoderOutput,
        use_coverage: bool,
        prev_coverage: Option<&Tensor>,
        train: bool,
    ) -> Result<DecoderOutput, PgnError>;

    /// Trainable parameters, split into the encoder, attention, decoder and pointer groups.
    fn parameter_groups(&self) -> ParameterGroups;
}
