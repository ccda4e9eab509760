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
use crate::data::oov::OovDictionary;
use crate::data::vocab::{Vocab, PAD_TOKEN, START_TOKEN, STOP_TOKEN};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tch::{Device, Tensor};

/// # Sequence length caps for the encoder and decoder sides
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaxLengths {
    /// Maximum number of source tokens fed to the encoder
    pub encoder: usize,
    /// Maximum number of target tokens, including the `<START>` and `<STOP>` markers
    pub decoder: usize,
}

impl Default for MaxLengths {
    fn default() -> Self {
        MaxLengths {
            encoder: 100,
            decoder: 34,
        }
    }
}

/// # Padded batch of summarization examples
/// All sequences are padded to the cap of their side. Masks hold 1 for real tokens and 0 for padding.
#[derive(Debug)]
pub struct Batch {
    /// Source ids in the base vocabulary `[batch, source_len]`
    pub encoder_input_ids: Tensor,
    /// Source ids in the extended vocabulary `[batch, source_len]`
    pub encoder_extended_ids: Tensor,
    /// Source padding mask `[batch, source_len]`
    pub encoder_mask: Tensor,
    /// Number of OOV words per example `[batch]`
    pub oov_counts: Tensor,
    /// Target ids in the extended vocabulary, starting with `<START>` `[batch, target_len]`
    pub decoder_targets: Tensor,
    /// Target padding mask `[batch, target_len]`
    pub decoder_mask: Tensor,
}

impl Batch {
    pub fn batch_size(&self) -> i64 {
        self.decoder_targets.size()[0]
    }

    pub fn decoder_length(&self) -> i64 {
        self.decoder_targets.size()[1]
    }

    pub fn shallow_clone(&self) -> Batch {
        Batch {
            encoder_input_ids: self.encoder_input_ids.shallow_clone(),
            encoder_extended_ids: self.encoder_extended_ids.shallow_clone(),
            encoder_mask: self.encoder_mask.shallow_clone(),
            oov_counts: self.oov_counts.shallow_clone(),
            decoder_targets: self.decoder_targets.shallow_clone(),
            decoder_mask: self.decoder_mask.shallow_clone(),
        }
    }
}

/// Global index of the first example of a batch, used as the OOV dictionary key offset.
/// Batches are numbered from 0 and the offset is `(batch_index + 1) * batch_size`.
pub fn batch_start_index(batch_index: usize, batch_size: usize) -> usize {
    (batch_index + 1) * batch_size
}

/// # Restartable source of fixed-size batches
pub trait BatchSource {
    /// Number of examples in the split
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn batch_size(&self) -> usize;

    /// Returns the batch at `batch_index`. Only complete batches are available.
    fn get_batch(&self, batch_index: usize) -> Result<Batch, PgnError>;

    /// OOV words of the split, keyed by global example index
    fn oov_dictionary(&self) -> &OovDictionary;

    /// Number of complete batches; a trailing partial batch is dropped.
    fn steps_per_epoch(&self) -> usize {
        match self.batch_size() {
            0 => 0,
            batch_size => self.len() / batch_size,
        }
    }
}

/// # Summarization example mapped to (extended) vocabulary ids and padded
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedExample {
    pub input_ids: Vec<i64>,
    pub extended_ids: Vec<i64>,
    pub input_mask: Vec<i64>,
    pub target_ids: Vec<i64>,
    pub target_mask: Vec<i64>,
    pub oov_words: Vec<String>,
}

impl EncodedExample {
    /// Encodes a source/target pair of pre-tokenized words.
    /// The source is truncated to `max_lengths.encoder`, the target is wrapped with
    /// `<START>`/`<STOP>` and truncated to fit `max_lengths.decoder`.
    /// Lines may already be padded: `<PAD>` tokens are dropped from both sides and existing
    /// `<START>`/`<STOP>` markers are dropped from the target before it is wrapped.
    pub fn new<S: AsRef<str>>(
        vocab: &Vocab,
        source: &[S],
        target: &[S],
        max_lengths: MaxLengths,
    ) -> Result<EncodedExample, PgnError> {
        if max_lengths.encoder == 0 || max_lengths.decoder < 2 {
            return Err(PgnError::InvalidConfigurationError(format!(
                "Invalid sequence caps {:?}: encoder must be positive and decoder must fit <START> and <STOP>",
                max_lengths
            )));
        }
        let pad_id = vocab.required_id(PAD_TOKEN)?;
        let start_id = vocab.required_id(START_TOKEN)?;
        let stop_id = vocab.required_id(STOP_TOKEN)?;

        let source: Vec<&str> = source
            .iter()
            .map(AsRef::as_ref)
            .filter(|word| *word != PAD_TOKEN)
            .take(max_lengths.encoder)
            .collect();
        let (mut input_ids, mut extended_ids, oov_words) =
            vocab.source_to_extended_ids(source.as_slice())?;
        pad_to(&mut input_ids, max_lengths.encoder, pad_id);
        pad_to(&mut extended_ids, max_lengths.encoder, pad_id);
        let input_mask = padding_mask(&input_ids, pad_id);

        let target: Vec<&str> = target
            .iter()
            .map(AsRef::as_ref)
            .filter(|word| ![PAD_TOKEN, START_TOKEN, STOP_TOKEN].contains(word))
            .take(max_lengths.decoder - 2)
            .collect();
        let mut target_ids = Vec::with_capacity(max_lengths.decoder);
        target_ids.push(start_id);
        target_ids.extend(vocab.target_to_extended_ids(target.as_slice(), &oov_words)?);
        target_ids.push(stop_id);
        pad_to(&mut target_ids, max_lengths.decoder, pad_id);
        let target_mask = padding_mask(&target_ids, pad_id);

        Ok(EncodedExample {
            input_ids,
            extended_ids,
            input_mask,
            target_ids,
            target_mask,
            oov_words,
        })
    }
}

fn pad_to(values: &mut Vec<i64>, length: usize, pad_value: i64) {
    values.resize(length, pad_value);
}

fn padding_mask(ids: &[i64], pad_id: i64) -> Vec<i64> {
    ids.iter().map(|&id| (id != pad_id) as i64).collect()
}

/// # In-memory summarization dataset
/// Holds encoded examples and serves them as fixed-size padded batches on a target device.
#[derive(Debug)]
pub struct SummarizationDataset {
    examples: Vec<EncodedExample>,
    batch_size: usize,
    oov_dictionary: OovDictionary,
    device: Device,
}

impl SummarizationDataset {
    /// Builds a dataset from already encoded examples.
    pub fn new(
        examples: Vec<EncodedExample>,
        batch_size: usize,
        device: Device,
    ) -> Result<SummarizationDataset, PgnError> {
        if batch_size == 0 {
            return Err(PgnError::InvalidConfigurationError(
                "Batch size must be positive".into(),
            ));
        }
        let oov_dictionary = examples
            .iter()
            .enumerate()
            .map(|(position, example)| {
                let global_index =
                    batch_start_index(position / batch_size, batch_size) + position % batch_size;
                (global_index, example.oov_words.clone())
            })
            .collect();
        Ok(SummarizationDataset {
            examples,
            batch_size,
            oov_dictionary,
            device,
        })
    }

    /// Encodes pre-tokenized source and target sequences into a dataset.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_pgn::data::{read_tokenized_lines, MaxLengths, SummarizationDataset, Vocab};
    /// use tch::Device;
    ///
    /// let vocab = Vocab::from_file("path/to/vocab.txt")?;
    /// let sources = read_tokenized_lines("path/to/train_X.txt")?;
    /// let targets = read_tokenized_lines("path/to/train_y.txt")?;
    /// let dataset = SummarizationDataset::from_examples(
    ///     &vocab,
    ///     &sources,
    ///     &targets,
    ///     MaxLengths::default(),
    ///     64,
    ///     Device::cuda_if_available(),
    /// )?;
    /// # Ok::<(), rust_pgn::PgnError>(())
    /// ```
    pub fn from_examples<S: AsRef<str>>(
        vocab: &Vocab,
        sources: &[Vec<S>],
        targets: &[Vec<S>],
        max_lengths: MaxLengths,
        batch_size: usize,
        device: Device,
    ) -> Result<SummarizationDataset, PgnError> {
        if sources.len() != targets.len() {
            return Err(PgnError::ValueError(format!(
                "Got {} source sequences for {} target sequences",
                sources.len(),
                targets.len()
            )));
        }
        let examples = sources
            .iter()
            .zip(targets.iter())
            .map(|(source, target)| EncodedExample::new(vocab, source, target, max_lengths))
            .collect::<Result<Vec<_>, _>>()?;
        SummarizationDataset::new(examples, batch_size, device)
    }

    /// Splits the dataset into a training and a held-out part. The last
    /// `round(len * test_percent)` examples are held out, order is preserved.
    pub fn split(
        self,
        test_percent: f64,
    ) -> Result<(SummarizationDataset, SummarizationDataset), PgnError> {
        if !(0.0..1.0).contains(&test_percent) {
            return Err(PgnError::InvalidConfigurationError(format!(
                "Held-out fraction must be in [0, 1), got {}",
                test_percent
            )));
        }
        let test_length = (self.examples.len() as f64 * test_percent).round() as usize;
        let mut train_examples = self.examples;
        let test_examples = train_examples.split_off(train_examples.len() - test_length);
        Ok((
            SummarizationDataset::new(train_examples, self.batch_size, self.device)?,
            SummarizationDataset::new(test_examples, self.batch_size, self.device)?,
        ))
    }

    pub fn examples(&self) -> &[EncodedExample] {
        &self.examples
    }

    pub fn device(&self) -> Device {
        self.device
    }

    fn stack(&self, batch: &[EncodedExample], field: fn(&EncodedExample) -> &[i64]) -> Tensor {
        let length = batch.first().map(|example| field(example).len()).unwrap_or(0);
        let values: Vec<i64> = batch
            .iter()
            .flat_map(|example| field(example).iter().copied())
            .collect();
        Tensor::from_slice(&values)
            .view([batch.len() as i64, length as i64])
            .to_device(self.device)
    }
}

impl BatchSource for SummarizationDataset {
    fn len(&self) -> usize {
        self.examples.len()
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn get_batch(&self, batch_index: usize) -> Result<Batch, PgnError> {
        let start = batch_index * self.batch_size;
        let end = start + self.batch_size;
        if end > self.examples.len() {
            return Err(PgnError::ValueError(format!(
                "Batch {} is out of range for {} examples with batch size {}",
                batch_index,
                self.examples.len(),
                self.batch_size
            )));
        }
        let batch = &self.examples[start..end];
        let oov_counts: Vec<i64> = batch
            .iter()
            .map(|example| example.oov_words.len() as i64)
            .collect();

        Ok(Batch {
            encoder_input_ids: self.stack(batch, |example| example.input_ids.as_slice()),
            encoder_extended_ids: self.stack(batch, |example| example.extended_ids.as_slice()),
            encoder_mask: self.stack(batch, |example| example.input_mask.as_slice()),
            oov_counts: Tensor::from_slice(&oov_counts).to_device(self.device),
            decoder_targets: self.stack(batch, |example| example.target_ids.as_slice()),
            decoder_mask: self.stack(batch, |example| example.target_mask.as_slice()),
        })
    }

    fn oov_dictionary(&self) -> &OovDictionary {
        &self.oov_dictionary
    }
}

/// Reads a whitespace-tokenized text file, one sequence per line.
pub fn read_tokenized_lines<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<String>>, PgnError> {
    let reader = BufReader::new(File::open(path)?);
    reader
        .lines()
        .map(|line| {
            Ok(line?
                .split_whitespace()
                .map(ToString::to_string)
                .collect::<Vec<String>>())
        })
        .collect()
}
