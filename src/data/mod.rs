//! # Vocabulary, OOV bookkeeping and batching
//!
//! Source and target sequences are expected pre-tokenized (one whitespace separated sequence per line).
//! Words are mapped to the base vocabulary and, for source words missing from it, to per-example
//! out-of-vocabulary slots forming the extended vocabulary the pointer-generator copies from.
//! The `OovDictionary` of a split keeps these words so that predicted ids can be turned back into text.

mod dataset;
mod oov;
mod vocab;

pub use dataset::{
    batch_start_index, read_tokenized_lines, Batch, BatchSource, EncodedExample, MaxLengths,
    SummarizationDataset,
};
pub use oov::OovDictionary;
pub use vocab::{Vocab, PAD_TOKEN, START_TOKEN, STOP_TOKEN, UNKNOWN_TOKEN};
