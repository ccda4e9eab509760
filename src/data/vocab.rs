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
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub const PAD_TOKEN: &str = "<PAD>";
pub const START_TOKEN: &str = "<START>";
pub const STOP_TOKEN: &str = "<STOP>";
pub const UNKNOWN_TOKEN: &str = "<UNK>";

/// # Base vocabulary of the summarization model
/// Maps words to ids and back. Ids at or beyond the vocabulary size refer to the
/// out-of-vocabulary slots of a given example (extended vocabulary).
#[derive(Debug, Clone)]
pub struct Vocab {
    index_to_word: Vec<String>,
    word_to_index: HashMap<String, i64>,
}

impl Vocab {
    /// Builds a vocabulary from an ordered list of tokens. The position of a token is its id.
    ///
    /// # Example
    ///
    /// ```
    /// use rust_pgn::data::Vocab;
    ///
    /// let vocab = Vocab::from_tokens(vec!["<PAD>", "<START>", "cat", "sat"])?;
    /// assert_eq!(vocab.token_to_id("cat"), Some(2));
    /// # Ok::<(), rust_pgn::PgnError>(())
    /// ```
    pub fn from_tokens<I, S>(tokens: I) -> Result<Vocab, PgnError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut index_to_word = Vec::new();
        let mut word_to_index = HashMap::new();
        for token in tokens {
            let token = token.into();
            let id = index_to_word.len() as i64;
            if word_to_index.insert(token.clone(), id).is_some() {
                return Err(PgnError::ValueError(format!(
                    "Duplicate token {} in vocabulary",
                    token
                )));
            }
            index_to_word.push(token);
        }
        Ok(Vocab {
            index_to_word,
            word_to_index,
        })
    }

    /// Reads a vocabulary file with one token per line, the line number being the token id.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Vocab, PgnError> {
        let reader = BufReader::new(File::open(path)?);
        let mut tokens = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let token = line.trim();
            if !token.is_empty() {
                tokens.push(token.to_string());
            }
        }
        Vocab::from_tokens(tokens)
    }

    /// Number of entries in the base vocabulary.
    pub fn size(&self) -> i64 {
        self.index_to_word.len() as i64
    }

    pub fn token_to_id(&self, word: &str) -> Option<i64> {
        self.word_to_index.get(word).copied()
    }

    pub fn id_to_token(&self, id: i64) -> Option<&str> {
        if id < 0 {
            return None;
        }
        self.index_to_word.get(id as usize).map(String::as_str)
    }

    /// Id of a token that must be present in the vocabulary (e.g. special tokens).
    pub fn required_id(&self, word: &str) -> Result<i64, PgnError> {
        self.token_to_id(word).ok_or_else(|| {
            PgnError::ValueError(format!("Token {} is missing from the vocabulary", word))
        })
    }

    /// Maps a word into the extended vocabulary of an example: base id if known,
    /// otherwise `size + position` in the example OOV list.
    pub fn word_to_extended_id(&self, word: &str, oov_words: &[String]) -> Option<i64> {
        self.token_to_id(word).or_else(|| {
            oov_words
                .iter()
                .position(|oov| oov == word)
                .map(|position| self.size() + position as i64)
        })
    }

    /// Converts a source word sequence into base ids (OOV words replaced by `<UNK>`),
    /// extended ids (OOV words mapped to per-example slots) and the ordered list of OOV words.
    pub fn source_to_extended_ids<S: AsRef<str>>(
        &self,
        words: &[S],
    ) -> Result<(Vec<i64>, Vec<i64>, Vec<String>), PgnError> {
        let unknown_id = self.required_id(UNKNOWN_TOKEN)?;
        let mut ids = Vec::with_capacity(words.len());
        let mut extended_ids = Vec::with_capacity(words.len());
        let mut oov_words: Vec<String> = Vec::new();
        for word in words {
            let word = word.as_ref();
            match self.token_to_id(word) {
                Some(id) => {
                    ids.push(id);
                    extended_ids.push(id);
                }
                None => {
                    let position = match oov_words.iter().position(|oov| oov == word) {
                        Some(position) => position,
                        None => {
                            oov_words.push(word.to_string());
                            oov_words.len() - 1
                        }
                    };
                    ids.push(unknown_id);
                    extended_ids.push(self.size() + position as i64);
                }
            }
        }
        Ok((ids, extended_ids, oov_words))
    }

    /// Converts a target word sequence into the extended vocabulary of its source example.
    /// Words neither in the vocabulary nor in the source OOV list become `<UNK>`.
    pub fn target_to_extended_ids<S: AsRef<str>>(
        &self,
        words: &[S],
        oov_words: &[String],
    ) -> Result<Vec<i64>, PgnError> {
        let unknown_id = self.required_id(UNKNOWN_TOKEN)?;
        Ok(words
            .iter()
            .map(|word| {
                self.word_to_extended_id(word.as_ref(), oov_words)
                    .unwrap_or(unknown_id)
            })
            .collect())
    }

    /// Reconstructs a whitespace-joined text from extended vocabulary ids.
    /// Padding tokens are skipped. Ids beyond the base vocabulary are resolved through
    /// the example OOV list and fail with `OovIndexOutOfRange` when the slot does not exist.
    ///
    /// # Example
    ///
    /// ```
    /// use rust_pgn::data::Vocab;
    ///
    /// let vocab = Vocab::from_tokens(vec!["<PAD>", "<START>", "cat", "sat"])?;
    /// let text = vocab.token_to_word(&[2, 3, 4, 0], &["mat".to_string()])?;
    /// assert_eq!(text, "cat sat mat");
    /// # Ok::<(), rust_pgn::PgnError>(())
    /// ```
    pub fn token_to_word(&self, token_ids: &[i64], oov_words: &[String]) -> Result<String, PgnError> {
        let pad_id = self.token_to_id(PAD_TOKEN);
        let mut words: Vec<&str> = Vec::with_capacity(token_ids.len());
        for &token_id in token_ids {
            if Some(token_id) == pad_id {
                continue;
            }
            let word = match self.id_to_token(token_id) {
                Some(word) => word,
                None => {
                    let oov_index = token_id - self.size();
                    if token_id < 0 || oov_index >= oov_words.len() as i64 {
                        return Err(PgnError::OovIndexOutOfRange {
                            token_id,
                            vocab_size: self.size(),
                            oov_count: oov_words.len(),
                        });
                    }
                    oov_words[oov_index as usize].as_str()
                }
            };
            words.push(word);
        }
        Ok(words.join(" "))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn test_vocab() -> Vocab {
        Vocab::from_tokens(vec!["<PAD>", "<START>", "<STOP>", "<UNK>", "cat", "sat"]).unwrap()
    }

    #[test]
    fn duplicate_tokens_are_rejected() {
        assert!(Vocab::from_tokens(vec!["cat", "cat"]).is_err());
    }

    #[test]
    fn source_oov_words_get_extended_slots() {
        let vocab = test_vocab();
        let (ids, extended_ids, oovs) = vocab
            .source_to_extended_ids(&["cat", "mat", "sat", "mat", "rug"])
            .unwrap();
        assert_eq!(ids, vec![4, 3, 5, 3, 3]);
        assert_eq!(extended_ids, vec![4, 6, 5, 6, 7]);
        assert_eq!(oovs, vec!["mat".to_string(), "rug".to_string()]);
    }

    #[test]
    fn extended_ids_round_trip() {
        let vocab = test_vocab();
        let words = ["cat", "sat", "on", "the", "mat"];
        let (_, extended_ids, oovs) = vocab.source_to_extended_ids(&words).unwrap();
        let text = vocab.token_to_word(&extended_ids, &oovs).unwrap();
        assert_eq!(text, words.join(" "));
        for word in words.iter() {
            let id = vocab.word_to_extended_id(word, &oovs).unwrap();
            assert_eq!(vocab.token_to_word(&[id], &oovs).unwrap(), *word);
        }
    }

    #[test]
    fn target_words_outside_source_map_to_unknown() {
        let vocab = test_vocab();
        let oovs = vec!["mat".to_string()];
        let ids = vocab
            .target_to_extended_ids(&["cat", "mat", "dog"], &oovs)
            .unwrap();
        assert_eq!(ids, vec![4, 6, 3]);
    }

    #[test]
    fn oov_slot_overflow_is_an_error() {
        let vocab = test_vocab();
        let error = vocab.token_to_word(&[4, 7], &["mat".to_string()]).unwrap_err();
        match error {
            PgnError::OovIndexOutOfRange {
                token_id,
                vocab_size,
                oov_count,
            } => {
                assert_eq!(token_id, 7);
                assert_eq!(vocab_size, 6);
                assert_eq!(oov_count, 1);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(vocab.token_to_word(&[-1], &[]).is_err());
    }

    #[test]
    fn padding_is_skipped() {
        let vocab = test_vocab();
        assert_eq!(vocab.token_to_word(&[1, 4, 5, 2, 0, 0], &[]).unwrap(), "<START> cat sat <STOP>");
    }
}
