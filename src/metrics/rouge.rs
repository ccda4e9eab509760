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
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// # Precision, recall and F1 of one ROUGE variant
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Score {
    #[serde(rename = "p")]
    pub precision: f64,
    #[serde(rename = "r")]
    pub recall: f64,
    #[serde(rename = "f")]
    pub f_score: f64,
}

impl Score {
    fn from_counts(overlap: usize, hypothesis_total: usize, reference_total: usize) -> Score {
        let precision = if hypothesis_total > 0 {
            overlap as f64 / hypothesis_total as f64
        } else {
            0.0
        };
        let recall = if reference_total > 0 {
            overlap as f64 / reference_total as f64
        } else {
            0.0
        };
        let f_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Score {
            precision,
            recall,
            f_score,
        }
    }

    fn add(self, other: Score) -> Score {
        Score {
            precision: self.precision + other.precision,
            recall: self.recall + other.recall,
            f_score: self.f_score + other.f_score,
        }
    }

    fn scale(self, factor: f64) -> Score {
        Score {
            precision: self.precision * factor,
            recall: self.recall * factor,
            f_score: self.f_score * factor,
        }
    }
}

/// # ROUGE-1, ROUGE-2 and ROUGE-L scores of a hypothesis (or averaged over a corpus)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RougeScores {
    #[serde(rename = "rouge-1")]
    pub rouge_1: Score,
    #[serde(rename = "rouge-2")]
    pub rouge_2: Score,
    #[serde(rename = "rouge-l")]
    pub rouge_l: Score,
}

impl Display for RougeScores {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rouge-1 f={:.4} p={:.4} r={:.4}, rouge-2 f={:.4} p={:.4} r={:.4}, rouge-l f={:.4} p={:.4} r={:.4}",
            self.rouge_1.f_score,
            self.rouge_1.precision,
            self.rouge_1.recall,
            self.rouge_2.f_score,
            self.rouge_2.precision,
            self.rouge_2.recall,
            self.rouge_l.f_score,
            self.rouge_l.precision,
            self.rouge_l.recall,
        )
    }
}

/// # ROUGE scorer over whitespace-separated tokens
/// ROUGE-N counts clipped n-gram overlaps, ROUGE-L uses the longest common subsequence.
/// Tokens are compared as-is (no lowercasing or stemming).
#[derive(Debug, Clone, Copy, Default)]
pub struct Rouge;

impl Rouge {
    pub fn new() -> Rouge {
        Rouge
    }

    /// Scores every hypothesis against the reference at the same position.
    ///
    /// # Arguments
    ///
    /// * `hypotheses` - generated texts
    /// * `references` - reference texts, aligned with `hypotheses`
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_pgn::metrics::Rouge;
    ///
    /// let scores = Rouge::new().get_scores(&["the cat sat"], &["the cat sat down"])?;
    /// assert_eq!(scores[0].rouge_1.precision, 1.0);
    /// # Ok::<(), rust_pgn::PgnError>(())
    /// ```
    pub fn get_scores<S, T>(
        &self,
        hypotheses: &[S],
        references: &[T],
    ) -> Result<Vec<RougeScores>, PgnError>
    where
        S: AsRef<str>,
        T: AsRef<str>,
    {
        if hypotheses.len() != references.len() {
            return Err(PgnError::ValueError(format!(
                "Got {} hypotheses for {} references",
                hypotheses.len(),
                references.len()
            )));
        }
        if hypotheses.is_empty() {
            return Err(PgnError::ValueError(
                "Cannot score an empty set of hypotheses".into(),
            ));
        }
        Ok(hypotheses
            .iter()
            .zip(references.iter())
            .map(|(hypothesis, reference)| score_pair(hypothesis.as_ref(), reference.as_ref()))
            .collect())
    }

    /// Scores hypotheses against references and averages every metric over the pairs.
    pub fn get_average_scores<S, T>(
        &self,
        hypotheses: &[S],
        references: &[T],
    ) -> Result<RougeScores, PgnError>
    where
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let scores = self.get_scores(hypotheses, references)?;
        let factor = 1.0 / scores.len() as f64;
        let total = scores
            .iter()
            .fold(RougeScores::default(), |total, score| RougeScores {
                rouge_1: total.rouge_1.add(score.rouge_1),
                rouge_2: total.rouge_2.add(score.rouge_2),
                rouge_l: total.rouge_l.add(score.rouge_l),
            });
        Ok(RougeScores {
            rouge_1: total.rouge_1.scale(factor),
            rouge_2: total.rouge_2.scale(factor),
            rouge_l: total.rouge_l.scale(factor),
        })
    }
}

fn score_pair(hypothesis: &str, reference: &str) -> RougeScores {
    let hypothesis: Vec<&str> = hypothesis.split_whitespace().collect();
    let reference: Vec<&str> = reference.split_whitespace().collect();
    RougeScores {
        rouge_1: rouge_n(&hypothesis, &reference, 1),
        rouge_2: rouge_n(&hypothesis, &reference, 2),
        rouge_l: Score::from_counts(
            lcs_length(&hypothesis, &reference),
            hypothesis.len(),
            reference.len(),
        ),
    }
}

fn ngram_counts<'a>(tokens: &'a [&'a str], n: usize) -> HashMap<&'a [&'a str], usize> {
    let mut counts = HashMap::new();
    if tokens.len() >= n {
        for window in tokens.windows(n) {
            *counts.entry(window).or_insert(0) += 1;
        }
    }
    counts
}

fn rouge_n(hypothesis: &[&str], reference: &[&str], n: usize) -> Score {
    let hypothesis_ngrams = ngram_counts(hypothesis, n);
    let reference_ngrams = ngram_counts(reference, n);
    let overlap = hypothesis_ngrams
        .iter()
        .map(|(ngram, count)| (*count).min(reference_ngrams.get(ngram).copied().unwrap_or(0)))
        .sum();
    Score::from_counts(
        overlap,
        hypothesis_ngrams.values().sum(),
        reference_ngrams.values().sum(),
    )
}

fn lcs_length(a: &[&str], b: &[&str]) -> usize {
    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];
    for token_a in a {
        for (j, token_b) in b.iter().enumerate() {
            current[j + 1] = if token_a == token_b {
                previous[j] + 1
            } else {
                previous[j + 1].max(current[j])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}
