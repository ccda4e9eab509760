//! # Summary evaluation metrics
//!
//! ROUGE (Lin, 2004) scores of generated summaries against references. Texts are compared on
//! whitespace-separated tokens, so predictions produced by the evaluation loop (which keep the
//! `<START>` marker) are scored exactly as emitted.

mod rouge;

pub use rouge::{Rouge, RougeScores, Score};
