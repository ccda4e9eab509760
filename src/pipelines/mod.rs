//! # Ready-to-use training pipelines
//!
//! #### Summarization training
//! Configuration driven training and evaluation of pointer-generator summarization models, see
//! `summarization_training::train_test_interface`.

pub mod summarization_training;
