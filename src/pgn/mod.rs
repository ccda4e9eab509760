//! # Pointer-generator model interface
//!
//! Pointer-generator networks (See, Liu, Manning, 2017) mix a generation distribution over a fixed
//! vocabulary with a copy distribution over the source tokens. The training loop of this crate is
//! agnostic of the architecture: any model exposing the `PointerGeneratorModel` capabilities
//! (encoding, teacher-forced decoding with coverage, and its four trainable parameter groups) can be
//! trained and evaluated.
//!
//! Models are expected to register their variables under the `encoder`, `attention`, `decoder` and
//! `pointer` paths of a `tch::nn::VarStore`, so that `ParameterGroups::from_var_store` can collect them.

mod model;
mod parameters;

pub use model::{DecoderInput, DecoderOutput, EncoderOutput, PointerGeneratorModel};
pub use parameters::{ParameterGroup, ParameterGroups};
