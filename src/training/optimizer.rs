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
use crate::pgn::ParameterGroups;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tch::{Kind, Tensor};

const STEP_KEY: &str = "optimizer.step";
const FIRST_MOMENT_PREFIX: &str = "optimizer.m.";
const SECOND_MOMENT_PREFIX: &str = "optimizer.v.";

/// # Optimizer capability used by the training step
pub trait GradientOptimizer {
    /// Applies one update. `gradients` are aligned with `parameters.ordered()`; undefined
    /// gradients (parameters not reached by the loss) are skipped.
    fn apply_gradients(
        &mut self,
        gradients: &[Tensor],
        parameters: &ParameterGroups,
    ) -> Result<(), PgnError>;

    /// Named state tensors, for checkpointing.
    fn state(&self) -> Vec<(String, Tensor)>;

    /// Restores state produced by `state`.
    fn load_state(&mut self, state: Vec<(String, Tensor)>) -> Result<(), PgnError>;
}

/// # Adam optimizer configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdamConfig {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    /// Element-wise gradient clipping to `[-clip_value, clip_value]`
    pub clip_value: Option<f64>,
}

impl Default for AdamConfig {
    fn default() -> Self {
        AdamConfig {
            learning_rate: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-7,
            clip_value: None,
        }
    }
}

/// # Adam optimizer with gradient value clipping
/// Moment estimates are keyed by parameter name so that they survive a checkpoint round trip.
#[derive(Debug)]
pub struct Adam {
    config: AdamConfig,
    step: i64,
    moments: HashMap<String, (Tensor, Tensor)>,
}

impl Adam {
    pub fn new(config: AdamConfig) -> Adam {
        Adam {
            config,
            step: 0,
            moments: HashMap::new(),
        }
    }

    pub fn config(&self) -> &AdamConfig {
        &self.config
    }

    /// Number of updates applied so far
    pub fn step(&self) -> i64 {
        self.step
    }
}

impl GradientOptimizer for Adam {
    fn apply_gradients(
        &mut self,
        gradients: &[Tensor],
        parameters: &ParameterGroups,
    ) -> Result<(), PgnError> {
        if gradients.len() != parameters.len() {
            return Err(PgnError::ShapeMismatch(format!(
                "Got {} gradients for {} parameters",
                gradients.len(),
                parameters.len()
            )));
        }
        self.step += 1;
        let config = self.config;
        let bias_correction1 = 1.0 - config.beta1.powi(self.step as i32);
        let bias_correction2 = 1.0 - config.beta2.powi(self.step as i32);
        let moments = &mut self.moments;

        tch::no_grad(|| -> Result<(), PgnError> {
            for ((name, parameter), gradient) in parameters.ordered().zip(gradients.iter()) {
                if !gradient.defined() {
                    continue;
                }
                if gradient.size() != parameter.size() {
                    return Err(PgnError::ShapeMismatch(format!(
                        "Gradient of shape {:?} for parameter {} of shape {:?}",
                        gradient.size(),
                        name,
                        parameter.size()
                    )));
                }
                let gradient = match config.clip_value {
                    Some(clip_value) => gradient.clamp(-clip_value, clip_value),
                    None => gradient.shallow_clone(),
                };
                let (first_moment, second_moment) = moments
                    .entry(name.clone())
                    .or_insert_with(|| (parameter.zeros_like(), parameter.zeros_like()));
                *first_moment = &*first_moment * config.beta1 + &gradient * (1.0 - config.beta1);
                *second_moment =
                    &*second_moment * config.beta2 + gradient.square() * (1.0 - config.beta2);

                let update = (&*first_moment / bias_correction1)
                    / ((&*second_moment / bias_correction2).sqrt() + config.eps);
                let mut parameter = parameter.shallow_clone();
                let _ = parameter.f_sub_(&(update * config.learning_rate))?;
            }
            Ok(())
        })
    }

    fn state(&self) -> Vec<(String, Tensor)> {
        let mut state = vec![(STEP_KEY.to_string(), Tensor::from_slice(&[self.step]))];
        let mut names: Vec<&String> = self.moments.keys().collect();
        names.sort();
        for name in names {
            let (first_moment, second_moment) = &self.moments[name];
            state.push((
                format!("{}{}", FIRST_MOMENT_PREFIX, name),
                first_moment.shallow_clone(),
            ));
            state.push((
                format!("{}{}", SECOND_MOMENT_PREFIX, name),
                second_moment.shallow_clone(),
            ));
        }
        state
    }

    fn load_state(&mut self, state: Vec<(String, Tensor)>) -> Result<(), PgnError> {
        let mut step = None;
        let mut first_moments = HashMap::new();
        let mut second_moments = HashMap::new();
        for (name, tensor) in state {
            if name == STEP_KEY {
                step = Some(tensor.to_kind(Kind::Int64).int64_value(&[0]));
            } else if let Some(parameter) = name.strip_prefix(FIRST_MOMENT_PREFIX) {
                first_moments.insert(parameter.to_string(), tensor);
            } else if let Some(parameter) = name.strip_prefix(SECOND_MOMENT_PREFIX) {
                second_moments.insert(parameter.to_string(), tensor);
            } else {
                return Err(PgnError::ValueError(format!(
                    "Unexpected optimizer state entry {}",
                    name
                )));
            }
        }
        let step = step.ok_or_else(|| {
            PgnError::ValueError(format!("Optimizer state is missing {}", STEP_KEY))
        })?;
        let mut moments = HashMap::with_capacity(first_moments.len());
        for (name, first_moment) in first_moments {
            let second_moment = second_moments.remove(&name).ok_or_else(|| {
                PgnError::ValueError(format!("Missing second moment estimate for {}", name))
            })?;
            moments.insert(name, (first_moment, second_moment));
        }
        if let Some(name) = second_moments.keys().next() {
            return Err(PgnError::ValueError(format!(
                "Missing first moment estimate for {}",
                name
            )));
        }
        self.step = step;
        self.moments = moments;
        Ok(())
    }
}
