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

use std::collections::BTreeMap;
use tch::{nn, Tensor};

/// # Trainable component of a pointer-generator model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterGroup {
    Encoder,
    Attention,
    Decoder,
    Pointer,
}

impl ParameterGroup {
    /// Groups in the order their gradients are computed and applied.
    pub const ORDER: [ParameterGroup; 4] = [
        ParameterGroup::Encoder,
        ParameterGroup::Attention,
        ParameterGroup::Decoder,
        ParameterGroup::Pointer,
    ];

    /// Top-level variable store path of the group
    pub fn name(&self) -> &'static str {
        match self {
            ParameterGroup::Encoder => "encoder",
            ParameterGroup::Attention => "attention",
            ParameterGroup::Decoder => "decoder",
            ParameterGroup::Pointer => "pointer",
        }
    }

    pub fn from_name(name: &str) -> Option<ParameterGroup> {
        ParameterGroup::ORDER
            .iter()
            .copied()
            .find(|group| group.name() == name)
    }
}

/// # Named trainable tensors of the four model components
/// Each group holds `(name, tensor)` pairs sorted by name. Tensors are shallow copies sharing
/// storage with the model, so in-place updates through this structure update the model.
#[derive(Debug, Default)]
pub struct ParameterGroups {
    pub encoder: Vec<(String, Tensor)>,
    pub attention: Vec<(String, Tensor)>,
    pub decoder: Vec<(String, Tensor)>,
    pub pointer: Vec<(String, Tensor)>,
}

impl ParameterGroups {
    /// Partitions the trainable variables of a variable store by their top-level path
    /// (`encoder`, `attention`, `decoder`, `pointer`). Variables outside these paths or not
    /// requiring gradients (e.g. frozen pretrained embeddings) are left out.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_pgn::pgn::ParameterGroups;
    /// use tch::{nn, Device};
    ///
    /// let vs = nn::VarStore::new(Device::Cpu);
    /// let _encoder = nn::linear(&vs.root() / "encoder" / "proj", 4, 4, Default::default());
    /// let groups = ParameterGroups::from_var_store(&vs);
    /// assert_eq!(groups.encoder.len(), 2);
    /// ```
    pub fn from_var_store(var_store: &nn::VarStore) -> ParameterGroups {
        let sorted: BTreeMap<String, Tensor> = var_store.variables().into_iter().collect();
        let mut groups = ParameterGroups::default();
        for (name, tensor) in sorted {
            if !tensor.requires_grad() {
                continue;
            }
            let prefix = name.split('.').next().unwrap_or_default();
            if let Some(group) = ParameterGroup::from_name(prefix) {
                groups.group_mut(group).push((name, tensor));
            }
        }
        groups
    }

    pub fn group(&self, group: ParameterGroup) -> &[(String, Tensor)] {
        match group {
            ParameterGroup::Encoder => &self.encoder,
            ParameterGroup::Attention => &self.attention,
            ParameterGroup::Decoder => &self.decoder,
            ParameterGroup::Pointer => &self.pointer,
        }
    }

    fn group_mut(&mut self, group: ParameterGroup) -> &mut Vec<(String, Tensor)> {
        match group {
            ParameterGroup::Encoder => &mut self.encoder,
            ParameterGroup::Attention => &mut self.attention,
            ParameterGroup::Decoder => &mut self.decoder,
            ParameterGroup::Pointer => &mut self.pointer,
        }
    }

    /// All named parameters: encoder, attention, decoder, then pointer.
    pub fn ordered(&self) -> impl Iterator<Item = &(String, Tensor)> + '_ {
        ParameterGroup::ORDER
            .iter()
            .flat_map(move |group| self.group(*group).iter())
    }

    /// Shallow copies of the parameter tensors, in `ordered()` order.
    pub fn tensors(&self) -> Vec<Tensor> {
        self.ordered()
            .map(|(_, tensor)| tensor.shallow_clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        ParameterGroup::ORDER
            .iter()
            .map(|group| self.group(*group).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
