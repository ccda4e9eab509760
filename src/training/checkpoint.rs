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
use crate::training::optimizer::GradientOptimizer;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tch::{Device, Tensor};
use tracing::{debug, info};

/// Name of the file holding the latest checkpoint file name.
const INDEX_FILE: &str = "checkpoint";
const OPTIMIZER_PREFIX: &str = "optimizer.";

/// # Checkpoint persistence capability used by the training driver
pub trait CheckpointSaver {
    /// Persists the parameter groups and the optimizer state, returning the written file.
    fn save(
        &mut self,
        parameters: &ParameterGroups,
        optimizer: &dyn GradientOptimizer,
    ) -> Result<PathBuf, PgnError>;
}

/// # Checkpoint manager writing numbered snapshots to a directory
/// Each snapshot `<prefix>-<n>.ot` stores the named tensors of the four parameter groups and the
/// optimizer state. Files are written to a temporary path and renamed into place, after which the
/// `checkpoint` index file is updated the same way, so readers never observe a partial snapshot.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    directory: PathBuf,
    prefix: String,
    save_counter: usize,
}

impl Checkpoint {
    /// Creates a checkpoint manager. Numbering continues after the latest existing snapshot.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_pgn::training::Checkpoint;
    ///
    /// let checkpoint = Checkpoint::new("./train_checkpoints", "ckpt");
    /// if let Some(path) = checkpoint.latest() {
    ///     println!("latest checkpoint: {}", path.display());
    /// }
    /// ```
    pub fn new<P: Into<PathBuf>>(directory: P, prefix: &str) -> Checkpoint {
        let mut checkpoint = Checkpoint {
            directory: directory.into(),
            prefix: prefix.to_string(),
            save_counter: 0,
        };
        checkpoint.save_counter = checkpoint
            .latest()
            .and_then(|path| checkpoint.counter_of(&path))
            .unwrap_or(0);
        checkpoint
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Number of the last snapshot written or found on disk
    pub fn save_counter(&self) -> usize {
        self.save_counter
    }

    /// Path of the latest snapshot, if the index file points to an existing file.
    pub fn latest(&self) -> Option<PathBuf> {
        let file_name = fs::read_to_string(self.directory.join(INDEX_FILE)).ok()?;
        let path = self.directory.join(file_name.trim());
        if path.is_file() {
            Some(path)
        } else {
            None
        }
    }

    fn counter_of(&self, path: &Path) -> Option<usize> {
        path.file_stem()?
            .to_str()?
            .strip_prefix(&self.prefix)?
            .strip_prefix('-')?
            .parse()
            .ok()
    }

    /// Restores the parameter groups and optimizer state from the latest snapshot.
    /// Fails with `CheckpointUnavailable` when the directory holds no snapshot.
    pub fn restore_latest(
        &self,
        parameters: &ParameterGroups,
        optimizer: &mut dyn GradientOptimizer,
    ) -> Result<PathBuf, PgnError> {
        let path = self.latest().ok_or_else(|| {
            PgnError::CheckpointUnavailable(format!(
                "no checkpoint found in {}",
                self.directory.display()
            ))
        })?;
        let device = parameters
            .ordered()
            .next()
            .map(|(_, tensor)| tensor.device())
            .unwrap_or(Device::Cpu);
        let mut saved: HashMap<String, Tensor> = Tensor::load_multi_with_device(&path, device)?
            .into_iter()
            .collect();

        tch::no_grad(|| -> Result<(), PgnError> {
            for (name, parameter) in parameters.ordered() {
                let value = saved.remove(name).ok_or_else(|| {
                    PgnError::ValueError(format!(
                        "Parameter {} missing from checkpoint {}",
                        name,
                        path.display()
                    ))
                })?;
                if value.size() != parameter.size() {
                    return Err(PgnError::ShapeMismatch(format!(
                        "Checkpoint value for {} has shape {:?}, parameter has shape {:?}",
                        name,
                        value.size(),
                        parameter.size()
                    )));
                }
                parameter.shallow_clone().f_copy_(&value)?;
            }
            Ok(())
        })?;

        let (optimizer_state, unused): (Vec<(String, Tensor)>, Vec<(String, Tensor)>) = saved
            .into_iter()
            .partition(|(name, _)| name.starts_with(OPTIMIZER_PREFIX));
        if !unused.is_empty() {
            debug!(
                "{} checkpoint entries do not match any parameter",
                unused.len()
            );
        }
        optimizer.load_state(optimizer_state)?;
        Ok(path)
    }
}

impl CheckpointSaver for Checkpoint {
    fn save(
        &mut self,
        parameters: &ParameterGroups,
        optimizer: &dyn GradientOptimizer,
    ) -> Result<PathBuf, PgnError> {
        fs::create_dir_all(&self.directory)?;
        let counter = self.save_counter + 1;
        let file_name = format!("{}-{}.ot", self.prefix, counter);
        let path = self.directory.join(&file_name);

        let mut named_tensors: Vec<(String, Tensor)> = parameters
            .ordered()
            .map(|(name, tensor)| (name.clone(), tensor.shallow_clone()))
            .collect();
        named_tensors.extend(optimizer.state());

        let temporary_file = temporary_path(&path);
        Tensor::save_multi(named_tensors.as_slice(), &temporary_file)?;
        fs::rename(&temporary_file, &path)?;

        let index_path = self.directory.join(INDEX_FILE);
        let temporary_index = temporary_path(&index_path);
        fs::write(&temporary_index, &file_name)?;
        fs::rename(&temporary_index, &index_path)?;

        self.save_counter = counter;
        info!("saved checkpoint {}", path.display());
        Ok(path)
    }
}

fn temporary_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(INDEX_FILE);
    path.with_file_name(format!("{}.tmp", file_name))
}
