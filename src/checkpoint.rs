//! On-disk checkpoints of the network and optimizer state.
//!
//! A model directory holds one `model.ckpt-<step>.json` file per saved step and
//! a `checkpoint` index listing them, newest last. Only the `keep_max` most
//! recent files are kept.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::network::Dnn;
use crate::optimizers::OptimizerKind;

/// Name of the index file inside the model directory.
pub const INDEX_FILE: &str = "checkpoint";

/// Everything needed to resume training.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCheckpoint {
    pub global_step: u64,
    pub network: Dnn,
    pub optimizer: OptimizerKind,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointIndex {
    model_checkpoint_path: String,
    all_model_checkpoint_paths: Vec<String>,
}

pub fn checkpoint_file_name(global_step: u64) -> String {
    format!("model.ckpt-{}.json", global_step)
}

/// Reads and writes checkpoints in one model directory.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
    keep_max: usize,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>, keep_max: usize) -> Self {
        Self {
            dir: dir.into(),
            keep_max: keep_max.max(1),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_index(&self) -> Result<Option<CheckpointIndex>> {
        let path = self.dir.join(INDEX_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
        let index = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Checkpoint(format!("unreadable index {}: {}", path.display(), e)))?;
        Ok(Some(index))
    }

    fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
        let tmp = path.with_extension("tmp");
        let file = File::create(&tmp).map_err(|e| Error::io(&tmp, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, value)?;
        writer.flush().map_err(|e| Error::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| Error::io(path, e))
    }

    /// File names of the retained checkpoints, oldest first.
    pub fn checkpoints(&self) -> Result<Vec<String>> {
        Ok(self
            .read_index()?
            .map(|index| index.all_model_checkpoint_paths)
            .unwrap_or_default())
    }

    /// Write `checkpoint`, update the index and prune old files.
    pub fn save(&self, checkpoint: &ModelCheckpoint) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;

        let name = checkpoint_file_name(checkpoint.global_step);
        let path = self.dir.join(&name);
        Self::write_json(&path, checkpoint)?;

        let mut all = self.checkpoints()?;
        all.retain(|existing| existing != &name);
        all.push(name.clone());
        let excess = all.len().saturating_sub(self.keep_max);
        for stale in all.drain(..excess) {
            let stale_path = self.dir.join(&stale);
            if let Err(e) = fs::remove_file(&stale_path) {
                warn!("Could not remove old checkpoint {}: {}", stale_path.display(), e);
            }
        }

        let index = CheckpointIndex {
            model_checkpoint_path: name,
            all_model_checkpoint_paths: all,
        };
        Self::write_json(&self.dir.join(INDEX_FILE), &index)?;

        info!("Saving checkpoints for {} into {}.", checkpoint.global_step, path.display());
        Ok(path)
    }

    /// Load the newest checkpoint, or `None` if the directory has none.
    pub fn latest(&self) -> Result<Option<ModelCheckpoint>> {
        let Some(index) = self.read_index()? else {
            return Ok(None);
        };
        if index.model_checkpoint_path.is_empty() {
            return Ok(None);
        }

        let path = self.dir.join(&index.model_checkpoint_path);
        let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
        let checkpoint: ModelCheckpoint = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Checkpoint(format!("unreadable {}: {}", path.display(), e)))?;
        if !checkpoint.network.is_consistent() {
            return Err(Error::Checkpoint(format!(
                "{} holds an inconsistent layer chain",
                path.display()
            )));
        }
        debug!("Loaded checkpoint {}", path.display());
        Ok(Some(checkpoint))
    }
}

/// Decides when the training loop writes an intermediate checkpoint.
#[derive(Debug, Clone)]
pub enum SaveTrigger {
    EverySecs { interval: Duration, last: Instant },
    EverySteps { every: u64, last: u64 },
    Never,
}

impl SaveTrigger {
    pub fn from_run_config(run: &RunConfig, start_step: u64) -> Self {
        match (run.save_checkpoints_steps, run.save_checkpoints_secs) {
            (Some(every), _) => SaveTrigger::EverySteps {
                every: every.max(1),
                last: start_step,
            },
            (None, Some(secs)) => SaveTrigger::EverySecs {
                interval: Duration::from_secs(secs),
                last: Instant::now(),
            },
            (None, None) => SaveTrigger::Never,
        }
    }

    pub fn should_save(&self, step: u64) -> bool {
        match self {
            SaveTrigger::EverySecs { interval, last } => last.elapsed() >= *interval,
            SaveTrigger::EverySteps { every, last } => step >= last + every,
            SaveTrigger::Never => false,
        }
    }

    pub fn mark_saved(&mut self, step: u64) {
        match self {
            SaveTrigger::EverySecs { last, .. } => *last = Instant::now(),
            SaveTrigger::EverySteps { last, .. } => *last = step,
            SaveTrigger::Never => {}
        }
    }
}
