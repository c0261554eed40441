//! Persistence of episode rows, agent metadata and sensor frames.
use crate::sensor::SensorFrame;
use anyhow::{Context, Result};
use log::trace;
use std::{
    collections::BTreeMap,
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

/// Name of the CSV file holding the rows of an episode.
pub const EPISODE_FILE: &str = "episode_info.csv";

/// Name of the JSON file describing the agent.
pub const METADATA_FILE: &str = "agent_info.json";

/// Directory of the sensor frames, relative to the save path of the agent.
pub const SENSOR_DIR: &str = "sensors";

/// Destination of the data collected by agents.
///
/// `dir` is the save path of an agent. Implementations are shared between
/// agents, hence the `&self` receivers.
pub trait Storage: Send + Sync {
    /// Creates the episode file in `dir` and writes its header.
    ///
    /// An existing episode file is truncated.
    fn create_episode(&self, dir: &Path, header: &[String]) -> Result<()>;

    /// Appends a row to the episode file in `dir`.
    ///
    /// The episode must have been created with [`Storage::create_episode`].
    fn append_row(&self, dir: &Path, fields: &[String]) -> Result<()>;

    /// Writes the metadata of the agent saving in `dir`.
    fn write_metadata(&self, dir: &Path, metadata: &serde_json::Value) -> Result<()>;

    /// Saves a sensor frame at `path`.
    fn save_frame(&self, path: &Path, frame: &SensorFrame) -> Result<()>;
}

/// Writes CSV, JSON and PNG files.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStorage;

impl Storage for FsStorage {
    fn create_episode(&self, dir: &Path, header: &[String]) -> Result<()> {
        fs::create_dir_all(dir.join(SENSOR_DIR))
            .with_context(|| format!("Failed to create {:?}", dir))?;
        let path = dir.join(EPISODE_FILE);
        let file = File::create(&path).with_context(|| format!("Failed to create {:?}", path))?;
        let mut wtr = csv::Writer::from_writer(file);
        wtr.write_record(header)?;
        wtr.flush()?;
        Ok(())
    }

    fn append_row(&self, dir: &Path, fields: &[String]) -> Result<()> {
        let path = dir.join(EPISODE_FILE);
        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open {:?}", path))?;
        let mut wtr = csv::Writer::from_writer(file);
        wtr.write_record(fields)?;
        wtr.flush()?;
        Ok(())
    }

    fn write_metadata(&self, dir: &Path, metadata: &serde_json::Value) -> Result<()> {
        fs::create_dir_all(dir)?;
        let path = dir.join(METADATA_FILE);
        let file = File::create(&path).with_context(|| format!("Failed to create {:?}", path))?;
        serde_json::to_writer_pretty(file, metadata)?;
        Ok(())
    }

    fn save_frame(&self, path: &Path, frame: &SensorFrame) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        trace!("Save frame {} to {:?}", frame.frame, path);
        frame
            .image
            .save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("Failed to save {:?}", path))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Memory {
    episodes: BTreeMap<PathBuf, Vec<Vec<String>>>,
    metadata: BTreeMap<PathBuf, serde_json::Value>,
    frames: BTreeMap<PathBuf, u64>,
}

/// Keeps everything in memory.
///
/// Frames are recorded by path with their simulation frame number; the image
/// data is not kept.
#[derive(Debug, Default)]
pub struct MemoryStorage(Mutex<Memory>);

impl MemoryStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Memory> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rows of the episode in `dir`, header first.
    pub fn rows(&self, dir: &Path) -> Option<Vec<Vec<String>>> {
        self.lock().episodes.get(dir).cloned()
    }

    /// Directories holding an episode.
    pub fn episode_dirs(&self) -> Vec<PathBuf> {
        self.lock().episodes.keys().cloned().collect()
    }

    /// Metadata written for `dir`.
    pub fn metadata(&self, dir: &Path) -> Option<serde_json::Value> {
        self.lock().metadata.get(dir).cloned()
    }

    /// Paths of the saved frames, sorted.
    pub fn frame_paths(&self) -> Vec<PathBuf> {
        self.lock().frames.keys().cloned().collect()
    }

    /// Simulation frame number of the frame saved at `path`.
    pub fn frame_at(&self, path: &Path) -> Option<u64> {
        self.lock().frames.get(path).copied()
    }
}

impl Storage for MemoryStorage {
    fn create_episode(&self, dir: &Path, header: &[String]) -> Result<()> {
        self.lock()
            .episodes
            .insert(dir.to_path_buf(), vec![header.to_vec()]);
        Ok(())
    }

    fn append_row(&self, dir: &Path, fields: &[String]) -> Result<()> {
        match self.lock().episodes.get_mut(dir) {
            Some(rows) => {
                rows.push(fields.to_vec());
                Ok(())
            }
            None => anyhow::bail!("No episode created in {:?}", dir),
        }
    }

    fn write_metadata(&self, dir: &Path, metadata: &serde_json::Value) -> Result<()> {
        self.lock()
            .metadata
            .insert(dir.to_path_buf(), metadata.clone());
        Ok(())
    }

    fn save_frame(&self, path: &Path, frame: &SensorFrame) -> Result<()> {
        self.lock().frames.insert(path.to_path_buf(), frame.frame);
        Ok(())
    }
}
