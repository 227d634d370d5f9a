use crate::error::{Error, Result};
use crate::sample::CorrectedSample;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;

/// Fixed-capacity window of recent samples, oldest first.
/// Pushing into a full window evicts the oldest entry.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryWindow {
    capacity: usize,
    entries: VecDeque<CorrectedSample>,
}

/// On-disk form of the window.
#[derive(Debug, Serialize, Deserialize)]
struct HistoryFile {
    version: String,
    entries: Vec<CorrectedSample>,
}

impl HistoryWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, sample: CorrectedSample) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(sample);
    }

    /// Most recently pushed sample.
    pub fn last(&self) -> Option<&CorrectedSample> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &CorrectedSample> + ExactSizeIterator {
        self.entries.iter()
    }

    /// The newest `n` samples, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &CorrectedSample> {
        self.entries.iter().skip(self.entries.len().saturating_sub(n))
    }

    /// Load a persisted window. A missing file is an empty window; entries
    /// beyond `capacity` keep only the newest.
    pub fn load(path: &Path, capacity: usize) -> Result<Self> {
        let mut window = Self::new(capacity);
        if !path.exists() {
            return Ok(window);
        }
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::State(format!("failed to read {}: {}", path.display(), e)))?;
        let file: HistoryFile = serde_json::from_str(&data)
            .map_err(|e| Error::State(format!("failed to parse {}: {}", path.display(), e)))?;
        for entry in file.entries {
            window.push(entry);
        }
        Ok(window)
    }

    /// Write the window to `path`. The data goes to a sibling `.tmp` file
    /// first and is renamed over the target, so readers see either the old
    /// or the new window and never a partial one.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| Error::State(format!("failed to create {}: {}", dir.display(), e)))?;
        }
        let file = HistoryFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            entries: self.entries.iter().copied().collect(),
        };
        let data = serde_json::to_string(&file)
            .map_err(|e| Error::State(format!("failed to serialize history: {}", e)))?;

        let temp_path = path.with_extension("tmp");
        let written = std::fs::write(&temp_path, data)
            .and_then(|_| std::fs::rename(&temp_path, path));
        if let Err(e) = written {
            let _ = std::fs::remove_file(&temp_path);
            return Err(Error::State(format!(
                "failed to write {}: {}",
                path.display(),
                e
            )));
        }
        Ok(())
    }
}
