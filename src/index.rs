use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Point-in-time snapshot of every file basename under the output root,
/// gathered once before dispatch. Files written by workers during the run are
/// not added; asset names are unique per item within a run, so no two tasks
/// ever contend for the same destination name.
#[derive(Debug, Default)]
pub struct ExistingFileIndex {
    names: HashSet<String>,
}

impl ExistingFileIndex {
    /// Recursively collects basenames under `root`, ignoring directory
    /// structure. A previous run may have placed an asset under a different
    /// date folder than this run would pick, so only the name matters.
    pub fn build(root: &Path) -> Result<Self> {
        let mut names = HashSet::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let entries = fs::read_dir(&dir)
                .with_context(|| format!("failed to read directory {:?}", dir))?;
            for entry in entries {
                let entry = entry.with_context(|| format!("failed to read entry in {:?}", dir))?;
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.insert(name.to_string());
                }
            }
        }
        Ok(Self { names })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}
