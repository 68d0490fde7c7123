use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum LabelError {
    #[error("Label file error: {0}")]
    Io(#[from] io::Error),
    #[error("Label file {0} contains no labels")]
    Empty(PathBuf),
}

/// Class names in model output order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet {
    names: Vec<String>,
}

impl LabelSet {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn parse(contents: &str) -> Self {
        let names = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect();
        Self { names }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LabelError> {
        let path = path.as_ref();
        let labels = Self::parse(&fs::read_to_string(path)?);
        if labels.is_empty() {
            return Err(LabelError::Empty(path.to_path_buf()));
        }
        Ok(labels)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> io::Result<()> {
        fs::write(path, self.names.join("\n"))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Name for `index`, or the index itself when the set does not cover
    /// exactly `output_width` classes.
    pub fn resolve(&self, index: usize, output_width: usize) -> String {
        match self.names.get(index) {
            Some(name) if self.names.len() == output_width => name.clone(),
            _ => index.to_string(),
        }
    }
}
