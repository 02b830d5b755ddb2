//! Common test utilities for integration tests
//!
//! Shared fixtures and helpers used across integration tests. These
//! utilities are not compiled into the library.

use anyhow::Result;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tmplfn::{assemble_string, FuncMap};

/// Install a test logger once; later calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Assemble `source` against `functions` and execute it against `data`.
pub fn render(functions: &FuncMap, source: &str, data: &Value) -> Result<String> {
    let template = assemble_string(functions, source)?;
    Ok(template.execute(data)?)
}

/// Temporary directory holding template and config files
///
/// Files are removed when the fixture is dropped.
pub struct FileFixture {
    dir: TempDir,
}

impl FileFixture {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: TempDir::new()?,
        })
    }

    /// Write `content` to `name` inside the fixture and return its path
    pub fn write(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        fs::write(&path, content)?;
        Ok(path)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
