//! Service container for dependency injection
//!
//! Wires up settings and I/O implementations for one run directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::application::ReportWriter;
use crate::config::Settings;
use crate::infrastructure::traits::{FileSystem, RealFileSystem};

/// Container holding the shared dependencies of a run.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Directory the report is written to
    pub run_dir: PathBuf,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings, run_dir: &Path) -> Self {
        Self::with_deps(settings, run_dir, Arc::new(RealFileSystem))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(settings: Settings, run_dir: &Path, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            settings: Arc::new(settings),
            fs,
            run_dir: run_dir.to_path_buf(),
        }
    }

    /// Report writer for this run, at `run_dir/report_filename`.
    pub fn report_writer(&self) -> ReportWriter {
        ReportWriter::new(
            Arc::clone(&self.fs),
            self.settings.report_path(&self.run_dir),
            self.settings.value_precision,
        )
    }
}
