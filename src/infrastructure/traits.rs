//! I/O boundary traits for testability
//!
//! These traits abstract the collaborators around the combiner (analyzers,
//! mesh state, filesystem), allowing the orchestration to be tested with mock
//! implementations.

use std::io;
use std::io::Write;
use std::path::Path;

use crate::application::ApplicationResult;
use crate::domain::{Communicator, DesignSnapshot};

/// Filesystem abstraction for testability.
pub trait FileSystem: Send + Sync {
    /// Read file contents to string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Write string content to file, replacing it.
    fn write(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Append string content to file, creating it if missing.
    /// The file is opened and closed within the call.
    fn append(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Remove a file.
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Create directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Create parent directories if needed.
    fn ensure_parent(&self, path: &Path) -> io::Result<()>;
}

/// Producer of response values and gradients for one design.
///
/// Internal analyzers evaluate responses natively, external ones wrap
/// whatever solver the driver is coupled to.
pub trait ResponseAnalyzer {
    fn initialize_before_optimization_loop(&mut self) -> ApplicationResult<()>;

    /// Evaluate every response the communicator requests and report results.
    fn analyze_design_and_report_to_communicator(
        &mut self,
        design: &DesignSnapshot,
        iteration: usize,
        communicator: &mut dyn Communicator,
    ) -> ApplicationResult<()>;

    fn finalize_after_optimization_loop(&mut self) -> ApplicationResult<()>;

    /// True if this analyzer provides no responses at all.
    fn is_empty(&self) -> bool;
}

/// Mesh state owner. Analyses may deform the mesh, which is reverted after
/// every iteration.
pub trait ModelPartController {
    fn set_mesh_to_reference_mesh(&mut self);

    fn set_deformation_variables_to_zero(&mut self);
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Real filesystem implementation.
#[derive(Debug, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        std::fs::write(path, content)
    }

    fn append(&self, path: &Path, content: &str) -> io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        file.write_all(content.as_bytes())?;
        file.flush()
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                self.create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

/// Analyzer that provides nothing.
#[derive(Debug, Default)]
pub struct EmptyAnalyzer;

impl ResponseAnalyzer for EmptyAnalyzer {
    fn initialize_before_optimization_loop(&mut self) -> ApplicationResult<()> {
        Ok(())
    }

    fn analyze_design_and_report_to_communicator(
        &mut self,
        _design: &DesignSnapshot,
        _iteration: usize,
        _communicator: &mut dyn Communicator,
    ) -> ApplicationResult<()> {
        Ok(())
    }

    fn finalize_after_optimization_loop(&mut self) -> ApplicationResult<()> {
        Ok(())
    }

    fn is_empty(&self) -> bool {
        true
    }
}

/// Controller for runs without a mesh to restore.
#[derive(Debug, Default)]
pub struct NoopModelPartController;

impl ModelPartController for NoopModelPartController {
    fn set_mesh_to_reference_mesh(&mut self) {}

    fn set_deformation_variables_to_zero(&mut self) {}
}
