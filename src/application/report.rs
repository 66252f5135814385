//! Per-iteration report of combined responses.
//!
//! Layout:
//! ```text
//! ---------------------------------
//! f0: <id0>
//! ---------------------------------
//!  itr,     f0_value, ||df0dx_st||
//!    1,  1.50000E+01,  4.00000E+00
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use csv::{Terminator, WriterBuilder};
use tracing::{debug, info};

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::{Communicator, DependencyGraph, DomainError, NormTracker};
use crate::infrastructure::traits::FileSystem;

const SEPARATOR: &str = "---------------------------------";

/// Append-only writer; the header is written once per run.
pub struct ReportWriter {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
    precision: usize,
    initialized: bool,
}

impl ReportWriter {
    pub fn new(fs: Arc<dyn FileSystem>, path: PathBuf, precision: usize) -> Self {
        Self {
            fs,
            path,
            precision,
            initialized: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete any previous report and write the header block.
    pub fn initialize(&mut self, graph: &DependencyGraph) -> ApplicationResult<()> {
        if self.fs.exists(&self.path) {
            debug!("removing previous report {}", self.path.display());
            self.fs
                .remove_file(&self.path)
                .with_path_context("remove report", &self.path)?;
        }
        self.fs
            .ensure_parent(&self.path)
            .with_path_context("create report directory", &self.path)?;

        let identifiers = graph.identifiers();
        let mut rows = vec![vec![SEPARATOR.to_string()]];
        for (itr, id) in identifiers.iter().enumerate() {
            rows.push(vec![format!("f{itr}: {id}")]);
        }
        rows.push(vec![SEPARATOR.to_string()]);

        let mut columns = vec![format!("{:>4}", "itr")];
        columns.extend((0..identifiers.len()).map(|itr| format!("{:>13}", format!("f{itr}_value"))));
        columns.extend((0..identifiers.len()).map(|itr| format!("{:>13}", format!("||df{itr}dx_st||"))));
        rows.push(columns);

        self.fs
            .write(&self.path, &encode_rows(&rows)?)
            .with_path_context("write report header", &self.path)?;
        self.initialized = true;
        Ok(())
    }

    /// Append one row: iteration, raw values, then max gradient norms, in label order.
    ///
    /// The row is assembled completely before the file is touched.
    pub fn write_row<C>(
        &mut self,
        iteration: usize,
        graph: &DependencyGraph,
        communicator: &C,
        norms: &NormTracker,
    ) -> ApplicationResult<()>
    where
        C: Communicator + ?Sized,
    {
        let identifiers = graph.identifiers();

        let mut row = vec![format!("{:>4}", iteration)];
        for id in &identifiers {
            let value = communicator.get_value(id)?;
            row.push(format!(" {}", format_scientific(value, self.precision)));
        }
        for id in &identifiers {
            let norm = norms
                .get(id)
                .ok_or_else(|| DomainError::MissingResponse(id.to_string()))?;
            row.push(format!(" {}", format_scientific(norm, self.precision)));
        }

        if !self.initialized {
            self.initialize(graph)?;
        }

        self.fs
            .append(&self.path, &encode_rows(&[row])?)
            .with_path_context("append report row", &self.path)?;
        info!("report: wrote iteration {} to {}", iteration, self.path.display());
        Ok(())
    }
}

/// Scientific notation with a sign column and a two-digit signed exponent,
/// e.g. ` 1.50000E+01`, `-2.00000E-03`.
pub fn format_scientific(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return " NAN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { " INF" } else { "-INF" }.to_string();
    }

    let sign = if value.is_sign_negative() { '-' } else { ' ' };
    let formatted = format!("{:.*E}", precision, value.abs());
    // Rust renders `1.5E1`; split off the exponent to pad it.
    let (mantissa, exponent) = formatted.split_once('E').unwrap_or((&formatted, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let exp_sign = if exponent < 0 { '-' } else { '+' };

    format!("{sign}{mantissa}E{exp_sign}{:02}", exponent.abs())
}

fn encode_rows(rows: &[Vec<String>]) -> ApplicationResult<String> {
    let mut writer = WriterBuilder::new()
        .flexible(true)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for row in rows {
        writer
            .write_record(row)
            .map_err(|e| ApplicationError::OperationFailed {
                context: "encode report row".to_string(),
                source: Box::new(e),
            })?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ApplicationError::OperationFailed {
            context: "flush report row".to_string(),
            source: Box::new(e.into_error()),
        })?;

    String::from_utf8(bytes).map_err(|e| ApplicationError::OperationFailed {
        context: "report row is not UTF-8".to_string(),
        source: Box::new(e),
    })
}
