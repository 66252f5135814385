//! Analyzer that replays recorded responses instead of running a solver.
//!
//! Record format (JSON), keyed by iteration then response id:
//! ```json
//! { "1": { "mass": { "value": 2.5, "gradient": { "7": [0.1, 0.0, -0.2] } } } }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{Communicator, DesignSnapshot, GradientField, ResponseId};
use crate::infrastructure::traits::{FileSystem, ResponseAnalyzer};
use crate::infrastructure::{InfraError, InfraResult};

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RecordedResponse {
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub gradient: Option<GradientField>,
}

type Recording = BTreeMap<usize, BTreeMap<ResponseId, RecordedResponse>>;

/// Which recorded responses an analyzer is responsible for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ResponseFilter {
    #[default]
    All,
    Only(BTreeSet<ResponseId>),
    Except(BTreeSet<ResponseId>),
}

impl ResponseFilter {
    pub fn accepts(&self, id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(ids) => ids.contains(id),
            Self::Except(ids) => !ids.contains(id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplayAnalyzer {
    recording: Recording,
    filter: ResponseFilter,
}

impl ReplayAnalyzer {
    pub fn from_json_str(content: &str, filter: ResponseFilter) -> InfraResult<Self> {
        let recording: Recording = serde_json::from_str(content).map_err(|e| InfraError::Replay {
            message: e.to_string(),
        })?;
        Ok(Self { recording, filter })
    }

    pub fn load(fs: &dyn FileSystem, path: &Path, filter: ResponseFilter) -> InfraResult<Self> {
        let content = fs
            .read_to_string(path)
            .map_err(|e| InfraError::io(format!("read replay data {}", path.display()), e))?;
        Self::from_json_str(&content, filter)
    }

    /// Recorded iteration indices, ascending.
    pub fn iterations(&self) -> Vec<usize> {
        self.recording.keys().copied().collect()
    }

    /// Ids this analyzer will report, over all iterations.
    pub fn response_ids(&self) -> BTreeSet<&str> {
        self.recording
            .values()
            .flat_map(|responses| responses.keys())
            .map(String::as_str)
            .filter(|id| self.filter.accepts(id))
            .collect()
    }
}

impl ResponseAnalyzer for ReplayAnalyzer {
    fn initialize_before_optimization_loop(&mut self) -> ApplicationResult<()> {
        debug!("replay: {} iterations recorded", self.recording.len());
        Ok(())
    }

    fn analyze_design_and_report_to_communicator(
        &mut self,
        _design: &DesignSnapshot,
        iteration: usize,
        communicator: &mut dyn Communicator,
    ) -> ApplicationResult<()> {
        let responses = self
            .recording
            .get(&iteration)
            .ok_or_else(|| ApplicationError::Analysis {
                iteration,
                message: "no recorded responses".to_string(),
            })?;

        for (id, recorded) in responses {
            if !self.filter.accepts(id) {
                continue;
            }
            if communicator.is_value_requested(id) {
                if let Some(value) = recorded.value {
                    debug!("replay: report value {} = {}", id, value);
                    communicator.report_value(id, value);
                }
            }
            if communicator.is_gradient_requested(id) {
                if let Some(gradient) = &recorded.gradient {
                    debug!("replay: report gradient {} ({} points)", id, gradient.len());
                    communicator.report_gradient(id, gradient.clone());
                }
            }
        }
        Ok(())
    }

    fn finalize_after_optimization_loop(&mut self) -> ApplicationResult<()> {
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.response_ids().is_empty()
    }
}
