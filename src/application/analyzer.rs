//! Analyzer orchestration for one optimization iteration.
//!
//! The mode is fixed at construction: `Plain` only delegates to the response
//! analyzers, `DependencyAware` additionally propagates requests through the
//! dependency graph, combines composite responses, tracks gradient norms and
//! writes the report row.

use std::collections::BTreeMap;

use tracing::{debug, info, instrument};

use crate::application::report::ReportWriter;
use crate::application::ApplicationResult;
use crate::domain::{
    combine_responses_according_dependencies, request_responses_according_dependencies,
    Communicator, DependencyGraph, DesignSnapshot, DomainError, InternalResponse, NormTracker,
    OptimizationSettings, ResponseId,
};
use crate::infrastructure::traits::{EmptyAnalyzer, ModelPartController, ResponseAnalyzer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerMode {
    Plain,
    DependencyAware,
}

pub struct Analyzer {
    mode: AnalyzerMode,
    internal: Box<dyn ResponseAnalyzer>,
    external: Box<dyn ResponseAnalyzer>,
    controller: Box<dyn ModelPartController>,
    graph: DependencyGraph,
    norms: NormTracker,
    report: Option<ReportWriter>,
}

impl Analyzer {
    /// Analyzer without response combination.
    ///
    /// # Errors
    /// Configuration error if both analyzers are empty.
    pub fn new(
        internal: Box<dyn ResponseAnalyzer>,
        controller: Box<dyn ModelPartController>,
        external: Box<dyn ResponseAnalyzer>,
    ) -> ApplicationResult<Self> {
        if internal.is_empty() && external.is_empty() {
            return Err(DomainError::configuration(
                "neither an internal nor an external analyzer is defined",
            )
            .into());
        }

        Ok(Self {
            mode: AnalyzerMode::Plain,
            internal,
            external,
            controller,
            graph: DependencyGraph::default(),
            norms: NormTracker::new(),
            report: None,
        })
    }

    /// Analyzer that combines the responses of `graph` every iteration.
    pub fn with_dependencies(
        internal: Box<dyn ResponseAnalyzer>,
        controller: Box<dyn ModelPartController>,
        external: Box<dyn ResponseAnalyzer>,
        graph: DependencyGraph,
        report: ReportWriter,
    ) -> ApplicationResult<Self> {
        let mut analyzer = Self::new(internal, controller, external)?;
        analyzer.mode = AnalyzerMode::DependencyAware;
        analyzer.graph = graph;
        analyzer.report = Some(report);
        Ok(analyzer)
    }

    pub fn mode(&self) -> AnalyzerMode {
        self.mode
    }

    pub fn dependency_graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Max gradient norms recorded in the last completed iteration.
    pub fn gradient_max_norms(&self) -> &BTreeMap<ResponseId, f64> {
        self.norms.max_norms()
    }

    pub fn initialize_before_optimization_loop(&mut self) -> ApplicationResult<()> {
        self.internal.initialize_before_optimization_loop()?;
        self.external.initialize_before_optimization_loop()?;

        if let Some(report) = self.report.as_mut() {
            report.initialize(&self.graph)?;
        }
        Ok(())
    }

    /// Run one iteration: analyses, then (dependency-aware only) combination,
    /// norms and report.
    ///
    /// The mesh is reset after the analyses whether or not they succeeded.
    #[instrument(level = "debug", skip(self, design, communicator))]
    pub fn analyze_design_and_report_to_communicator(
        &mut self,
        design: &DesignSnapshot,
        iteration: usize,
        communicator: &mut dyn Communicator,
    ) -> ApplicationResult<()> {
        if self.mode == AnalyzerMode::DependencyAware {
            request_responses_according_dependencies(&self.graph, &mut *communicator);
        }

        let analyzed = self.delegate(design, iteration, &mut *communicator);
        self.reset_possible_shape_modifications_from_analysis();
        analyzed?;

        if self.mode == AnalyzerMode::DependencyAware {
            combine_responses_according_dependencies(&self.graph, &mut *communicator)?;
            self.norms.update(&self.graph, &*communicator)?;
            if let Some(report) = self.report.as_mut() {
                report.write_row(iteration, &self.graph, &*communicator, &self.norms)?;
            }
        }

        info!("iteration {} analyzed ({:?})", iteration, self.mode);
        Ok(())
    }

    pub fn finalize_after_optimization_loop(&mut self) -> ApplicationResult<()> {
        self.internal.finalize_after_optimization_loop()?;
        self.external.finalize_after_optimization_loop()
    }

    // Internal first: the external analyzer may consume internal results.
    fn delegate(
        &mut self,
        design: &DesignSnapshot,
        iteration: usize,
        communicator: &mut dyn Communicator,
    ) -> ApplicationResult<()> {
        self.internal
            .analyze_design_and_report_to_communicator(design, iteration, communicator)?;
        self.external
            .analyze_design_and_report_to_communicator(design, iteration, communicator)
    }

    fn reset_possible_shape_modifications_from_analysis(&mut self) {
        debug!("resetting mesh to reference configuration");
        self.controller.set_mesh_to_reference_mesh();
        self.controller.set_deformation_variables_to_zero();
    }
}

/// Build the analyzer for `settings`, choosing the mode from the presence of
/// combined objectives.
///
/// `internal_factory` is only called when internal responses are configured;
/// otherwise an [`EmptyAnalyzer`] stands in.
pub fn create_analyzer<F>(
    settings: &OptimizationSettings,
    controller: Box<dyn ModelPartController>,
    external: Box<dyn ResponseAnalyzer>,
    report: ReportWriter,
    internal_factory: F,
) -> ApplicationResult<Analyzer>
where
    F: FnOnce(Vec<InternalResponse>) -> Box<dyn ResponseAnalyzer>,
{
    let internal_responses = settings.internal_responses()?;
    let internal: Box<dyn ResponseAnalyzer> = if internal_responses.is_empty() {
        Box::new(EmptyAnalyzer)
    } else {
        debug!("{} internal responses", internal_responses.len());
        internal_factory(internal_responses)
    };

    let (graph, exist_dependencies) = settings.dependency_graph()?;

    if exist_dependencies {
        Analyzer::with_dependencies(internal, controller, external, graph, report)
    } else {
        Analyzer::new(internal, controller, external)
    }
}
