//! Integration tests for the analyzer: mode selection, delegation order,
//! mesh reset and the dependency-aware combination step.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use rstest::rstest;
use serde_json::json;
use tempfile::TempDir;

use response_combiner::application::{
    create_analyzer, Analyzer, AnalyzerMode, ApplicationError, ApplicationResult, ReportWriter,
};
use response_combiner::domain::{
    Communicator, DesignSnapshot, DomainError, DomainResult, GradientField, OptimizationSettings,
};
use response_combiner::infrastructure::traits::{
    EmptyAnalyzer, ModelPartController, RealFileSystem, ResponseAnalyzer,
};
use response_combiner::infrastructure::{ReplayAnalyzer, ResponseFilter, ResponseStore};
use response_combiner::util::testing;

type Log = Rc<RefCell<Vec<String>>>;

// ============================================================
// Test doubles
// ============================================================

struct ScriptedAnalyzer {
    name: &'static str,
    values: BTreeMap<String, f64>,
    gradients: BTreeMap<String, GradientField>,
    fail: bool,
    log: Log,
}

impl ScriptedAnalyzer {
    fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            values: BTreeMap::new(),
            gradients: BTreeMap::new(),
            fail: false,
            log: Rc::clone(log),
        }
    }

    fn value(mut self, id: &str, value: f64) -> Self {
        self.values.insert(id.to_string(), value);
        self
    }

    fn gradient(mut self, id: &str, entries: &[(u64, [f64; 3])]) -> Self {
        self.gradients
            .insert(id.to_string(), entries.iter().copied().collect());
        self
    }

    fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl ResponseAnalyzer for ScriptedAnalyzer {
    fn initialize_before_optimization_loop(&mut self) -> ApplicationResult<()> {
        self.log.borrow_mut().push(format!("{}:initialize", self.name));
        Ok(())
    }

    fn analyze_design_and_report_to_communicator(
        &mut self,
        _design: &DesignSnapshot,
        iteration: usize,
        communicator: &mut dyn Communicator,
    ) -> ApplicationResult<()> {
        self.log
            .borrow_mut()
            .push(format!("{}:analyze:{}", self.name, iteration));
        if self.fail {
            return Err(ApplicationError::Analysis {
                iteration,
                message: "solver diverged".to_string(),
            });
        }
        for (id, value) in &self.values {
            if communicator.is_value_requested(id) {
                communicator.report_value(id, *value);
            }
        }
        for (id, gradient) in &self.gradients {
            if communicator.is_gradient_requested(id) {
                communicator.report_gradient(id, gradient.clone());
            }
        }
        Ok(())
    }

    fn finalize_after_optimization_loop(&mut self) -> ApplicationResult<()> {
        self.log.borrow_mut().push(format!("{}:finalize", self.name));
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.values.is_empty() && self.gradients.is_empty()
    }
}

struct RecordingController {
    log: Log,
}

impl ModelPartController for RecordingController {
    fn set_mesh_to_reference_mesh(&mut self) {
        self.log.borrow_mut().push("reset_mesh".to_string());
    }

    fn set_deformation_variables_to_zero(&mut self) {
        self.log.borrow_mut().push("zero_deformation".to_string());
    }
}

/// Counts reads of standardized data, which only the combiner performs.
struct CountingCommunicator {
    inner: ResponseStore,
    standardized_reads: RefCell<usize>,
}

impl Communicator for CountingCommunicator {
    fn is_value_requested(&self, id: &str) -> bool {
        self.inner.is_value_requested(id)
    }

    fn is_gradient_requested(&self, id: &str) -> bool {
        self.inner.is_gradient_requested(id)
    }

    fn request_value(&mut self, id: &str) {
        self.inner.request_value(id)
    }

    fn request_gradient(&mut self, id: &str) {
        self.inner.request_gradient(id)
    }

    fn report_value(&mut self, id: &str, value: f64) {
        self.inner.report_value(id, value)
    }

    fn report_gradient(&mut self, id: &str, gradient: GradientField) {
        self.inner.report_gradient(id, gradient)
    }

    fn get_value(&self, id: &str) -> DomainResult<f64> {
        self.inner.get_value(id)
    }

    fn get_standardized_value(&self, id: &str) -> DomainResult<f64> {
        *self.standardized_reads.borrow_mut() += 1;
        self.inner.get_standardized_value(id)
    }

    fn get_standardized_gradient(&self, id: &str) -> DomainResult<GradientField> {
        *self.standardized_reads.borrow_mut() += 1;
        self.inner.get_standardized_gradient(id)
    }
}

// ============================================================
// Helpers
// ============================================================

fn combined_settings() -> OptimizationSettings {
    OptimizationSettings::from_value(&json!({
        "objectives": [{
            "identifier": "F",
            "weight": 1.0,
            "type": "minimization",
            "is_combined": true,
            "combined_responses": [
                { "identifier": "A", "weight": 0.5 },
                { "identifier": "B", "weight": 0.5 }
            ]
        }]
    }))
    .unwrap()
}

fn plain_settings() -> OptimizationSettings {
    OptimizationSettings::from_value(&json!({
        "objectives": [{ "identifier": "A", "type": "minimization" }]
    }))
    .unwrap()
}

fn report_in(dir: &TempDir) -> (ReportWriter, PathBuf) {
    let path = dir.path().join("response_combination.csv");
    (ReportWriter::new(Arc::new(RealFileSystem), path.clone(), 5), path)
}

fn full_external(log: &Log) -> ScriptedAnalyzer {
    ScriptedAnalyzer::new("external", log)
        .value("A", 10.0)
        .value("B", 20.0)
        .gradient("A", &[(1, [3.0, 0.0, 0.0]), (2, [0.0, 4.0, 0.0])])
        .gradient("B", &[(1, [1.0, 0.0, 0.0]), (2, [0.0, 2.0, 0.0])])
}

fn request_objective(store: &mut ResponseStore, id: &str) {
    store.request_value(id);
    store.request_gradient(id);
}

// ============================================================
// Construction
// ============================================================

#[rstest]
fn given_both_analyzers_empty_when_constructing_then_configuration_error() {
    let log: Log = Rc::default();

    let result = Analyzer::new(
        Box::new(EmptyAnalyzer),
        Box::new(RecordingController { log }),
        Box::new(EmptyAnalyzer),
    );

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::Configuration { .. }))
    ));
}

#[rstest]
fn given_no_combined_objectives_when_creating_then_plain_mode() {
    let log: Log = Rc::default();
    let dir = TempDir::new().unwrap();
    let (report, _) = report_in(&dir);

    let analyzer = create_analyzer(
        &plain_settings(),
        Box::new(RecordingController { log: Rc::clone(&log) }),
        Box::new(ScriptedAnalyzer::new("external", &log).value("A", 1.0)),
        report,
        |_| -> Box<dyn ResponseAnalyzer> { unreachable!("no internal responses configured") },
    )
    .unwrap();

    assert_eq!(analyzer.mode(), AnalyzerMode::Plain);
    assert!(analyzer.dependency_graph().is_empty());
}

#[rstest]
fn given_combined_objective_when_creating_then_dependency_aware_mode() {
    let log: Log = Rc::default();
    let dir = TempDir::new().unwrap();
    let (report, _) = report_in(&dir);

    let analyzer = create_analyzer(
        &combined_settings(),
        Box::new(RecordingController { log: Rc::clone(&log) }),
        Box::new(full_external(&log)),
        report,
        |_| -> Box<dyn ResponseAnalyzer> { Box::new(EmptyAnalyzer) },
    )
    .unwrap();

    assert_eq!(analyzer.mode(), AnalyzerMode::DependencyAware);
    assert_eq!(analyzer.dependency_graph().identifiers(), vec!["F", "A", "B"]);
}

#[rstest]
fn given_internal_responses_when_creating_then_factory_receives_them() {
    let log: Log = Rc::default();
    let dir = TempDir::new().unwrap();
    let (report, _) = report_in(&dir);
    let settings = OptimizationSettings::from_value(&json!({
        "objectives": [{ "identifier": "mass", "use_kratos": true,
                         "kratos_response_settings": { "response_type": "mass" } }]
    }))
    .unwrap();
    let received: Rc<RefCell<Vec<String>>> = Rc::default();
    let seen = Rc::clone(&received);

    create_analyzer(
        &settings,
        Box::new(RecordingController { log: Rc::clone(&log) }),
        Box::new(EmptyAnalyzer),
        report,
        move |internal| -> Box<dyn ResponseAnalyzer> {
            seen.borrow_mut()
                .extend(internal.into_iter().map(|r| r.id));
            Box::new(ScriptedAnalyzer::new("internal", &log).value("mass", 2.0))
        },
    )
    .unwrap();

    assert_eq!(*received.borrow(), vec!["mass".to_string()]);
}

// ============================================================
// Iteration
// ============================================================

#[rstest]
fn given_two_analyzers_when_analyzing_then_internal_runs_first_and_mesh_reset_after() {
    testing::init_test_setup();
    let log: Log = Rc::default();
    let mut analyzer = Analyzer::new(
        Box::new(ScriptedAnalyzer::new("internal", &log).value("A", 1.0)),
        Box::new(RecordingController { log: Rc::clone(&log) }),
        Box::new(ScriptedAnalyzer::new("external", &log).value("B", 2.0)),
    )
    .unwrap();
    let mut store = ResponseStore::new();

    analyzer
        .analyze_design_and_report_to_communicator(&DesignSnapshot::new(), 3, &mut store)
        .unwrap();

    assert_eq!(
        *log.borrow(),
        vec![
            "internal:analyze:3",
            "external:analyze:3",
            "reset_mesh",
            "zero_deformation"
        ]
    );
}

#[rstest]
fn given_failing_internal_analysis_when_analyzing_then_mesh_reset_and_error_returned() {
    let log: Log = Rc::default();
    let mut analyzer = Analyzer::new(
        Box::new(ScriptedAnalyzer::new("internal", &log).value("A", 1.0).failing()),
        Box::new(RecordingController { log: Rc::clone(&log) }),
        Box::new(ScriptedAnalyzer::new("external", &log).value("B", 2.0)),
    )
    .unwrap();
    let mut store = ResponseStore::new();

    let err = analyzer
        .analyze_design_and_report_to_communicator(&DesignSnapshot::new(), 1, &mut store)
        .unwrap_err();

    assert!(matches!(err, ApplicationError::Analysis { iteration: 1, .. }));
    assert_eq!(
        *log.borrow(),
        vec!["internal:analyze:1", "reset_mesh", "zero_deformation"]
    );
}

#[rstest]
fn given_plain_mode_when_analyzing_then_combiner_never_reads_and_no_report() {
    let log: Log = Rc::default();
    let dir = TempDir::new().unwrap();
    let (report, report_path) = report_in(&dir);
    let mut analyzer = create_analyzer(
        &plain_settings(),
        Box::new(RecordingController { log: Rc::clone(&log) }),
        Box::new(ScriptedAnalyzer::new("external", &log).value("A", 4.0)),
        report,
        |_| -> Box<dyn ResponseAnalyzer> { Box::new(EmptyAnalyzer) },
    )
    .unwrap();
    let mut communicator = CountingCommunicator {
        inner: ResponseStore::new(),
        standardized_reads: RefCell::new(0),
    };
    communicator.request_value("A");

    analyzer.initialize_before_optimization_loop().unwrap();
    analyzer
        .analyze_design_and_report_to_communicator(&DesignSnapshot::new(), 1, &mut communicator)
        .unwrap();

    assert_eq!(communicator.get_value("A").unwrap(), 4.0);
    assert_eq!(*communicator.standardized_reads.borrow(), 0);
    assert!(!report_path.exists());
    assert!(analyzer.gradient_max_norms().is_empty());
}

#[rstest]
fn given_combined_objective_when_analyzing_then_value_gradient_norms_and_report() {
    testing::init_test_setup();
    let log: Log = Rc::default();
    let dir = TempDir::new().unwrap();
    let (report, report_path) = report_in(&dir);
    let mut analyzer = create_analyzer(
        &combined_settings(),
        Box::new(RecordingController { log: Rc::clone(&log) }),
        Box::new(full_external(&log)),
        report,
        |_| -> Box<dyn ResponseAnalyzer> { Box::new(EmptyAnalyzer) },
    )
    .unwrap();
    let mut store = ResponseStore::new();
    request_objective(&mut store, "F");

    // Act
    analyzer.initialize_before_optimization_loop().unwrap();
    analyzer
        .analyze_design_and_report_to_communicator(&DesignSnapshot::new(), 1, &mut store)
        .unwrap();

    // Assert: requests reached the leaves
    assert!(store.is_value_requested("A"));
    assert!(store.is_gradient_requested("B"));

    // Assert: F = 0.5*A + 0.5*B
    assert_eq!(store.get_value("F").unwrap(), 15.0);
    let gradient = store.get_gradient("F").unwrap();
    assert_eq!(gradient[&1], [2.0, 0.0, 0.0]);
    assert_eq!(gradient[&2], [0.0, 3.0, 0.0]);

    // Assert: norms for every node
    let norms = analyzer.gradient_max_norms();
    assert_eq!(norms["F"], 3.0);
    assert_eq!(norms["A"], 4.0);
    assert_eq!(norms["B"], 2.0);

    // Assert: header block plus one data row
    let content = fs::read_to_string(&report_path).unwrap();
    let last = content.lines().last().unwrap();
    assert_eq!(
        last,
        "   1,  1.50000E+01,  1.00000E+01,  2.00000E+01,  3.00000E+00,  4.00000E+00,  2.00000E+00"
    );
    assert_eq!(content.lines().count(), 7);
}

#[rstest]
fn given_unreported_leaf_when_analyzing_then_missing_response_and_no_row() {
    let log: Log = Rc::default();
    let dir = TempDir::new().unwrap();
    let (report, report_path) = report_in(&dir);
    let external = ScriptedAnalyzer::new("external", &log)
        .value("A", 10.0)
        .gradient("A", &[(1, [1.0, 0.0, 0.0])]);
    let mut analyzer = create_analyzer(
        &combined_settings(),
        Box::new(RecordingController { log: Rc::clone(&log) }),
        Box::new(external),
        report,
        |_| -> Box<dyn ResponseAnalyzer> { Box::new(EmptyAnalyzer) },
    )
    .unwrap();
    let mut store = ResponseStore::new();
    request_objective(&mut store, "F");

    analyzer.initialize_before_optimization_loop().unwrap();
    let err = analyzer
        .analyze_design_and_report_to_communicator(&DesignSnapshot::new(), 1, &mut store)
        .unwrap_err();

    assert_eq!(err.as_domain(), Some(&DomainError::MissingResponse("B".to_string())));
    // Header only: separator, f0..f2, separator, column names
    assert_eq!(fs::read_to_string(&report_path).unwrap().lines().count(), 6);
}

#[rstest]
fn given_empty_gradients_when_analyzing_then_empty_gradient_error() {
    let log: Log = Rc::default();
    let dir = TempDir::new().unwrap();
    let (report, _) = report_in(&dir);
    let external = ScriptedAnalyzer::new("external", &log)
        .value("A", 1.0)
        .value("B", 1.0)
        .gradient("A", &[])
        .gradient("B", &[]);
    let mut analyzer = create_analyzer(
        &combined_settings(),
        Box::new(RecordingController { log: Rc::clone(&log) }),
        Box::new(external),
        report,
        |_| -> Box<dyn ResponseAnalyzer> { Box::new(EmptyAnalyzer) },
    )
    .unwrap();
    let mut store = ResponseStore::new();
    request_objective(&mut store, "F");

    let err = analyzer
        .analyze_design_and_report_to_communicator(&DesignSnapshot::new(), 1, &mut store)
        .unwrap_err();

    assert_eq!(err.as_domain(), Some(&DomainError::EmptyGradient("F".to_string())));
}

#[rstest]
fn given_analyzer_when_finalizing_then_internal_before_external() {
    let log: Log = Rc::default();
    let mut analyzer = Analyzer::new(
        Box::new(ScriptedAnalyzer::new("internal", &log).value("A", 1.0)),
        Box::new(RecordingController { log: Rc::clone(&log) }),
        Box::new(ScriptedAnalyzer::new("external", &log).value("B", 1.0)),
    )
    .unwrap();

    analyzer.initialize_before_optimization_loop().unwrap();
    analyzer.finalize_after_optimization_loop().unwrap();

    assert_eq!(
        *log.borrow(),
        vec![
            "internal:initialize",
            "external:initialize",
            "internal:finalize",
            "external:finalize"
        ]
    );
}

#[rstest]
fn given_two_iterations_when_analyzing_then_norms_overwritten_and_rows_appended() {
    // Arrange
    let log: Log = Rc::default();
    let dir = TempDir::new().unwrap();
    let (report, report_path) = report_in(&dir);
    let recording = r#"{
        "1": {
            "A": { "value": 10.0, "gradient": { "1": [3.0, 0.0, 0.0], "2": [0.0, 4.0, 0.0] } },
            "B": { "value": 20.0, "gradient": { "1": [1.0, 0.0, 0.0], "2": [0.0, 2.0, 0.0] } }
        },
        "2": {
            "A": { "value": 2.0, "gradient": { "1": [6.0, 0.0, 0.0] } },
            "B": { "value": 4.0, "gradient": { "1": [0.0, 8.0, 0.0] } }
        }
    }"#;
    let external = ReplayAnalyzer::from_json_str(recording, ResponseFilter::All).unwrap();
    let mut analyzer = create_analyzer(
        &combined_settings(),
        Box::new(RecordingController { log }),
        Box::new(external),
        report,
        |_| -> Box<dyn ResponseAnalyzer> { Box::new(EmptyAnalyzer) },
    )
    .unwrap();
    let mut store = ResponseStore::new();

    // Act
    analyzer.initialize_before_optimization_loop().unwrap();
    for iteration in [1, 2] {
        store.clear_requests();
        request_objective(&mut store, "F");
        analyzer
            .analyze_design_and_report_to_communicator(&DesignSnapshot::new(), iteration, &mut store)
            .unwrap();
    }

    // Assert: only the second iteration's norms remain
    // F = 0.5*A + 0.5*B = [3, 4, 0] at point 1
    let expected: BTreeMap<String, f64> = [
        ("A".to_string(), 6.0),
        ("B".to_string(), 8.0),
        ("F".to_string(), 5.0),
    ]
    .into_iter()
    .collect();
    assert_eq!(analyzer.gradient_max_norms(), &expected);

    // Assert: one header block, then one row per iteration in order
    let content = fs::read_to_string(&report_path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 8);
    assert_eq!(
        lines.iter().filter(|l| l.starts_with("-----")).count(),
        2
    );
    assert_eq!(
        lines[6],
        "   1,  1.50000E+01,  1.00000E+01,  2.00000E+01,  3.00000E+00,  4.00000E+00,  2.00000E+00"
    );
    assert_eq!(
        lines[7],
        "   2,  3.00000E+00,  2.00000E+00,  4.00000E+00,  5.00000E+00,  6.00000E+00,  8.00000E+00"
    );
}
