//! Command dispatch

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::application::{create_analyzer, AnalyzerMode};
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::Settings;
use crate::domain::{Communicator, DesignSnapshot, OptimizationSettings, TreeNodeConvert};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::traits::{
    FileSystem, NoopModelPartController, RealFileSystem, ResponseAnalyzer,
};
use crate::infrastructure::{InfraError, ReplayAnalyzer, ResponseFilter, ResponseStore};

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let run_dir = resolve_run_dir(cli.run_dir.as_deref())?;

    match &cli.command {
        Some(Commands::Tree { settings }) => cmd_tree(settings),
        Some(Commands::Internal { settings }) => cmd_internal(settings),
        Some(Commands::Run {
            settings,
            replay,
            iterations,
        }) => cmd_run(&run_dir, settings, replay, *iterations),
        Some(Commands::Config { command }) => cmd_config(&run_dir, command),
        Some(Commands::Completion { shell }) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        None => Err(CliError::Usage(
            "no command given, see --help".to_string(),
        )),
    }
}

fn resolve_run_dir(run_dir: Option<&Path>) -> CliResult<PathBuf> {
    match run_dir {
        Some(dir) if !dir.is_dir() => Err(CliError::InvalidArgs(format!(
            "run directory does not exist: {}",
            dir.display()
        ))),
        Some(dir) => Ok(dir.to_path_buf()),
        None => std::env::current_dir()
            .map_err(|e| CliError::Infra(InfraError::io("resolve current directory", e))),
    }
}

fn load_optimization_settings(fs: &dyn FileSystem, path: &Path) -> CliResult<OptimizationSettings> {
    let content = fs
        .read_to_string(path)
        .map_err(|e| InfraError::io(format!("read settings {}", path.display()), e))?;
    Ok(OptimizationSettings::from_json_str(&content)?)
}

#[instrument]
fn cmd_tree(settings: &Path) -> CliResult<()> {
    let optimization = load_optimization_settings(&RealFileSystem, settings)?;
    let (graph, _) = optimization.dependency_graph()?;
    output::info(&graph.to_tree_string());
    Ok(())
}

#[instrument]
fn cmd_internal(settings: &Path) -> CliResult<()> {
    let optimization = load_optimization_settings(&RealFileSystem, settings)?;
    let internal = optimization.internal_responses()?;
    if internal.is_empty() {
        output::warning("no internal responses configured");
    }
    for response in internal {
        output::info(&response.id);
    }
    Ok(())
}

#[instrument]
fn cmd_run(
    run_dir: &Path,
    settings_path: &Path,
    replay_path: &Path,
    iterations: Option<usize>,
) -> CliResult<()> {
    let settings = Settings::load(Some(run_dir))?;
    let container = ServiceContainer::new(settings, run_dir);
    let fs = container.fs.as_ref();

    let optimization = load_optimization_settings(fs, settings_path)?;
    let internal_ids: BTreeSet<String> = optimization
        .internal_responses()?
        .into_iter()
        .map(|r| r.id)
        .collect();
    debug!("internal ids: {:?}", internal_ids);

    let recording = fs
        .read_to_string(replay_path)
        .map_err(|e| InfraError::io(format!("read replay data {}", replay_path.display()), e))?;
    let internal = ReplayAnalyzer::from_json_str(&recording, ResponseFilter::Only(internal_ids.clone()))?;
    let external = ReplayAnalyzer::from_json_str(&recording, ResponseFilter::Except(internal_ids))?;
    let recorded = external.iterations();

    let mut analyzer = create_analyzer(
        &optimization,
        Box::new(NoopModelPartController),
        Box::new(external),
        container.report_writer(),
        move |_| -> Box<dyn ResponseAnalyzer> { Box::new(internal) },
    )?;

    let objective_ids = optimization.objective_ids()?;
    let mut store = ResponseStore::with_types(optimization.response_types()?);
    let design = DesignSnapshot::new();

    let count = iterations.unwrap_or(recorded.len());
    if count > recorded.len() {
        output::warning(&format!(
            "only {} iterations recorded, {} requested",
            recorded.len(),
            count
        ));
    }

    analyzer.initialize_before_optimization_loop()?;
    for &iteration in recorded.iter().take(count) {
        store.clear_requests();
        for id in &objective_ids {
            store.request_value(id);
            store.request_gradient(id);
        }

        analyzer.analyze_design_and_report_to_communicator(&design, iteration, &mut store)?;

        let values = objective_ids
            .iter()
            .map(|id| store.get_value(id).map(|v| format!("{id} = {v:.6e}")))
            .collect::<Result<Vec<_>, _>>()?;
        output::action(&format!("itr {iteration:>4}"), &values.join(", "));
    }
    analyzer.finalize_after_optimization_loop()?;

    if analyzer.mode() == AnalyzerMode::DependencyAware {
        output::success(&format!(
            "report written to {}",
            container.settings.report_path(run_dir).display()
        ));
    }
    Ok(())
}

#[instrument]
fn cmd_config(run_dir: &Path, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = Settings::load(Some(run_dir))?;
            output::header("Effective configuration");
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Template => output::info(&Settings::template()),
    }
    Ok(())
}
