//! vbat CLI binary entry point.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use vbatool::error::VbatError;
use vbatool::output::{AnalyzeOutput, ErrorOutput, RenameOutput};
use vbatool::types::{QualifiedModuleName, QualifiedSelection, Selection};
use vbatool::vba::{
    EditApplier, EngineConfig, FileEditApplier, FileSourceProvider, InspectionRunner, ParserEngine,
    SourceProvider,
};

/// Static analysis and rename refactoring for VBA-style module sources.
#[derive(Parser)]
#[command(name = "vbat")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Emit machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a project directory, resolve it, and run all inspections.
    Analyze {
        /// Project directory (`.bas` / `.cls` files)
        root: PathBuf,
    },

    /// Rename the declaration at a location across the whole project.
    Rename {
        /// Project directory (`.bas` / `.cls` files)
        root: PathBuf,

        /// Location of the declaration: Module:line:col
        #[arg(long)]
        at: String,

        /// New name for the declaration
        #[arg(long)]
        to: String,

        /// Apply changes to the project files (default: dry-run)
        #[arg(long)]
        apply: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Commands::Analyze { root } => run_analyze(root, cli.json),
        Commands::Rename {
            root,
            at,
            to,
            apply,
        } => run_rename(root, at, to, *apply, cli.json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            if cli.json {
                let payload = ErrorOutput::new(&error);
                println!("{}", serde_json::to_string_pretty(&payload).unwrap_or_default());
            } else {
                eprintln!("error: {error}");
            }
            ExitCode::from(error.error_code().code())
        }
    }
}

fn load_project(root: &Path) -> Result<(ParserEngine, FileSourceProvider), VbatError> {
    let provider = FileSourceProvider::open(root)?;
    let mut engine = ParserEngine::new(EngineConfig::default());
    let cancel = CancellationToken::new();
    for project in provider.projects() {
        engine.load_project(&provider, &project, &cancel)?;
    }
    engine.resolve(&cancel)?;
    Ok((engine, provider))
}

fn run_analyze(root: &Path, json: bool) -> Result<(), VbatError> {
    let (engine, _provider) = load_project(root)?;
    let snapshot = engine.snapshot();
    let run = InspectionRunner::with_defaults().run(&snapshot, &CancellationToken::new());
    let output = AnalyzeOutput::new(engine.status(), &snapshot, &run);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).map_err(|e| VbatError::Internal {
                message: e.to_string(),
            })?
        );
        return Ok(());
    }

    println!("project status: {}", output.project_status);
    for module in &output.modules {
        match &module.diagnostic {
            Some(diagnostic) => println!("  {} [{}] {}", module.module, module.state, diagnostic),
            None => println!("  {} [{}]", module.module, module.state),
        }
    }
    if !output.excluded_modules.is_empty() {
        println!(
            "results are incomplete; excluded: {}",
            output.excluded_modules.join(", ")
        );
    }
    for result in &output.results {
        println!(
            "{}:{}:{}: [{}] {} ({})",
            result.module,
            result.start_line,
            result.start_column,
            result.severity,
            result.description,
            result.inspection
        );
    }
    println!("{} result(s)", output.results.len());
    Ok(())
}

/// Parse `Module:line:col` (or `Project.Module:line:col`) against the loaded
/// project.
fn parse_location(
    at: &str,
    default_project: &str,
) -> Result<(QualifiedModuleName, u32, u32), VbatError> {
    let parts: Vec<&str> = at.rsplitn(3, ':').collect();
    let [col, line, module] = parts.as_slice() else {
        return Err(VbatError::invalid_args(format!(
            "expected Module:line:col, got '{at}'"
        )));
    };
    let line: u32 = line
        .parse()
        .map_err(|_| VbatError::invalid_args(format!("invalid line number in '{at}'")))?;
    let col: u32 = col
        .parse()
        .map_err(|_| VbatError::invalid_args(format!("invalid column number in '{at}'")))?;
    let qmn = match module.split_once('.') {
        Some((project, module)) => QualifiedModuleName::new(project, module),
        None => QualifiedModuleName::new(default_project, *module),
    };
    Ok((qmn, line, col))
}

fn run_rename(
    root: &Path,
    at: &str,
    to: &str,
    apply: bool,
    json: bool,
) -> Result<(), VbatError> {
    let (engine, provider) = load_project(root)?;
    let snapshot = engine.snapshot();

    let default_project = provider
        .projects()
        .into_iter()
        .next()
        .unwrap_or_else(|| "Project".to_string());
    let (module, line, col) = parse_location(at, &default_project)?;

    if let Some(state) = snapshot.module_states.get(&module) {
        if !snapshot.is_ready(&module) {
            return Err(VbatError::ModuleUnavailable {
                module: module.to_string(),
                state: state.as_str().to_string(),
            });
        }
    }

    let target = snapshot
        .store
        .declaration_at_identifier(&module, line, col)
        .or_else(|| {
            snapshot.find_declaration(&QualifiedSelection::new(
                module.clone(),
                Selection::new(line, col, line, col),
            ))
        })
        .ok_or_else(|| VbatError::DeclarationNotFound {
            location: at.to_string(),
        })?;

    let edits = engine.rename(&snapshot, target.id, to)?;

    let applied = if apply {
        FileEditApplier::new(&provider).apply(&edits)?;
        Some(true)
    } else {
        None
    };

    let output = RenameOutput::new(&target.name, to, &edits, applied);
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).map_err(|e| VbatError::Internal {
                message: e.to_string(),
            })?
        );
        return Ok(());
    }

    println!("rename {} -> {}", output.target, output.new_name);
    for edit in &output.edits {
        println!(
            "  {}:{}:{} -> {}",
            edit.module, edit.start_line, edit.start_column, edit.new_text
        );
    }
    println!(
        "{} edit(s) in {} module(s){}",
        output.edits.len(),
        output.modules_changed,
        if apply { ", applied" } else { " (dry run)" }
    );
    Ok(())
}
