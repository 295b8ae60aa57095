use clap::{Parser, Subcommand};
use sa_cli::error::{CliError, CliResult};
use sa_cli::schema::load_model_file;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sa-cli")]
#[command(about = "Nonlinear static and transient analysis of spring models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a model file and build the model and analysis without running
    Validate {
        /// Path to the model YAML file
        model_path: PathBuf,
    },
    /// Run the analysis and print the committed history as JSON
    Run {
        /// Path to the model YAML file
        model_path: PathBuf,
        /// Write results to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Report assembly and solve timings
        #[arg(long)]
        timing: bool,
    },
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { model_path } => cmd_validate(&model_path),
        Commands::Run {
            model_path,
            output,
            timing,
        } => cmd_run(&model_path, output.as_deref(), timing),
    }
}

fn cmd_validate(model_path: &Path) -> CliResult<()> {
    println!("Validating model: {}", model_path.display());
    let file = load_model_file(model_path)?;
    let model = file.build_model()?;
    println!(
        "  {} DOFs, {} equations, {} elements",
        model.num_dofs(),
        model.num_eqn(),
        model.num_elements()
    );
    file.analysis.build(model)?;
    println!("✓ Model is valid");
    Ok(())
}

fn cmd_run(model_path: &Path, output: Option<&Path>, timing: bool) -> CliResult<()> {
    if timing {
        sa_core::timing::enable_timing();
    }
    let file = load_model_file(model_path)?;
    let model = file.build_model()?;
    let mut analysis = file.analysis.build(model)?;
    let outcome = analysis.run();

    let json = serde_json::to_string_pretty(analysis.record())?;
    match output {
        Some(path) => std::fs::write(path, json).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?,
        None => println!("{json}"),
    }
    outcome?;
    eprintln!("✓ {} steps committed", analysis.record().len());
    Ok(())
}
