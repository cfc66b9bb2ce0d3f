use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use sop_coach::orchestrator::ConsoleObserver;
use sop_coach::{
    CliConfig, ConsoleInput, FileTranscriptWriter, GooseAuditor, GooseCoach, GooseGrader,
    PromptLibrary, ScriptedInput, SessionController, SessionReport, SessionState, SessionStatus,
    StepCatalog, SubjectInput, TranscriptWriter,
};

/// Exit code for a session that ended on the retry bound
const EXIT_HALTED: i32 = 2;

/// Set up isolated configuration directory for sop-coach.
/// This prevents interference from global goose configuration.
fn setup_isolated_config() {
    if std::env::var("GOOSE_PATH_ROOT").is_err() {
        let config_base = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sop-coach");

        // Subdirs goose expects
        let _ = std::fs::create_dir_all(config_base.join("config"));
        let _ = std::fs::create_dir_all(config_base.join("data/sessions"));
        let _ = std::fs::create_dir_all(config_base.join("state/logs"));

        let config_file = config_base.join("config/config.yaml");
        if !config_file.exists() {
            let _ = std::fs::write(&config_file, "extensions: {}\n");
        }

        // SAFETY: called at the start of main() before the runtime spawns
        // worker threads and before any goose code runs.
        unsafe {
            std::env::set_var("GOOSE_PATH_ROOT", &config_base);
        }
    }
}

/// SOP-Coach CLI: procedure training with a grader and an auditor
#[derive(Parser, Debug)]
#[command(name = "sop-coach")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a training session for a procedure
    #[command(name = "run")]
    Run {
        #[command(flatten)]
        args: RunArgs,
    },
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Procedure file (JSON or YAML)
    #[arg(short, long)]
    procedure: PathBuf,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Final step number (defaults to the procedure's last step)
    #[arg(long)]
    max_step: Option<u32>,

    /// Consecutive grader/auditor disagreements before the session halts
    #[arg(long)]
    max_retries: Option<u32>,

    /// Replay subject turns from a file (one per line) instead of reading stdin
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Directory with prompt template overrides
    #[arg(long)]
    prompts_dir: Option<PathBuf>,

    /// Override coach model
    #[arg(long)]
    coach_model: Option<String>,

    /// Override coach provider (e.g., "anthropic", "openai")
    #[arg(long)]
    coach_provider: Option<String>,

    /// Override grader model
    #[arg(long)]
    grader_model: Option<String>,

    /// Override grader provider
    #[arg(long)]
    grader_provider: Option<String>,

    /// Override auditor model
    #[arg(long)]
    auditor_model: Option<String>,

    /// Override auditor provider
    #[arg(long)]
    auditor_provider: Option<String>,

    /// Directory for transcript files
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Do not write transcript files
    #[arg(long)]
    no_save: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_isolated_config();

    let cli = Cli::parse();

    match cli.command {
        Some(Command::Run { args }) => handle_run_command(args).await,
        None => {
            eprintln!("No command specified. Use --help for usage information.");
            eprintln!("Example: sop-coach run --procedure procedures/retail-return.json");
            std::process::exit(1);
        }
    }
}

/// Layer CLI overrides over the configuration file
fn resolve_config(args: &RunArgs) -> Result<CliConfig> {
    let mut config = CliConfig::load_or_default(args.config.as_ref())
        .with_context(|| format!("Failed to load config {:?}", args.config))?;

    if let Some(max_step) = args.max_step {
        config.session.max_step = Some(max_step);
    }
    if let Some(max_retries) = args.max_retries {
        config.session.max_retries = max_retries;
    }

    let overrides = [
        (&mut config.coach, &args.coach_provider, &args.coach_model),
        (&mut config.grader, &args.grader_provider, &args.grader_model),
        (&mut config.auditor, &args.auditor_provider, &args.auditor_model),
    ];
    for (role, provider, model) in overrides {
        if let Some(provider) = provider {
            role.provider_override = Some(provider.clone());
        }
        if let Some(model) = model {
            role.model_override = Some(model.clone());
        }
    }

    if let Some(dir) = &args.prompts_dir {
        config.prompts.dir = Some(dir.clone());
    }
    if let Some(output) = &args.output {
        config.output.runs_dir = output.clone();
    }

    config.session.validate()?;
    Ok(config)
}

async fn handle_run_command(args: RunArgs) -> Result<()> {
    // Logs go to stderr so they stay out of the dialogue
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    info!("SOP-Coach starting");

    let catalog = Arc::new(StepCatalog::load(&args.procedure)?);
    info!(
        "Loaded procedure {:?} with {} steps",
        catalog.title().unwrap_or("untitled"),
        catalog.len()
    );

    let config = resolve_config(&args)?;

    // Prompt overrides are resolved relative to the config file's directory
    let base_dir = args
        .config
        .as_ref()
        .and_then(|p| p.parent())
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    let prompts = Arc::new(PromptLibrary::load(
        config.prompts.dir.as_deref(),
        &base_dir,
    )?);

    let coach = GooseCoach::from_config(&config.coach, prompts.clone()).await?;
    let grader = GooseGrader::from_config(&config.grader, prompts.clone()).await?;
    let auditor = GooseAuditor::from_config(&config.auditor, prompts).await?;

    let state = SessionState::new(catalog, &config.session)?;

    println!(
        "Type \"{}\" to ask the grader a question, \"{}\" to talk to the coach.",
        config.session.query_marker, config.session.coach_marker
    );

    let report = match &args.script {
        Some(path) => {
            let input = ScriptedInput::from_file(path).await?.with_echo(true);
            info!("Replaying {} scripted turns from {:?}", input.remaining(), path);
            run_session(coach, grader, auditor, input, state).await?
        }
        None => run_session(coach, grader, auditor, ConsoleInput::new(), state).await?,
    };

    if !args.no_save {
        let writer = FileTranscriptWriter::new(config.output.clone());
        let dir = writer.write_report(&report).await?;
        println!("\nTranscript saved to {}", dir.display());
    }

    print_result(&report);
    Ok(())
}

async fn run_session<I: SubjectInput>(
    coach: GooseCoach,
    grader: GooseGrader,
    auditor: GooseAuditor,
    input: I,
    state: SessionState,
) -> Result<SessionReport> {
    let mut controller =
        SessionController::new(coach, grader, auditor, input, state).with_observer(ConsoleObserver);
    controller.run().await
}

fn print_result(report: &SessionReport) {
    println!("\n========================================");
    println!("{}", report.status.headline());
    println!("========================================");
    if let Some(title) = &report.procedure {
        println!("Procedure: {}", title);
    }
    println!(
        "Steps completed: {} (final step {} of {})",
        report.steps_completed.len(),
        report.final_step,
        report.max_step
    );

    match &report.status {
        SessionStatus::Completed => println!("Final status: PASSED"),
        SessionStatus::Halted { reason } => {
            println!("Final status: HALTED");
            println!("\n💥 {}", reason);
            std::process::exit(EXIT_HALTED);
        }
    }
}
