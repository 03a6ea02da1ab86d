//! Stage-gated workflow orchestrator CLI.
//!
//! `stagegate init` freezes the default plan into `.stagegate/state/run_state.json`.
//! The host then runs `stagegate step` once per turn, passing hook JSON on
//! stdin, and obeys the directive printed on stdout.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stagegate::cancel::{CancelOutcome, cancel_run};
use stagegate::core::types::Directive;
use stagegate::exit_codes;
use stagegate::io::hook::{read_trigger, write_directive};
use stagegate::io::run_state::StateError;
use stagegate::logging;
use stagegate::plan::{DEFAULT_WORKFLOW, plan_banner};
use stagegate::start::{StartOptions, start_run};
use stagegate::status::read_status;
use stagegate::step::{StepEvent, run_step};

#[derive(Parser)]
#[command(name = "stagegate", version, about = "Stage-gated workflow orchestrator")]
struct Cli {
    /// Workspace root (defaults to `$STAGEGATE_PROJECT_DIR`, then the current directory).
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a run on the default five-stage plan.
    Init {
        /// Requirements document driving the run (a leading `@` is ignored).
        input_document: String,
        /// Free-form workflow label stored with the run.
        #[arg(long, default_value = DEFAULT_WORKFLOW)]
        workflow: String,
        /// Stop after this many stages (0 means unlimited).
        #[arg(long, default_value_t = 0)]
        max_stages: u32,
    },
    /// Gate the active stage once; reads hook JSON on stdin.
    Step,
    /// Print the run as KEY=value lines.
    Status,
    /// Delete the run state.
    Cancel,
}

fn main() -> ExitCode {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("❌ stagegate: {err:#}");
            exit_codes::INVALID
        }
    };
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = resolve_root(cli.root)?;
    match cli.command {
        Command::Init {
            input_document,
            workflow,
            max_stages,
        } => cmd_init(
            &root,
            &StartOptions {
                input_document,
                workflow,
                max_stages,
            },
        ),
        Command::Step => cmd_step(&root),
        Command::Status => cmd_status(&root),
        Command::Cancel => cmd_cancel(&root),
    }
}

const PROJECT_DIR_ENV: &str = "STAGEGATE_PROJECT_DIR";

fn resolve_root(root: Option<PathBuf>) -> Result<PathBuf> {
    let root = match root.or_else(|| std::env::var_os(PROJECT_DIR_ENV).map(PathBuf::from)) {
        Some(root) => root,
        None => std::env::current_dir().context("resolve current directory")?,
    };
    root.canonicalize()
        .with_context(|| format!("workspace root {}", root.display()))
}

fn cmd_init(root: &Path, options: &StartOptions) -> Result<i32> {
    let outcome = start_run(root, options)?;
    let state = &outcome.state;
    eprintln!("🚀 Starting {} run", state.workflow);
    eprintln!("   Input: {}", state.input_document_path);
    eprintln!("   Stages: {}", plan_banner());
    if state.max_stages > 0 {
        eprintln!("   Max stages: {}", state.max_stages);
    }
    eprintln!("   State: .stagegate/state/run_state.json");
    println!("{}", outcome.first_instruction);
    Ok(exit_codes::OK)
}

fn cmd_step(root: &Path) -> Result<i32> {
    let trigger = read_trigger(io::stdin().lock(), root)?;
    let outcome = run_step(root, &trigger)?;

    if let Directive::Halt { reason } = &outcome.directive {
        eprintln!("⚠️  stagegate: {reason}");
        eprintln!(
            "   Run `stagegate init <document>` to start over, or `stagegate cancel` to discard the run."
        );
        return Ok(exit_codes::HALTED);
    }

    match &outcome.event {
        StepEvent::Advanced {
            from,
            to,
            iterations,
        } => eprintln!("✅ Stage '{from}' → '{to}' (after {iterations} iteration(s))"),
        StepEvent::Completed { stages } => {
            eprintln!("🎉 All stages complete! {stages} stages finished successfully.");
        }
        StepEvent::StoppedAtMax { max_stages } => {
            eprintln!("⏹️  Max stages ({max_stages}) reached. Stopping.");
        }
        _ => {}
    }

    let mut stdout = io::stdout().lock();
    write_directive(&mut stdout, &outcome.directive)?;
    stdout.flush().context("flush stdout")?;
    Ok(exit_codes::OK)
}

fn cmd_status(root: &Path) -> Result<i32> {
    match read_status(root) {
        Ok(report) => {
            for line in report.lines() {
                println!("{line}");
            }
            Ok(exit_codes::OK)
        }
        Err(err)
            if err
                .downcast_ref::<StateError>()
                .is_some_and(StateError::is_corruption) =>
        {
            eprintln!("ACTIVE=false");
            eprintln!("ERROR={err:#}");
            Ok(exit_codes::HALTED)
        }
        Err(err) => Err(err),
    }
}

fn cmd_cancel(root: &Path) -> Result<i32> {
    match cancel_run(root)? {
        CancelOutcome::NothingToCancel => println!("No active run to cancel."),
        CancelOutcome::Cancelled { stage: Some(stage) } => {
            println!("Cancelled run (was at stage: {stage}).");
        }
        CancelOutcome::Cancelled { stage: None } => {
            println!("Cancelled run (state was unreadable).");
        }
    }
    Ok(exit_codes::OK)
}
