mod dump;
mod test_runner;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};

use engine::{Robot, Session};
use prog::parser::LoadError;
use prog::{Ident, ProcId};

/// Rounds `run` allows before giving up on a program.
pub const DEFAULT_MAX_STEPS: usize = 10_000;

#[derive(Parser)]
#[command(name = "karlik", version, about = "Robot programming sandbox")]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log engine activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a procedure on every robot and run until they stop
    Run(RunArgs),

    /// Parse a session file and report errors
    Check {
        /// Session file
        file: String,
    },

    /// Print the map, the program and the robots of a session
    Dump {
        /// Session file
        file: String,
    },

    /// Print a procedure identifier not yet used in the session
    NewIdent {
        /// Session file
        file: String,
    },

    /// Run .test.kar scenario files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Session file
    file: String,

    /// Identifier of the procedure to start
    #[arg(short, long = "proc")]
    proc_name: String,

    /// Maximum number of rounds to run
    #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
    max_steps: usize,

    /// Write the resulting session here
    #[arg(short, long)]
    save: Option<String>,

    /// Do not print the robot report
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.kar file or a directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let color = if cli.no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    match cli.command {
        Command::Run(args) => do_run(args, color),
        Command::Check { file } => {
            load_session(&file, color);
            eprintln!("ok: {} parsed successfully", file);
        }
        Command::Dump { file } => {
            let session = load_session(&file, color);
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = dump::dump_session(&session, &mut stdout) {
                eprintln!("error: {}", e);
                process::exit(1);
            }
        }
        Command::NewIdent { file } => {
            let session = load_session(&file, color);
            match session.module.generate_ident() {
                Ok(ident) => println!("{}", ident),
                Err(e) => {
                    eprintln!("error: {}", e);
                    process::exit(1);
                }
            }
        }
        Command::Test(args) => {
            let path = Path::new(&args.path);
            if args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            process::exit(test_runner::run_tests(path, cli.no_color, &args.category));
        }
    }
}

/// `RUST_LOG` overrides the default filter.
fn init_logging(verbose: bool) {
    let default = if verbose {
        "warn,prog=debug,engine=debug,karlik=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_session(file: &str, color: ColorChoice) -> Session {
    let source = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", file, e);
            process::exit(1);
        }
    };

    let mut files = SimpleFiles::new();
    let file_id = files.add(file.to_string(), source.clone());
    match Session::parse(&source, file_id) {
        Ok(session) => {
            debug!(
                procedures = session.module.len(),
                robots = session.robots.len(),
                "session loaded"
            );
            session
        }
        Err(error) => {
            emit_load_error(&files, &error, color);
            process::exit(1);
        }
    }
}

fn emit_load_error(files: &SimpleFiles<String, String>, error: &LoadError, color: ColorChoice) {
    let writer = StandardStream::stderr(color);
    let config = term::Config::default();
    let diagnostic = error.to_diagnostic();
    let _ = term::emit_to_write_style(&mut writer.lock(), &config, files, &diagnostic);
}

/// Look up an attached procedure by its identifier text.
pub fn find_procedure(session: &Session, name: &str) -> Result<ProcId, String> {
    let ident: Ident = name.parse().map_err(|e| format!("{}", e))?;
    session
        .module
        .procedure_by_ident(ident)
        .ok_or_else(|| format!("no procedure named {}", ident))
}

fn do_run(args: RunArgs, color: ColorChoice) {
    let mut session = load_session(&args.file, color);

    let proc = match find_procedure(&session, &args.proc_name) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    let result = session
        .start(proc)
        .and_then(|_| session.run_until_idle(args.max_steps));
    let run = match result {
        Ok(run) => run,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    if !args.quiet {
        println!("{} round(s)", run.rounds);
        for robot in session.robots.iter() {
            println!("{}", robot_report(robot));
        }
    }

    if let Some(out) = &args.save {
        if let Err(e) = save_session(&session, out) {
            eprintln!("error: cannot write '{}': {}", out, e);
            process::exit(1);
        }
    }

    let faulted = session.robots.iter().any(|r| r.error().is_some());
    if run.limit_hit {
        eprintln!("error: robots still busy after {} round(s)", run.rounds);
    }
    if faulted || run.limit_hit {
        process::exit(1);
    }
}

fn save_session(session: &Session, path: &str) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    session.save(&mut out)?;
    out.flush()
}

fn robot_report(robot: &Robot) -> String {
    let (x, y) = robot.position();
    let state = match robot.error() {
        Some(fault) => format!("faulted: {}", fault.name()),
        None if robot.is_busy() => "busy".to_string(),
        None => "idle".to_string(),
    };
    format!("robot at ({}, {}) facing {}: {}", x, y, robot.direction(), state)
}
