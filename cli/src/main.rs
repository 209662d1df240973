//! A command line debugger for Argus scripts.
//!
//! `argus run` executes a script in a debuggee realm while a debugger
//! reports breakpoint hits, `debugger` statements and, on request, every
//! thrown exception.

mod debug;
mod session;

use std::{
    fs,
    io::IsTerminal,
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use log::LevelFilter;
use simple_logger::SimpleLogger;

use crate::{
    debug::{Format, Inspector, Reporter},
    session::Session,
};

#[derive(Debug, Parser)]
#[command(author, version, about, name = "argus")]
struct Opt {
    /// Maximum level of diagnostics written to stderr.
    #[arg(long, global = true, default_value_t = LevelFilter::Warn)]
    log_level: LevelFilter,

    /// Never color the output.
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a script under the debugger.
    Run {
        /// The script to run.
        file: PathBuf,

        /// Stop at this line. Can be given more than once.
        #[arg(long = "break", short = 'b', value_name = "LINE")]
        breakpoints: Vec<u32>,

        /// Evaluate this expression whenever execution stops.
        #[arg(long = "watch", short = 'w', value_name = "EXPR")]
        watches: Vec<String>,

        /// Read additional settings from a JSON session file.
        #[arg(long, value_name = "FILE")]
        session: Option<PathBuf>,

        /// Report every exception the script throws, caught or not.
        #[arg(long)]
        report_exceptions: bool,

        /// How to write events.
        #[arg(long, value_enum, default_value_t)]
        format: Format,
    },
}

fn run(file: &Path, mut session: Session, session_file: Option<&Path>, format: Format) -> Result<()> {
    if let Some(path) = session_file {
        session.merge(Session::load(path)?);
    }
    log::info!("running {} with {session:?}", file.display());

    let text = fs::read_to_string(file).wrap_err_with(|| format!("could not read {}", file.display()))?;
    let mut inspector = Inspector::new(session, Reporter::new(format))
        .map_err(|err| eyre!("could not start the debugger: {err}"))?;
    let result = inspector.run(&text, &file.to_string_lossy());
    inspector.report_completion(&result);
    match result {
        Ok(_) => Ok(()),
        Err(_) => Err(eyre!("{} failed", file.display())),
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Opt::parse();
    SimpleLogger::new().with_level(args.log_level).init()?;
    if args.no_color || !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    match args.command {
        Command::Run {
            file,
            breakpoints,
            watches,
            session,
            report_exceptions,
            format,
        } => run(
            &file,
            Session {
                breakpoints,
                watches,
                report_exceptions,
            },
            session.as_deref(),
            format,
        ),
    }
}
