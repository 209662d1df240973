//! Rendering of debugger events.

use std::io::{self, Write};

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;

/// How events are written to standard output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum Format {
    /// Human readable, colored when writing to a terminal.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// One entry of a stack listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct FrameInfo {
    pub(crate) kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) function: Option<String>,
    pub(crate) url: String,
    pub(crate) line: u32,
}

/// The result of evaluating a watch expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Watch {
    pub(crate) expression: String,
    #[serde(flatten)]
    pub(crate) outcome: Outcome,
}

/// How a piece of debuggee code completed, rendered for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "camelCase")]
pub(crate) enum Outcome {
    Returned(String),
    Threw(String),
    Terminated,
}

/// Something worth telling the user about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub(crate) enum Event {
    /// The debuggee called `print`.
    Output { text: String },
    /// A breakpoint was hit.
    Breakpoint {
        location: FrameInfo,
        watches: Vec<Watch>,
    },
    /// A `debugger` statement ran.
    DebuggerStatement {
        frames: Vec<FrameInfo>,
        watches: Vec<Watch>,
    },
    /// The debuggee threw.
    Exception { value: String, location: FrameInfo },
    /// The script finished.
    Completion { outcome: Outcome },
}

/// Writes events in the selected format.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Reporter {
    format: Format,
}

impl Reporter {
    pub(crate) const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Writes `event` to standard output.
    pub(crate) fn emit(self, event: &Event) {
        let rendered = match self.format {
            Format::Json => match serde_json::to_string(event) {
                Ok(json) => json,
                Err(err) => {
                    log::error!("could not serialize {event:?}: {err}");
                    return;
                }
            },
            Format::Text => render_text(event),
        };
        let mut stdout = io::stdout().lock();
        if let Err(err) = writeln!(stdout, "{rendered}") {
            log::warn!("could not write to stdout: {err}");
        }
    }
}

fn location(frame: &FrameInfo) -> String {
    format!("{}:{}", frame.url, frame.line)
}

fn render_outcome(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Returned(value) => value.clone(),
        Outcome::Threw(value) => format!("{} {value}", "threw".red()),
        Outcome::Terminated => "terminated".red().to_string(),
    }
}

fn render_watches(out: &mut String, watches: &[Watch]) {
    for watch in watches {
        out.push_str(&format!(
            "\n    {} = {}",
            watch.expression.cyan(),
            render_outcome(&watch.outcome)
        ));
    }
}

fn render_text(event: &Event) -> String {
    match event {
        Event::Output { text } => text.clone(),
        Event::Breakpoint { location: at, watches } => {
            let mut out = format!("{} at {}", "breakpoint".yellow().bold(), location(at));
            render_watches(&mut out, watches);
            out
        }
        Event::DebuggerStatement { frames, watches } => {
            let mut out = "debugger statement".yellow().bold().to_string();
            for (depth, frame) in frames.iter().enumerate() {
                out.push_str(&format!(
                    "\n  #{depth} {} {} ({})",
                    frame.kind,
                    frame.function.as_deref().unwrap_or("<top level>").bold(),
                    location(frame)
                ));
            }
            render_watches(&mut out, watches);
            out
        }
        Event::Exception { value, location: at } => {
            format!("{} {value} at {}", "exception".red().bold(), location(at))
        }
        Event::Completion { outcome } => match outcome {
            Outcome::Returned(value) => value.dimmed().to_string(),
            other => render_outcome(other),
        },
    }
}
