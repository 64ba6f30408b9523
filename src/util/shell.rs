//! Terminal output for the depsync binary.
//!
//! Status lines go to stderr as `{status:>12} {message}`. In JSON mode no
//! human output is produced; each event is one JSON object per line on
//! stdout.

use std::fmt::Display;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

/// Human and JSON output are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellMode {
    Human {
        verbosity: Verbosity,
        color: ColorChoice,
    },
    Json,
}

impl Default for ShellMode {
    fn default() -> Self {
        ShellMode::Human {
            verbosity: Verbosity::Normal,
            color: ColorChoice::Auto,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only
    Quiet,
    #[default]
    Normal,
    /// No spinner; every step is printed as it starts
    Verbose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Color when stderr is a terminal
    #[default]
    Auto,
    Always,
    Never,
}

/// What a status line reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Removed,
    Moved,
    Added,
    Finished,
    Scanning,
    Info,
    Warning,
    Error,
}

impl Status {
    fn as_str(&self) -> &'static str {
        match self {
            Status::Removed => "Removed",
            Status::Moved => "Moved",
            Status::Added => "Added",
            Status::Finished => "Finished",
            Status::Scanning => "Scanning",
            Status::Info => "Info",
            Status::Warning => "Warning",
            Status::Error => "error",
        }
    }

    fn color_code(&self) -> &'static str {
        match self {
            Status::Removed | Status::Moved | Status::Added | Status::Finished => "\x1b[1;32m",
            Status::Scanning => "\x1b[1;36m",
            Status::Info => "\x1b[1;34m",
            Status::Warning => "\x1b[1;33m",
            Status::Error => "\x1b[1;31m",
        }
    }
}

const STATUS_WIDTH: usize = 12;

#[derive(Debug)]
pub struct Shell {
    mode: ShellMode,
    use_color: bool,
}

impl Shell {
    pub fn new(mode: ShellMode) -> Self {
        let use_color = match &mode {
            ShellMode::Json => false,
            ShellMode::Human { color, .. } => match color {
                ColorChoice::Auto => io::stderr().is_terminal(),
                ColorChoice::Always => true,
                ColorChoice::Never => false,
            },
        };

        Shell { mode, use_color }
    }

    /// Build a shell from CLI flags. JSON wins over quiet and verbose.
    pub fn from_flags(quiet: bool, verbose: bool, color: ColorChoice, json: bool) -> Self {
        let mode = if json {
            ShellMode::Json
        } else {
            let verbosity = if quiet {
                Verbosity::Quiet
            } else if verbose {
                Verbosity::Verbose
            } else {
                Verbosity::Normal
            };
            ShellMode::Human { verbosity, color }
        };

        Shell::new(mode)
    }

    pub fn mode(&self) -> &ShellMode {
        &self.mode
    }

    pub fn is_quiet(&self) -> bool {
        matches!(
            self.mode,
            ShellMode::Human {
                verbosity: Verbosity::Quiet,
                ..
            }
        )
    }

    pub fn is_verbose(&self) -> bool {
        matches!(
            self.mode,
            ShellMode::Human {
                verbosity: Verbosity::Verbose,
                ..
            }
        )
    }

    pub fn is_json(&self) -> bool {
        matches!(self.mode, ShellMode::Json)
    }

    pub fn use_color(&self) -> bool {
        self.use_color
    }

    /// Print a status line. Quiet mode keeps only errors; JSON mode
    /// drops everything.
    pub fn status(&self, status: Status, msg: impl Display) {
        if self.is_json() || (self.is_quiet() && status != Status::Error) {
            return;
        }
        eprintln!("{} {}", self.format_status(status), msg);
    }

    pub fn note(&self, msg: impl Display) {
        self.status(Status::Info, msg);
    }

    pub fn warn(&self, msg: impl Display) {
        self.status(Status::Warning, msg);
    }

    pub fn error(&self, msg: impl Display) {
        if self.is_json() {
            self.json_event(&serde_json::json!({
                "reason": "error",
                "message": msg.to_string(),
            }));
        } else {
            self.status(Status::Error, msg);
        }
    }

    /// Write one JSON line to stdout. Ignored outside JSON mode.
    pub fn json_event<T: Serialize + ?Sized>(&self, event: &T) {
        if !self.is_json() {
            return;
        }
        match serde_json::to_string(event) {
            Ok(line) => {
                let mut stdout = io::stdout().lock();
                let _ = writeln!(stdout, "{}", line);
                let _ = stdout.flush();
            }
            Err(e) => tracing::debug!("dropping unserializable event: {}", e),
        }
    }

    fn format_status(&self, status: Status) -> String {
        let text = status.as_str();
        if self.use_color {
            format!(
                "{}{:>width$}\x1b[0m",
                status.color_code(),
                text,
                width = STATUS_WIDTH
            )
        } else {
            format!("{:>width$}", text, width = STATUS_WIDTH)
        }
    }

    /// Start a timed step. In normal mode a spinner runs until the span
    /// finishes; verbose mode prints the start line instead.
    pub fn span(self: &Arc<Self>, status: Status, msg: impl Display) -> Span {
        Span::new(Arc::clone(self), status, msg.to_string())
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new(ShellMode::default())
    }
}

/// A timed step, ended by [`Span::finish_with_message`] or on drop.
pub struct Span {
    shell: Arc<Shell>,
    spinner: Option<ProgressBar>,
    start: Instant,
    finished: bool,
}

impl Span {
    const TICK: Duration = Duration::from_millis(80);

    fn new(shell: Arc<Shell>, status: Status, message: String) -> Self {
        let spinner = if shell.is_verbose() {
            shell.status(status, &message);
            None
        } else if shell.is_quiet() || shell.is_json() || !io::stderr().is_terminal() {
            None
        } else {
            Some(spinner(status, message))
        };

        Span {
            shell,
            spinner,
            start: Instant::now(),
            finished: false,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish_with_message(mut self, msg: impl Display) {
        self.finished = true;
        self.clear();
        self.shell.status(
            Status::Finished,
            format!("{} in {}", msg, format_duration(self.start.elapsed())),
        );
    }

    fn clear(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        if !self.finished {
            self.clear();
        }
    }
}

fn spinner(status: Status, message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{prefix:>12.cyan.bold} {spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_prefix(status.as_str());
    pb.set_message(message);
    pb.enable_steady_tick(Span::TICK);
    pb
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flags() {
        let shell = Shell::from_flags(false, false, ColorChoice::Never, false);
        assert!(!shell.is_quiet());
        assert!(!shell.is_verbose());
        assert!(!shell.is_json());
        assert!(!shell.use_color());

        assert!(Shell::from_flags(true, false, ColorChoice::Auto, false).is_quiet());
        assert!(Shell::from_flags(false, true, ColorChoice::Auto, false).is_verbose());

        let json = Shell::from_flags(true, true, ColorChoice::Always, true);
        assert!(json.is_json());
        assert!(!json.is_quiet());
        assert!(!json.use_color());
    }

    #[test]
    fn test_status_alignment() {
        let shell = Shell::from_flags(false, false, ColorChoice::Never, false);
        let formatted = shell.format_status(Status::Moved);
        assert_eq!(formatted, "       Moved");

        let colored = Shell::from_flags(false, false, ColorChoice::Always, false);
        assert_eq!(
            colored.format_status(Status::Error),
            "\x1b[1;31m       error\x1b[0m"
        );
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "0.25s");
        assert_eq!(format_duration(Duration::from_secs(3)), "3.00s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1.5m");
    }

    #[test]
    fn test_quiet_span_has_no_spinner() {
        let shell = Arc::new(Shell::from_flags(true, false, ColorChoice::Never, false));
        let span = shell.span(Status::Scanning, "sources");
        assert!(span.spinner.is_none());
        span.finish_with_message("scan");
    }
}
