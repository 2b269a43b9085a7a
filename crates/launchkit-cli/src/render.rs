use std::io::{BufRead, Write};
use std::sync::Mutex;
use std::time::Duration;

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{ProgressBar, ProgressStyle};
use launchkit_core::AppIdentity;
use launchkit_flow::{PromptReply, UserPrompt};
use launchkit_installer::{OperationResult, ProgressSink};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
}

impl TerminalRenderer {
    pub(crate) fn new(style: OutputStyle) -> Self {
        Self { style }
    }

    pub(crate) fn print_status(self, status: &str, message: &str) {
        match self.style {
            OutputStyle::Plain => println!("{status}: {message}"),
            OutputStyle::Rich => {
                println!("{} {message}", colorize(status_style(), status));
            }
        }
    }

    pub(crate) fn print_warning(self, message: &str) {
        match self.style {
            OutputStyle::Plain => println!("warning: {message}"),
            OutputStyle::Rich => {
                println!("{} {message}", colorize(warning_style(), "warning:"));
            }
        }
    }

    pub(crate) fn print_error(self, message: &str) {
        match self.style {
            OutputStyle::Plain => eprintln!("error: {message}"),
            OutputStyle::Rich => {
                eprintln!("{} {message}", colorize(error_style(), "error:"));
            }
        }
    }

    pub(crate) fn print_lines(self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }

    pub(crate) fn operation_sink(self, label: &str) -> OperationRenderer {
        let bar = if self.style == OutputStyle::Rich {
            let bar = ProgressBar::new(100);
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.cyan.bold} {msg:<24} [{bar:20.cyan/blue}] {pos:>3}%",
            ) {
                bar.set_style(style.progress_chars("=>-"));
            }
            bar.set_message(label.to_string());
            bar.enable_steady_tick(Duration::from_millis(80));
            Some(bar)
        } else {
            None
        };

        OperationRenderer {
            renderer: self,
            bar: Mutex::new(bar),
        }
    }
}

/// Renders download progress and the terminal event for one lifecycle
/// operation.
pub(crate) struct OperationRenderer {
    renderer: TerminalRenderer,
    bar: Mutex<Option<ProgressBar>>,
}

impl ProgressSink for OperationRenderer {
    fn progress(&self, _identity: &AppIdentity, percent: u8) {
        if let Ok(bar) = self.bar.lock() {
            if let Some(bar) = bar.as_ref() {
                bar.set_position(u64::from(percent));
            }
        }
    }

    fn finished(&self, identity: &AppIdentity, result: OperationResult<'_>) {
        if let Ok(mut bar) = self.bar.lock() {
            if let Some(bar) = bar.take() {
                bar.finish_and_clear();
            }
        }

        match result {
            OperationResult::Ok => self.renderer.print_status("done", &identity.to_string()),
            OperationResult::Cancelled => self
                .renderer
                .print_status("cancelled", &identity.to_string()),
            OperationResult::Err(message) => self
                .renderer
                .print_error(&format!("{identity}: {message}")),
        }
    }
}

/// Confirmation prompts for the startup/update sequences. Outside a
/// terminal every question answers `Pending`, which interrupts the sequence
/// the same way an unanswered modal dialog does.
pub(crate) struct CliPrompt {
    pub assume_yes: bool,
    pub interactive: bool,
}

impl UserPrompt for CliPrompt {
    fn confirm(&self, question: &str) -> PromptReply {
        if self.assume_yes {
            return PromptReply::Yes;
        }
        if !self.interactive {
            return PromptReply::Pending;
        }

        print!("{question} [y/N] ");
        if std::io::stdout().flush().is_err() {
            return PromptReply::Pending;
        }

        let mut answer = String::new();
        let stdin = std::io::stdin();
        if stdin.lock().read_line(&mut answer).is_err() {
            return PromptReply::Pending;
        }
        match answer.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => PromptReply::Yes,
            _ => PromptReply::No,
        }
    }
}

fn status_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightGreen.into()))
        .effects(Effects::BOLD)
}

fn warning_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightYellow.into()))
        .effects(Effects::BOLD)
}

fn error_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightRed.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}
