//! Output formatting for CLI commands

use std::io::IsTerminal;

use crossterm::style::Stylize;
use serde::Serialize;

use crate::domain::TaskStatus;
use crate::storage;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl From<storage::OutputFormat> for OutputFormat {
    fn from(format: storage::OutputFormat) -> Self {
        match format {
            storage::OutputFormat::Text => OutputFormat::Text,
            storage::OutputFormat::Json => OutputFormat::Json,
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    format: OutputFormat,
    color: bool,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            color: false,
        }
    }

    /// Enables colored labels when stdout is a terminal
    pub fn with_color(mut self, enabled: bool) -> Self {
        self.color = enabled && std::io::stdout().is_terminal();
        self
    }

    /// Prints a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Text => println!("{}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "success": true,
                        "message": message
                    })
                );
            }
        }
    }

    /// Prints an error message, with a machine-readable kind in JSON mode
    pub fn error(&self, message: &str, kind: Option<&str>) {
        match self.format {
            OutputFormat::Text => eprintln!("Error: {}", message),
            OutputFormat::Json => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "success": false,
                        "error": message,
                        "kind": kind,
                    })
                );
            }
        }
    }

    /// Prints structured data
    pub fn data<T: Serialize>(&self, data: &T) {
        let rendered = match self.format {
            OutputFormat::Text => serde_json::to_string_pretty(data),
            OutputFormat::Json => serde_json::to_string(data),
        };
        match rendered {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::warn!(error = %e, "failed to serialize output"),
        }
    }

    /// Returns true if using JSON format
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Emits a debug event tagged with the command context
    ///
    /// Shown with `--verbose`, which raises the log filter to `debug`.
    pub fn verbose_ctx(&self, context: &str, message: &str) {
        tracing::debug!(command = context, "{}", message);
    }

    /// Status label, colored when enabled
    pub fn status_label(&self, status: TaskStatus) -> String {
        let label = format!("{:<11}", status.as_str());
        if !self.color {
            return label;
        }
        match status {
            TaskStatus::Todo => label.yellow().to_string(),
            TaskStatus::InProgress => label.cyan().to_string(),
            TaskStatus::Done => label.green().to_string(),
        }
    }

    /// Marker for blocked tasks, colored when enabled
    pub fn blocked_label(&self) -> String {
        if self.color {
            "[blocked]".red().to_string()
        } else {
            "[blocked]".to_string()
        }
    }

    /// Dims secondary text when color is enabled
    pub fn dim(&self, text: &str) -> String {
        if self.color {
            text.dark_grey().to_string()
        } else {
            text.to_string()
        }
    }
}
