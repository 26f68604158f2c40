//! Console output
//!
//! User-facing messages go to stdout; diagnostics go through `tracing` to stderr.

use std::time::Duration;

use crate::error::ConvertError;
use crate::pipeline::{RunOutcome, RunReport};

/// Formatter for console messages
pub struct Output {
    show_colors: bool,
}

impl Output {
    pub fn new() -> Self {
        Self {
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    /// Formatter that never emits colour codes
    pub fn plain() -> Self {
        Self { show_colors: false }
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    /// Text printed when a run finishes
    pub fn format_outcome(&self, outcome: &RunOutcome) -> String {
        let mut output = String::new();

        match outcome {
            RunOutcome::Written(report) => {
                if report.timed_out {
                    output.push_str(&self.format_timeout());
                    output.push('\n');
                }
                output.push_str(&self.format_summary(report));
            }
            RunOutcome::NoData(report) => {
                if report.timed_out {
                    output.push_str(&self.format_timeout());
                    output.push('\n');
                }
                output.push_str(&self.colorize("Нет данных... завершение программы", "33"));
                output.push('\n');
            }
        }

        output
    }

    /// Text printed for a terminal error
    pub fn format_error(&self, error: &ConvertError) -> String {
        let label = match error {
            ConvertError::Discovery { .. } => "Ошибка при поиске XML файлов:",
            ConvertError::OutputCreation { .. } => "Ошибка при создании CSV файла:",
            ConvertError::HeaderWrite(_) => "Ошибка при записи заголовков:",
            ConvertError::RowWrite { .. } | ConvertError::Flush(_) => "Ошибка при записи строки:",
            ConvertError::Config(_) => "Ошибка конфигурации:",
            ConvertError::Concurrency { .. } => "Внутренняя ошибка:",
        };
        format!("{} {}", self.colorize(label, "31"), error)
    }

    fn format_timeout(&self) -> String {
        self.colorize("Таймаут: сохранены только обработанные файлы", "33")
    }

    fn format_summary(&self, report: &RunReport) -> String {
        let mut output = String::new();
        if let Some(path) = &report.output {
            output.push_str(&format!(
                "{} {}\n",
                self.colorize("Файл сохранён:", "32"),
                path.display()
            ));
        }
        output.push_str(&format!("  Файлов: {}\n", report.files));
        if report.failed > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Пропущено:", "33"),
                report.failed
            ));
        }
        output.push_str(&format!("  Записей: {}\n", report.records));
        output.push_str(&format!("  Столбцов: {}\n", report.columns));
        output.push_str(&format!("  Время: {}\n", format_duration(report.duration)));
        output
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{:.0}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0) as u64;
        let secs = total_secs % 60.0;
        format!("{}m{:.1}s", mins, secs)
    }
}
