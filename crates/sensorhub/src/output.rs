//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one line per item.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, builder::Builder, settings::Style};

use sensorhub_core::{HealthStatus, Severity};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

pub fn health(status: HealthStatus, color: bool) -> String {
    let text = status.to_string();
    if !color {
        return text;
    }
    match status {
        HealthStatus::Good => text.green().to_string(),
        HealthStatus::Bad => text.red().bold().to_string(),
        HealthStatus::Unknown => text.dimmed().to_string(),
    }
}

pub fn severity(level: Severity, color: bool) -> String {
    let text = level.to_string();
    if !color {
        return text;
    }
    match level {
        Severity::Info => text.cyan().to_string(),
        Severity::Warning => text.yellow().to_string(),
        Severity::Error => text.red().bold().to_string(),
    }
}

/// Dimmed header line printed before each live update in table mode.
pub fn banner(label: &str, color: bool) -> String {
    let stamp = chrono::Local::now().format("%H:%M:%S");
    let line = format!("── {label} @ {stamp} ──");
    if color { line.dimmed().to_string() } else { line }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
///
/// - `table`: uses the `Tabled` derive to build a pretty table
/// - `json` / `json-compact`: serializes the original data via serde
/// - `yaml`: serializes via serde_yaml
/// - `plain`: calls `line_fn` on each item to emit one line per item
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    line_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Plain => Ok(data.iter().map(line_fn).collect::<Vec<_>>().join("\n")),
        structured => render_structured(structured, data),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses `detail_fn`, since single-item detail views don't
/// use the `Tabled` derive.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    line_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Plain => Ok(line_fn(data)),
        structured => render_structured(structured, data),
    }
}

/// Render a table whose columns are only known at runtime.
pub fn render_grid<T>(
    format: OutputFormat,
    data: &T,
    header: Vec<String>,
    rows: Vec<Vec<String>>,
) -> Result<String, CliError>
where
    T: serde::Serialize + ?Sized,
{
    match format {
        OutputFormat::Table => {
            let mut builder = Builder::default();
            builder.push_record(header);
            for row in rows {
                builder.push_record(row);
            }
            Ok(builder.build().with(Style::rounded()).to_string())
        }
        OutputFormat::Plain => Ok(rows
            .iter()
            .map(|row| row.join("\t"))
            .collect::<Vec<_>>()
            .join("\n")),
        structured => render_structured(structured, data),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_structured<T: serde::Serialize + ?Sized>(
    format: OutputFormat,
    data: &T,
) -> Result<String, CliError> {
    Ok(match format {
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
        OutputFormat::Yaml => serde_yaml::to_string(data)?,
        _ => serde_json::to_string_pretty(data)?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Clone, serde::Serialize, Tabled)]
    struct Item {
        name: String,
        value: u32,
    }

    fn items() -> Vec<Item> {
        vec![
            Item {
                name: "Attic".into(),
                value: 3,
            },
            Item {
                name: "Cellar".into(),
                value: 7,
            },
        ]
    }

    #[test]
    fn plain_is_one_line_per_item() {
        let out = render_list(OutputFormat::Plain, &items(), Item::clone, |i| i.name.clone());
        assert_eq!(out.unwrap(), "Attic\nCellar");
    }

    #[test]
    fn compact_json_is_single_line() {
        let out = render_list(
            OutputFormat::JsonCompact,
            &items(),
            Item::clone,
            |i| i.name.clone(),
        )
        .unwrap();
        assert_eq!(out, r#"[{"name":"Attic","value":3},{"name":"Cellar","value":7}]"#);
    }

    #[test]
    fn grid_table_has_dynamic_header() {
        let out = render_grid(
            OutputFormat::Table,
            &Vec::<u8>::new(),
            vec!["Time".into(), "Attic".into()],
            vec![vec!["10:00".into(), "20.5".into()]],
        )
        .unwrap();
        assert!(out.contains("Attic"));
        assert!(out.contains("20.5"));
    }

    #[test]
    fn uncolored_health_is_plain_text() {
        assert_eq!(health(HealthStatus::Bad, false), "bad");
        assert_eq!(severity(Severity::Warning, false), "warning");
    }
}
