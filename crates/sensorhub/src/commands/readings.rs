//! Aligned temperature series.

use sensorhub_core::{AlignedEntry, Dashboard, DateRange, ReadingsQuery};

use crate::cli::{GlobalOpts, OutputFormat, RangeArgs};
use crate::error::CliError;
use crate::output;

/// Turn range flags into a query. Without `--sensor`, every sensor in the
/// roster gets a column.
pub async fn build_query(dashboard: &Dashboard, args: RangeArgs) -> Result<ReadingsQuery, CliError> {
    let range = DateRange::new(args.start, args.end).ok_or_else(|| CliError::Validation {
        field: "start".into(),
        reason: format!("{} is after --end {}", args.start, args.end),
    })?;

    let sensors = if args.sensors.is_empty() {
        dashboard
            .fetch_roster()
            .await?
            .into_iter()
            .map(|s| s.name)
            .collect()
    } else {
        args.sensors
    };

    Ok(ReadingsQuery::new(Some(range), sensors).hourly(args.hourly))
}

/// Render aligned rows with one column per requested sensor.
pub fn render(
    format: OutputFormat,
    entries: &[AlignedEntry],
    sensors: &[String],
) -> Result<String, CliError> {
    let gap = if format == OutputFormat::Plain { "" } else { "-" };

    let mut header = Vec::with_capacity(sensors.len() + 1);
    header.push("Time".to_owned());
    header.extend(sensors.iter().cloned());

    let rows = entries
        .iter()
        .map(|entry| {
            let mut row = Vec::with_capacity(sensors.len() + 1);
            row.push(entry.timestamp.clone());
            row.extend(sensors.iter().map(|sensor| {
                entry
                    .value(sensor)
                    .map_or_else(|| gap.to_owned(), |v| format!("{v:.2}"))
            }));
            row
        })
        .collect();

    output::render_grid(format, entries, header, rows)
}

pub async fn handle(
    dashboard: &Dashboard,
    args: RangeArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let query = build_query(dashboard, args).await?;
    let entries = dashboard.fetch_series(&query).await?;
    let out = render(global.output, &entries, &query.sensors)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn entry(timestamp: &str, values: &[(&str, Option<f64>)]) -> AlignedEntry {
        AlignedEntry {
            timestamp: timestamp.into(),
            values: values.iter().map(|(k, v)| ((*k).to_owned(), *v)).collect(),
        }
    }

    #[test]
    fn plain_rows_leave_gaps_empty() {
        let entries = vec![entry(
            "2024-01-01T10:00:00",
            &[("Up", Some(20.5)), ("Down", None)],
        )];
        let out = render(
            OutputFormat::Plain,
            &entries,
            &["Up".to_owned(), "Down".to_owned()],
        )
        .unwrap();
        assert_eq!(out, "2024-01-01T10:00:00\t20.50\t");
    }

    #[test]
    fn table_marks_gaps() {
        let entries = vec![entry("2024-01-01T10:00:00", &[("Up", None)])];
        let out = render(OutputFormat::Table, &entries, &["Up".to_owned()]).unwrap();
        assert!(out.contains("Time"));
        assert!(out.contains('-'));
    }
}
