//! Live mode: start one subscription and print every published change
//! until Ctrl-C.

use tabled::Tabled;

use sensorhub_core::{CurrentReadings, Dashboard, ReadingPoint, Snapshots, Subscription};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs, WatchCommand};
use crate::error::CliError;
use crate::output;

use super::notifications::render_state;
use super::readings;
use super::sensors::SensorRow;

#[derive(Tabled)]
struct ReadingRow {
    #[tabled(rename = "Sensor")]
    sensor: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Time")]
    timestamp: String,
}

impl From<&ReadingPoint> for ReadingRow {
    fn from(r: &ReadingPoint) -> Self {
        Self {
            sensor: r.sensor_name.clone(),
            value: format!("{:.2}", r.value),
            timestamp: r.timestamp.clone(),
        }
    }
}

fn render_current(format: OutputFormat, readings: &CurrentReadings) -> Result<String, CliError> {
    match format {
        OutputFormat::Table | OutputFormat::Plain => {
            let points: Vec<&ReadingPoint> = readings.values().collect();
            output::render_list(
                format,
                &points,
                |r| ReadingRow::from(*r),
                |r| format!("{}\t{}\t{}", r.sensor_name, r.value, r.timestamp),
            )
        }
        _ => output::render_single(format, readings, |_| String::new(), |_| String::new()),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    dashboard: &Dashboard,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    let format = global.output;

    match args.command {
        // Types from --type were folded into the sync config already
        WatchCommand::Roster { .. } => {
            let feed = dashboard.roster();
            feed.start();
            follow(feed.snapshots(), "roster", global, |sensors| {
                output::render_list(
                    format,
                    sensors.as_slice(),
                    |s| SensorRow::new(s, color),
                    |s| format!("{}\t{}", s.name, s.health_status),
                )
            })
            .await
        }

        WatchCommand::Current => {
            let feed = dashboard.current_readings();
            feed.start();
            follow(feed.snapshots(), "current readings", global, |readings| {
                render_current(format, readings)
            })
            .await
        }

        WatchCommand::Notifications => {
            dashboard.connect().await;
            let feed = dashboard.notifications();
            feed.start();
            follow(feed.snapshots(), "notifications", global, |state| {
                render_state(format, state, color)
            })
            .await
        }

        WatchCommand::Series(range) => {
            let query = readings::build_query(dashboard, range).await?;
            let sensors = query.sensors.clone();
            let feed = dashboard.temperature_series(query);
            feed.start();
            follow(feed.snapshots(), "series", global, |entries| {
                readings::render(format, entries, &sensors)
            })
            .await
        }
    }
}

/// Print each publish until Ctrl-C or until the cache goes away.
async fn follow<T, F>(
    mut snaps: Snapshots<T>,
    label: &str,
    global: &GlobalOpts,
    render: F,
) -> Result<(), CliError>
where
    T: Send + Sync + 'static,
    F: Fn(&T) -> Result<String, CliError>,
{
    let color = output::should_color(global.color);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result?;
                tracing::debug!(label, "interrupted");
                break;
            }
            next = snaps.changed() => {
                let Some(snapshot) = next else { break };
                let rendered = render(&snapshot)?;
                if global.output == OutputFormat::Table && !global.quiet {
                    println!("{}", output::banner(label, color));
                }
                output::print_output(&rendered, global.quiet);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn current_plain_lists_one_sensor_per_line() {
        let readings = CurrentReadings::from([
            (
                "Attic".to_owned(),
                ReadingPoint {
                    sensor_name: "Attic".into(),
                    timestamp: "2024-01-01T10:00:00".into(),
                    value: 21.5,
                },
            ),
            (
                "Cellar".to_owned(),
                ReadingPoint {
                    sensor_name: "Cellar".into(),
                    timestamp: "2024-01-01T10:00:00".into(),
                    value: 12.0,
                },
            ),
        ]);
        let out = render_current(OutputFormat::Plain, &readings).unwrap();
        assert_eq!(
            out,
            "Attic\t21.5\t2024-01-01T10:00:00\nCellar\t12\t2024-01-01T10:00:00"
        );
    }
}
