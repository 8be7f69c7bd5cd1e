//! Sensor command handlers.

use std::collections::BTreeMap;

use serde::Serialize;
use tabled::Tabled;

use sensorhub_core::{Dashboard, SensorHealthRecord, SensorSnapshot};

use crate::cli::{GlobalOpts, SensorsArgs, SensorsCommand};
use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
pub(crate) struct SensorRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    sensor_type: String,
    #[tabled(rename = "Health")]
    health: String,
    #[tabled(rename = "Reason")]
    reason: String,
    #[tabled(rename = "Enabled")]
    enabled: String,
}

impl SensorRow {
    pub(crate) fn new(s: &SensorSnapshot, color: bool) -> Self {
        Self {
            id: s.id,
            name: s.name.clone(),
            sensor_type: s.sensor_type.clone(),
            health: output::health(s.health_status, color),
            reason: s.health_reason.clone().unwrap_or_default(),
            enabled: if s.enabled { "yes" } else { "no" }.into(),
        }
    }
}

#[derive(Tabled)]
struct HealthRow {
    #[tabled(rename = "Recorded")]
    recorded_at: String,
    #[tabled(rename = "Health")]
    health: String,
}

#[derive(Serialize, Tabled)]
struct TotalRow {
    #[tabled(rename = "Sensor")]
    sensor: String,
    #[tabled(rename = "Readings")]
    readings: i64,
}

fn totals(map: BTreeMap<String, i64>) -> Vec<TotalRow> {
    let mut rows: Vec<TotalRow> = map
        .into_iter()
        .map(|(sensor, readings)| TotalRow { sensor, readings })
        .collect();
    rows.sort_by(|a, b| b.readings.cmp(&a.readings).then_with(|| a.sensor.cmp(&b.sensor)));
    rows
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    dashboard: &Dashboard,
    args: SensorsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(global.color);

    let out = match args.command {
        // Types from --type were folded into the sync config already
        SensorsCommand::List { .. } => {
            let sensors = dashboard.fetch_roster().await?;
            output::render_list(
                global.output,
                &sensors,
                |s| SensorRow::new(s, color),
                |s| s.name.clone(),
            )?
        }

        SensorsCommand::Health { name, limit } => {
            let history: Vec<SensorHealthRecord> =
                dashboard.sensor_health_history(&name, limit).await?;
            output::render_list(
                global.output,
                &history,
                |h| HealthRow {
                    recorded_at: h.recorded_at.clone(),
                    health: output::health(h.health_status, color),
                },
                |h| format!("{}\t{}", h.recorded_at, h.health_status),
            )?
        }

        SensorsCommand::Totals => {
            let rows = totals(dashboard.total_readings_per_sensor().await?);
            output::render_list(
                global.output,
                &rows,
                |r| TotalRow {
                    sensor: r.sensor.clone(),
                    readings: r.readings,
                },
                |r| format!("{}\t{}", r.sensor, r.readings),
            )?
        }
    };

    output::print_output(&out, global.quiet);
    Ok(())
}
