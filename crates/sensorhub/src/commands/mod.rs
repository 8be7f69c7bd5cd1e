//! Command dispatch: bridges CLI args -> dashboard queries -> output formatting.

pub mod config_cmd;
pub mod notifications;
pub mod readings;
pub mod sensors;
pub mod watch;

use sensorhub_core::{Dashboard, SyncConfig};

use crate::cli::{Command, GlobalOpts, SensorsCommand, WatchCommand};
use crate::error::CliError;

/// Fold command-specific flags that shape the sync itself into `sync`.
pub fn tune(cmd: &Command, sync: &mut SyncConfig) {
    let types = match cmd {
        Command::Sensors(args) => match &args.command {
            SensorsCommand::List { types } => types,
            _ => return,
        },
        Command::Watch(args) => match &args.command {
            WatchCommand::Roster { types } => types,
            _ => return,
        },
        _ => return,
    };
    if !types.is_empty() {
        sync.sensor_types.clone_from(types);
    }
}

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    dashboard: &Dashboard,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Sensors(args) => sensors::handle(dashboard, args, global).await,
        Command::Readings(args) => readings::handle(dashboard, args, global).await,
        Command::Watch(args) => watch::handle(dashboard, args, global).await,
        Command::Notifications(args) => notifications::handle(dashboard, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "local command reached server dispatch".into(),
        )),
    }
}
