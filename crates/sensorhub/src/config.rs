//! Resolution of the active profile plus command-line overrides into a
//! `sensorhub_core::SyncConfig`.
//!
//! Core never sees profiles -- it receives a pre-built `SyncConfig`.

use secrecy::SecretString;

use sensorhub_config::{Config, Profile, config_path, profile_to_sync_config};
use sensorhub_core::{SyncConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Build a `SyncConfig` from the loaded config, the active profile, and
/// CLI overrides (flag > env > profile > defaults).
pub fn build_sync_config(global: &GlobalOpts, cfg: &Config) -> Result<SyncConfig, CliError> {
    let profile_name = cfg.profile_name(global.profile.as_deref());

    let mut sync = if let Some(profile) = cfg.profiles.get(&profile_name) {
        profile_to_sync_config(profile, &cfg.defaults)?
    } else if global.profile.is_some() {
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: available_profiles(cfg),
        });
    } else {
        // No profile found -- build from CLI flags / env vars alone
        let server = global.server.as_deref().ok_or_else(|| CliError::NoConfig {
            path: config_path().display().to_string(),
        })?;
        let adhoc = Profile {
            server: server.into(),
            ..Profile::default()
        };
        profile_to_sync_config(&adhoc, &cfg.defaults)?
    };

    apply_overrides(&mut sync, global)?;
    Ok(sync)
}

fn apply_overrides(sync: &mut SyncConfig, global: &GlobalOpts) -> Result<(), CliError> {
    if let Some(ref server) = global.server {
        sync.url = server.parse().map_err(|_| CliError::Validation {
            field: "server".into(),
            reason: format!("invalid URL: {server}"),
        })?;
    }
    if let Some(ref token) = global.session_token {
        sync.session = Some(SecretString::from(token.clone()));
    }
    if global.insecure {
        sync.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(timeout) = global.timeout {
        sync.timeout = timeout;
    }
    Ok(())
}

fn available_profiles(cfg: &Config) -> String {
    let mut names: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort_unstable();
    names.join(", ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use clap::Parser;
    use secrecy::ExposeSecret;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["sensorhub"];
        argv.extend_from_slice(args);
        argv.extend_from_slice(&["sensors", "totals"]);
        Cli::try_parse_from(argv).unwrap().global
    }

    fn with_profile(name: &str, server: &str) -> Config {
        let mut cfg = Config {
            default_profile: Some(name.into()),
            ..Config::default()
        };
        cfg.profiles.insert(
            name.into(),
            Profile {
                server: server.into(),
                sensor_types: Some(vec!["Humidity".into()]),
                ..Profile::default()
            },
        );
        cfg
    }

    #[test]
    fn server_flag_alone_is_enough() {
        let sync = build_sync_config(&global(&["--server", "http://hub.local:8080"]), &Config::default())
            .unwrap();
        assert_eq!(sync.url.as_str(), "http://hub.local:8080/");
        assert_eq!(sync.sensor_types, vec!["Temperature"]);
    }

    #[test]
    fn missing_server_reports_config_path() {
        let err = build_sync_config(&global(&[]), &Config::default()).unwrap_err();
        assert!(matches!(err, CliError::NoConfig { .. }));
    }

    #[test]
    fn unknown_explicit_profile_lists_available() {
        let cfg = with_profile("lab", "http://hub.lab");
        let err = build_sync_config(&global(&["--profile", "prod"]), &cfg).unwrap_err();
        match err {
            CliError::ProfileNotFound { name, available } => {
                assert_eq!(name, "prod");
                assert_eq!(available, "lab");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn flags_override_profile() {
        let cfg = with_profile("lab", "http://hub.lab");
        let sync = build_sync_config(
            &global(&[
                "--server",
                "http://other.lab",
                "--session-token",
                "tok",
                "-k",
                "--timeout",
                "5s",
            ]),
            &cfg,
        )
        .unwrap();
        assert_eq!(sync.url.as_str(), "http://other.lab/");
        assert_eq!(sync.session.unwrap().expose_secret(), "tok");
        assert_eq!(sync.tls, TlsVerification::DangerAcceptInvalid);
        assert_eq!(sync.timeout, Duration::from_secs(5));
        assert_eq!(sync.sensor_types, vec!["Humidity"]);
    }
}
