//! Notification command handlers.

use tabled::Tabled;

use sensorhub_core::{
    ChannelPreference, Dashboard, NotificationCategory, NotificationRecord, NotificationState,
};

use crate::cli::{GlobalOpts, NotificationsArgs, NotificationsCommand, OutputFormat};
use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct NotificationRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Read")]
    read: String,
    #[tabled(rename = "Created")]
    created_at: String,
}

impl NotificationRow {
    fn new(r: &NotificationRecord, color: bool) -> Self {
        Self {
            id: r.notification_id,
            severity: output::severity(r.payload.severity, color),
            category: r.payload.category.to_string(),
            title: r.payload.title.clone(),
            read: if r.is_read { "yes" } else { "no" }.into(),
            created_at: r.payload.created_at.clone(),
        }
    }
}

#[derive(Tabled)]
struct PreferenceRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Email")]
    email: bool,
    #[tabled(rename = "In-app")]
    inapp: bool,
}

impl From<&ChannelPreference> for PreferenceRow {
    fn from(p: &ChannelPreference) -> Self {
        Self {
            category: p.category.to_string(),
            email: p.email_enabled,
            inapp: p.inapp_enabled,
        }
    }
}

/// Render the feed. Tables show the records with an unread footer;
/// structured formats get the whole state.
pub fn render_state(
    format: OutputFormat,
    state: &NotificationState,
    color: bool,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => {
            let table = output::render_list(
                format,
                &state.records,
                |r| NotificationRow::new(r, color),
                |r| r.notification_id.to_string(),
            )?;
            Ok(format!("{table}\n{} unread", state.unread))
        }
        OutputFormat::Plain => output::render_list(
            format,
            &state.records,
            |r| NotificationRow::new(r, color),
            |r| format!("{}\t{}", r.notification_id, r.payload.title),
        ),
        _ => output::render_single(format, state, |_| String::new(), |_| String::new()),
    }
}

/// Preference for `category` with unspecified channels kept from
/// `existing` (enabled when there is none).
fn merged_preference(
    category: NotificationCategory,
    email: Option<bool>,
    inapp: Option<bool>,
    existing: Option<&ChannelPreference>,
) -> ChannelPreference {
    ChannelPreference {
        category,
        email_enabled: email
            .or_else(|| existing.map(|p| p.email_enabled))
            .unwrap_or(true),
        inapp_enabled: inapp
            .or_else(|| existing.map(|p| p.inapp_enabled))
            .unwrap_or(true),
    }
}

fn done(global: &GlobalOpts, message: &str) {
    if !global.quiet {
        eprintln!("✓ {message}");
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    dashboard: &Dashboard,
    args: NotificationsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    // Mutations carry the CSRF token issued with the identity
    dashboard.connect().await;
    let color = output::should_color(global.color);
    let feed = dashboard.notifications();

    match args.command {
        NotificationsCommand::List => {
            let state = dashboard.fetch_notifications().await?;
            output::print_output(&render_state(global.output, &state, color)?, global.quiet);
        }

        NotificationsCommand::Read { id } => {
            feed.mark_read(id).await?;
            done(global, &format!("Marked notification {id} read"));
        }

        NotificationsCommand::Dismiss { id } => {
            feed.dismiss(id).await?;
            done(global, &format!("Dismissed notification {id}"));
        }

        NotificationsCommand::ReadAll => {
            feed.mark_all_read().await?;
            done(global, "Marked all notifications read");
        }

        NotificationsCommand::DismissAll => {
            feed.dismiss_all().await?;
            done(global, "Dismissed all notifications");
        }

        NotificationsCommand::Prefs => {
            let state = dashboard.fetch_notifications().await?;
            let out = output::render_list(
                global.output,
                &state.preferences,
                |p| PreferenceRow::from(p),
                |p| format!("{}\t{}\t{}", p.category, p.email_enabled, p.inapp_enabled),
            )?;
            output::print_output(&out, global.quiet);
        }

        NotificationsCommand::SetPref {
            category,
            email,
            inapp,
        } => {
            let category = NotificationCategory::from(category);
            let state = dashboard.fetch_notifications().await?;
            let existing = state.preference(&category);
            let pref = merged_preference(category.clone(), email, inapp, existing);

            if existing.is_some() {
                feed.update_preference(pref).await?;
            } else {
                feed.set_preference(pref).await?;
            }
            done(global, &format!("Saved preference for {category}"));
        }
    }

    Ok(())
}
