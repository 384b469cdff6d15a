//! Hivemind config CLI entry point.

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use hivemind_config::config::ClientConfig;
use hivemind_config::preferences::{FilePreferencesStore, PreferencesStore, UiPreferences};
use hivemind_config::save::build_validated_submission;
use hivemind_config::store::{ConfigStoreDyn, HttpConfigStore};
use hivemind_config::widget::{FieldGroup, render_section};
use hivemind_config::{EditSession, SaveCoordinator, Validator};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hivemind-config")]
#[command(about = "Inspect and edit Open-Hivemind configuration sections")]
struct Cli {
    /// Path to client config file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the sections the backend exposes
    Sections,
    /// Show the fields of a section (defaults to the last one opened)
    Show { section: Option<String> },
    /// Edit fields of a section and save them
    Set {
        section: String,
        /// KEY=VALUE pairs, typed as they would be into the form
        #[arg(required = true)]
        assignments: Vec<String>,
        /// Print the update that would be sent instead of saving
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = if let Some(config_path) = &cli.config {
        ClientConfig::load_from_path(config_path)
            .with_context(|| format!("failed to load config from {}", config_path.display()))?
    } else {
        ClientConfig::load().with_context(|| "failed to load configuration")?
    };
    tracing::debug!(base_url = %config.api.base_url, "configuration loaded");

    let store: Arc<dyn ConfigStoreDyn> =
        Arc::new(HttpConfigStore::new(&config.api).with_context(|| "failed to create API client")?);
    let coordinator = SaveCoordinator::new(store.clone());
    let validator = Arc::new(Validator::default());

    let preferences_store = FilePreferencesStore::new(config.preferences_path());
    let mut preferences = preferences_store.load_preferences().unwrap_or_else(|error| {
        tracing::warn!(%error, "ignoring unreadable preferences");
        UiPreferences::default()
    });

    match cli.command {
        Command::Sections => {
            let sections = store.list_sections().await.context("failed to list sections")?;
            for section in sections {
                println!("{section}");
            }
        }
        Command::Show { section } => {
            let Some(name) = section.or_else(|| preferences.last_section.clone()) else {
                anyhow::bail!("no section given and none opened before");
            };
            let session = EditSession::open(&*store, &name, validator).await?;
            print_groups(&name, &render_section(&session), &preferences);
            remember_section(&preferences_store, &mut preferences, &name);
        }
        Command::Set {
            section,
            assignments,
            dry_run,
        } => {
            let mut session = EditSession::open(&*store, &section, validator).await?;

            for assignment in &assignments {
                let (field, raw) = assignment
                    .split_once('=')
                    .with_context(|| format!("expected KEY=VALUE, got '{assignment}'"))?;
                if let Some(diagnostic) = session.set_input(field.trim(), raw)? {
                    println!("{}: {}", diagnostic.field, diagnostic.message);
                }
            }

            if dry_run {
                let submission =
                    build_validated_submission(session.section(), session.buffer(), &session.validation());
                for warning in &submission.warnings {
                    println!("warning: {warning}");
                }
                println!("{}", serde_json::to_string_pretty(&submission.updates)?);
            } else {
                let outcome = session.save(&coordinator).await?;
                println!("saved {} field(s) in {}", outcome.submitted.len(), outcome.section);
                for warning in &outcome.warnings {
                    println!("warning: {warning}");
                }
                if let Some(notice) = session.notice() {
                    println!("{}", notice.message);
                }
            }
            remember_section(&preferences_store, &mut preferences, &section);
        }
    }

    Ok(())
}

fn print_groups(section: &str, groups: &[FieldGroup], preferences: &UiPreferences) {
    println!("[{section}]");
    for group in groups {
        if let Some(name) = &group.name {
            if preferences.collapsed_groups.contains(name) {
                println!("\n{name} ({} fields, collapsed)", group.fields.len());
                continue;
            }
            println!("\n{name}");
        }
        for field in &group.fields {
            println!("  {} = {}  ({})", field.label, field.text, field.source);
            if let Some(error) = &field.error {
                println!("    error: {error}");
            }
            if let Some(warning) = &field.warning {
                println!("    warning: {warning}");
            }
            if preferences.show_advanced {
                if let Some(documentation) = &field.documentation {
                    println!("    {documentation}");
                }
                if let Some(variable) = &field.environment_variable {
                    println!("    env: {variable}");
                }
            }
        }
    }
}

fn remember_section(store: &impl PreferencesStore, preferences: &mut UiPreferences, section: &str) {
    if preferences.last_section.as_deref() == Some(section) {
        return;
    }
    preferences.last_section = Some(section.to_string());
    if let Err(error) = store.save_preferences(preferences) {
        tracing::warn!(%error, "failed to save preferences");
    }
}
