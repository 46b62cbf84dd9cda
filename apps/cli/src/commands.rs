//! CLI command implementations

use crate::output::{format_bytes, format_speed, print_json_line, print_output};
use crate::progress::TransferProgress;
use crate::{ConfigAction, OutputFormat};
use anyhow::{anyhow, bail, Context, Result};
use console::style;
use resumer_core::{
    discard_partial, ChannelObserver, SettingsStore, TransferController, TransferEvent,
    TransferRequest,
};
use resumer_types::{Settings, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

// ============================================================================
// Transfer Commands
// ============================================================================

pub async fn get(
    store: &SettingsStore,
    url: &str,
    dir: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid URL: {}", url))?;

    let mut settings = store.load().await?;
    if let Some(dir) = dir {
        settings.destination_dir = dir;
    }

    let observer = Arc::new(ChannelObserver::default());
    let mut events = observer.subscribe();
    let runtime = tokio::runtime::Handle::current();
    let controller = TransferController::with_http(settings, observer, runtime)?;

    if !controller.start(url) {
        bail!("A transfer is already running");
    }

    let progress = match format {
        OutputFormat::Human => Some(TransferProgress::new()),
        OutputFormat::Json => None,
    };
    let mut destination = None;
    let mut interrupts = 0u32;

    let terminal = loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    match &progress {
                        Some(bar) => bar.handle_event(&event),
                        None => print_json_line(&event)?,
                    }
                    if let TransferEvent::Started { destination: path, .. } = &event {
                        destination = Some(path.clone());
                    }
                    if event.is_terminal() {
                        break event;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Skipped {} transfer events", skipped);
                }
                Err(RecvError::Closed) => bail!("Transfer ended without an outcome"),
            },

            signal = tokio::signal::ctrl_c() => {
                signal?;
                interrupts += 1;
                if interrupts == 1 {
                    if let Some(bar) = &progress {
                        bar.println(format!(
                            "{} Pausing, press Ctrl-C again to cancel",
                            style("⏸").yellow()
                        ));
                    }
                    controller.pause();
                } else {
                    controller.cancel();
                }
            }
        }
    };

    match terminal {
        TransferEvent::Failed { kind } => bail!("Download failed: {}", kind),
        TransferEvent::Succeeded => {
            if let (OutputFormat::Human, Some(path)) = (format, destination) {
                let size = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
                println!("  Saved to: {} ({})", style(path.display()).cyan(), format_bytes(size));
            }
        }
        _ => {}
    }

    Ok(())
}

#[derive(Serialize)]
struct DiscardReport {
    path: PathBuf,
    removed: bool,
}

impl fmt::Display for DiscardReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.removed {
            write!(f, "{} Removed {}", style("✓").green().bold(), self.path.display())
        } else {
            write!(f, "Nothing to remove at {}", self.path.display())
        }
    }
}

pub async fn discard(
    store: &SettingsStore,
    url: &str,
    dir: Option<PathBuf>,
    yes: bool,
    format: OutputFormat,
) -> Result<()> {
    let settings = store.load().await?;
    let dir = dir.unwrap_or(settings.destination_dir);
    let request = TransferRequest::new(url, &dir);

    if !yes && request.destination.exists() {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(format!("Delete {}?", request.destination.display()))
            .default(false)
            .interact()?;
        if !confirmed {
            return Ok(());
        }
    }

    let removed = discard_partial(&request.destination)
        .with_context(|| format!("Failed to remove {}", request.destination.display()))?;

    print_output(
        &DiscardReport {
            path: request.destination,
            removed,
        },
        format,
    )
}

// ============================================================================
// Config Commands
// ============================================================================

pub async fn config_action(
    store: &SettingsStore,
    action: Option<ConfigAction>,
    format: OutputFormat,
) -> Result<()> {
    match action {
        None | Some(ConfigAction::Show) => {
            let settings = store.load().await?;

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&settings)?);
                }
                OutputFormat::Human => {
                    use tabled::{Table, Tabled};

                    #[derive(Tabled)]
                    struct ConfigRow {
                        key: &'static str,
                        value: String,
                    }

                    let rows = vec![
                        ConfigRow {
                            key: "destination_dir",
                            value: settings.destination_dir.display().to_string(),
                        },
                        ConfigRow {
                            key: "chunk_size",
                            value: settings.chunk_size.to_string(),
                        },
                        ConfigRow {
                            key: "user_agent",
                            value: settings.user_agent.clone(),
                        },
                        ConfigRow {
                            key: "connect_timeout_secs",
                            value: settings.connect_timeout_secs.to_string(),
                        },
                        ConfigRow {
                            key: "io_timeout_secs",
                            value: settings.io_timeout_secs.to_string(),
                        },
                        ConfigRow {
                            key: "speed_limit",
                            value: format_speed(settings.speed_limit),
                        },
                    ];

                    println!("Resumer Configuration ({}):", store.path().display());
                    println!("{}", Table::new(rows));
                }
            }
        }

        Some(ConfigAction::Set { key, value }) => {
            let mut settings = store.load().await?;
            apply_setting(&mut settings, &key, &value)?;
            store.save(&settings).await?;
            println!("{} Config updated", style("✓").green().bold());
        }

        Some(ConfigAction::Reset { yes }) => {
            let confirmed = yes
                || dialoguer::Confirm::new()
                    .with_prompt("Reset all settings to defaults?")
                    .default(false)
                    .interact()?;

            if confirmed {
                store.reset().await?;
                println!("{} Settings reset to defaults", style("✓").green().bold());
            }
        }
    }

    Ok(())
}

fn apply_setting(settings: &mut Settings, key: &str, value: &str) -> Result<()> {
    match key {
        "destination_dir" => settings.destination_dir = PathBuf::from(value),
        "chunk_size" => {
            let size: usize = value.parse()?;
            if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&size) {
                bail!(
                    "chunk_size must be between {} and {}",
                    MIN_CHUNK_SIZE,
                    MAX_CHUNK_SIZE
                );
            }
            settings.chunk_size = size;
        }
        "user_agent" => settings.user_agent = value.to_string(),
        "connect_timeout_secs" => settings.connect_timeout_secs = value.parse()?,
        "io_timeout_secs" => settings.io_timeout_secs = value.parse()?,
        "speed_limit" => {
            settings.speed_limit = match value {
                "none" | "unlimited" | "0" => None,
                limit => Some(limit.parse()?),
            }
        }
        _ => return Err(anyhow!("Unknown config key: {}", key)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_setting_parses_known_keys() {
        let mut settings = Settings::default();

        apply_setting(&mut settings, "chunk_size", "4096").unwrap();
        apply_setting(&mut settings, "speed_limit", "2048").unwrap();
        apply_setting(&mut settings, "io_timeout_secs", "0").unwrap();

        assert_eq!(settings.chunk_size, 4096);
        assert_eq!(settings.speed_limit, Some(2048));
        assert_eq!(settings.io_timeout_secs, 0);

        apply_setting(&mut settings, "speed_limit", "none").unwrap();
        assert_eq!(settings.speed_limit, None);
    }

    #[test]
    fn apply_setting_rejects_bad_input() {
        let mut settings = Settings::default();

        assert!(apply_setting(&mut settings, "chunk_size", "12").is_err());
        assert!(apply_setting(&mut settings, "chunk_size", "lots").is_err());
        assert!(apply_setting(&mut settings, "theme", "dark").is_err());
        assert_eq!(settings.chunk_size, Settings::default().chunk_size);
    }
}
