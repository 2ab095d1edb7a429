//! `rivalwatch tail` — stream events to stdout until interrupted.

use owo_colors::OwoColorize;
use tokio::sync::broadcast::error::RecvError;

use rivalwatch_channel::WebSocketProvider;
use rivalwatch_core::{
    AlertSeverity, ConnectionState, Event, EventPayload, RealtimeClient,
};

use crate::cli::TailArgs;
use crate::error::CliError;

pub async fn handle(
    client: RealtimeClient<WebSocketProvider>,
    args: TailArgs,
) -> Result<(), CliError> {
    // Subscribe before connecting so nothing delivered during the
    // first settle is missed.
    let mut events = client.subscribe_events();
    let mut conn = client.connection();

    client.connect().await.ok()?;
    conn.mark_unchanged();
    eprintln!(
        "{} {}",
        "connected".green(),
        client
            .scope()
            .map(ToString::to_string)
            .unwrap_or_default()
            .dimmed()
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            changed = conn.changed() => {
                if changed.is_err() {
                    break;
                }
                let info = conn.borrow_and_update().clone();
                match info.state {
                    ConnectionState::Failed => {
                        client.disconnect().await;
                        return Err(CliError::ConnectionFailed {
                            reason: "reconnection limit reached".into(),
                        });
                    }
                    ConnectionState::Error => {
                        eprintln!("{} stream interrupted, reconnecting", "!".yellow());
                    }
                    ConnectionState::Connected if info.reconnect_attempts == 0 => {
                        eprintln!("{}", "reconnected".green());
                    }
                    _ => {}
                }
            }

            received = events.recv() => match received {
                Ok(event) => {
                    if !args.kind.is_empty() && !args.kind.contains(&event.kind()) {
                        continue;
                    }
                    print_event(&event, args.json)?;
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "event consumer lagged, events skipped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    client.disconnect().await;
    Ok(())
}

fn print_event(event: &Event, json: bool) -> Result<(), CliError> {
    if json {
        let line = serde_json::to_string(event)
            .map_err(|e| CliError::Internal(format!("failed to serialize event: {e}")))?;
        println!("{line}");
        return Ok(());
    }

    let stamp = event.received_at.format("%H:%M:%S");
    match &event.payload {
        EventPayload::Alert(alert) => {
            let severity = match alert.severity {
                AlertSeverity::Critical => "CRITICAL".red().bold().to_string(),
                AlertSeverity::High => "HIGH".red().to_string(),
                AlertSeverity::Warning => "WARN".yellow().to_string(),
                AlertSeverity::Info => "INFO".cyan().to_string(),
            };
            println!("{} {severity} {}", stamp.dimmed(), alert.title);
            if let Some(ref description) = alert.description {
                println!("           {}", description.dimmed());
            }
        }
        EventPayload::AnalysisUpdate(progress) => {
            println!(
                "{} {} {} {}%",
                stamp.dimmed(),
                "analysis".blue(),
                progress.job_id,
                progress.progress
            );
        }
        EventPayload::AnalysisComplete(outcome) => {
            let verdict = if outcome.success {
                "done".green().to_string()
            } else {
                "failed".red().to_string()
            };
            println!("{} {} {} {verdict}", stamp.dimmed(), "analysis".blue(), outcome.job_id);
        }
        EventPayload::MetricsUpdate(snapshot) => {
            println!(
                "{} {} {}",
                stamp.dimmed(),
                "metrics".magenta(),
                snapshot.competitor_id.as_deref().unwrap_or("-")
            );
        }
        EventPayload::ConnectionState(notice) => {
            println!(
                "{} {} {}",
                stamp.dimmed(),
                "stream".yellow(),
                notice.message.as_deref().unwrap_or(&notice.status)
            );
        }
    }
    Ok(())
}
