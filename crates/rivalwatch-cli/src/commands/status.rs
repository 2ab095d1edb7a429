//! `rivalwatch status` — one-shot connection check.

use std::time::Duration;

use owo_colors::OwoColorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use rivalwatch_channel::WebSocketProvider;
use rivalwatch_core::{ConnectionState, RealtimeClient};

use crate::error::CliError;

/// How long to listen for pushed events before summarizing.
const SAMPLE_WINDOW: Duration = Duration::from_secs(2);

#[derive(Tabled)]
struct JobRow {
    #[tabled(rename = "JOB")]
    job_id: String,
    #[tabled(rename = "STATE")]
    state: String,
    #[tabled(rename = "PROGRESS")]
    progress: String,
}

pub async fn handle(client: RealtimeClient<WebSocketProvider>) -> Result<(), CliError> {
    client.connect().await.ok()?;

    // Give the stream a moment to push whatever is in flight.
    tokio::time::sleep(SAMPLE_WINDOW).await;

    let info = client.connection_info();
    let state = match info.state {
        ConnectionState::Connected => "connected".green().to_string(),
        ConnectionState::Error | ConnectionState::Failed => info.state.to_string().red().to_string(),
        _ => info.state.to_string(),
    };

    let scope = client
        .scope()
        .map(ToString::to_string)
        .unwrap_or_else(|| "(none)".into());

    println!("{:<16} {state}", "state");
    println!("{:<16} {scope}", "scope");
    if let Some(at) = info.last_connected_at {
        println!("{:<16} {}", "connected at", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!("{:<16} {}", "recent events", client.history().len());
    if let Some(at) = client.last_event_at() {
        println!("{:<16} {}", "last event", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    let jobs = client.live_job_statuses();
    if !jobs.is_empty() {
        let mut rows: Vec<JobRow> = jobs
            .into_values()
            .map(|job| JobRow {
                job_id: job.job_id,
                state: job.status.to_string(),
                progress: format!("{}%", job.progress),
            })
            .collect();
        rows.sort_by(|a, b| a.job_id.cmp(&b.job_id));

        println!();
        println!("{}", Table::new(rows).with(Style::blank()));
    }

    client.disconnect().await;
    Ok(())
}
