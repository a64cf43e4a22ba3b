//! Open Command - Open one or more boxes as the local identity

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use secretbox::fhe::SigningIdentity;
use secretbox::{SessionError, SessionEvent, SessionSnapshot, SessionState};
use tokio::sync::mpsc;
use tracing::warn;

use super::{build_manager, load_signer, Paths};

/// Open boxes
#[derive(Args)]
pub struct OpenCommand {
    /// Box index to open; repeat to open several in a row
    #[arg(short, long = "box", required = true, num_args = 1..)]
    boxes: Vec<u32>,

    /// Print the final snapshot of each attempt as JSON
    #[arg(long)]
    json: bool,

    /// Print session metrics in Prometheus format when done
    #[arg(long)]
    metrics: bool,
}

impl OpenCommand {
    pub async fn execute(
        self,
        network: &str,
        config_path: Option<PathBuf>,
        data_dir: Option<PathBuf>,
    ) -> anyhow::Result<()> {
        let paths = Paths::resolve(network, config_path, data_dir);
        let config = paths.load_config()?;
        let signer = Arc::new(load_signer(&paths.data_dir)?);
        let identity = signer.address();

        let mut manager = build_manager(&config, &paths.data_dir).await?;
        let printer = if self.json {
            None
        } else {
            let (event_tx, event_rx) = mpsc::channel(64);
            manager = manager.with_events(event_tx);
            Some(tokio::spawn(print_events(event_rx)))
        };

        if let Err(e) = manager.refresh_catalog().await {
            warn!(error = %e, "continuing with unknown catalog");
        }

        let session = manager.session(identity);
        let mut failures = 0usize;

        for (i, index) in self.boxes.iter().copied().enumerate() {
            if i > 0 {
                session.reset();
            }
            match session.open_box(index, signer.clone()).await {
                Ok(()) => {
                    let snapshot = session.snapshot();
                    if snapshot.state != SessionState::Revealed {
                        failures += 1;
                    }
                    report(&snapshot, self.json)?;
                }
                Err(e @ SessionError::InvalidSelection { .. }) => {
                    failures += 1;
                    eprintln!("Box {}: {}", index, e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        if self.metrics {
            print!("{}", manager.metrics().export());
        }

        // closes the event channel so the printer drains and exits
        drop(session);
        drop(manager);
        if let Some(printer) = printer {
            let _ = printer.await;
        }

        if failures > 0 {
            anyhow::bail!("{} of {} attempts did not reveal a reward", failures, self.boxes.len());
        }
        Ok(())
    }
}

fn report(snapshot: &SessionSnapshot, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(snapshot)?);
        return Ok(());
    }

    println!();
    match snapshot.state {
        SessionState::Revealed => {
            println!("Box {} revealed {}", fmt_box(snapshot.selected_box), snapshot.reward.unwrap_or(0));
        }
        _ => {
            let message = snapshot.error_message.as_deref().unwrap_or("Unknown error");
            match snapshot.failed_stage {
                Some(stage) => println!("Box {} failed while {}: {}", fmt_box(snapshot.selected_box), stage, message),
                None => println!("{}", message),
            }
        }
    }
    if let Some(tx) = &snapshot.transaction_ref {
        println!("Transaction:  {}", tx);
    }
    println!("Boxes opened: {}/{}", snapshot.boxes_opened, snapshot.max_opens);
    println!("Total reward: {}", snapshot.total_reward);
    Ok(())
}

fn fmt_box(selected: Option<u32>) -> String {
    selected.map(|i| format!("#{}", i)).unwrap_or_else(|| "-".to_string())
}

async fn print_events(mut rx: mpsc::Receiver<SessionEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            SessionEvent::Transition { to, .. } if to.is_in_flight() => println!("  {}...", to),
            SessionEvent::TransactionSent { tx } => println!("  sent {}", tx),
            _ => {}
        }
    }
}
