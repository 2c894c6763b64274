//! Server bridge
//!
//! WebSocket link to the decision server: receives command frames,
//! executes them strictly one at a time, reports completion per
//! command and a status heartbeat once per interval. The link
//! reconnects with a fixed delay; command execution never overlaps a
//! reconnect because the receive loop owns the controller for the
//! lifetime of a connection.

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use deskpilot_core::command::Command;
use deskpilot_core::config::AgentConfig;
use deskpilot_core::controller::EditorController;
use deskpilot_core::protocol::{classify, Inbound, Outbound};

pub struct Bridge {
    config: Arc<AgentConfig>,
    controller: Arc<EditorController>,
    /// Lecture paused flag, toggled by server events and echoed in
    /// status reports. Does not preempt a running command.
    paused: Arc<AtomicBool>,
}

impl Bridge {
    pub fn new(config: Arc<AgentConfig>, controller: Arc<EditorController>) -> Self {
        Self {
            config,
            controller,
            paused: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Connect and serve until the server goes away for good (or
    /// reconnection is disabled/exhausted).
    pub async fn run(&self) -> Result<()> {
        let mut attempts: u32 = 0;
        loop {
            match self.serve_connection().await {
                Ok(()) => {
                    info!("server closed the connection");
                }
                Err(e) => {
                    warn!("connection error: {}", e);
                }
            }

            let reconnect = &self.config.reconnect;
            if !reconnect.enabled {
                return Ok(());
            }
            attempts += 1;
            if reconnect.max_attempts > 0 && attempts >= reconnect.max_attempts {
                anyhow::bail!(
                    "giving up after {} reconnect attempts",
                    reconnect.max_attempts
                );
            }
            info!(
                "reconnecting in {}s (attempt {})",
                reconnect.delay_secs, attempts
            );
            tokio::time::sleep(Duration::from_secs(reconnect.delay_secs)).await;
        }
    }

    /// One connection lifetime: hello, heartbeat, sequential command
    /// processing.
    async fn serve_connection(&self) -> Result<()> {
        let url = &self.config.server_url;
        let (ws, _) = connect_async(url)
            .await
            .with_context(|| format!("connecting to {}", url))?;
        info!("connected to {}", url);

        let (mut ws_sender, mut ws_receiver) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

        // Single writer task owns the sink; everything else sends
        // through the channel.
        let send_task = tokio::spawn(async move {
            while let Some(outbound) = rx.recv().await {
                let frame = Message::Text(outbound.to_json().into());
                if ws_sender.send(frame).await.is_err() {
                    break;
                }
            }
        });

        let _ = tx.send(Outbound::hello());

        let status_task = {
            let tx = tx.clone();
            let controller = self.controller.clone();
            let paused = self.paused.clone();
            let interval = Duration::from_secs(self.config.status_report_interval_secs.max(1));
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(interval).await;
                    let status = controller.status();
                    if tx
                        .send(Outbound::local_status(status, paused.load(Ordering::SeqCst)))
                        .is_err()
                    {
                        break;
                    }
                }
            })
        };

        while let Some(frame) = ws_receiver.next().await {
            let frame = frame.context("reading server frame")?;
            if let Message::Text(text) = frame {
                self.handle_frame(text.as_str(), &tx).await;
            }
        }

        status_task.abort();
        drop(tx);
        let _ = send_task.await;
        Ok(())
    }

    async fn handle_frame(&self, raw: &str, tx: &mpsc::UnboundedSender<Outbound>) {
        let Some(inbound) = classify(raw) else {
            debug!("ignoring non-JSON frame");
            return;
        };
        match inbound {
            Inbound::EditorCommand(payload) => {
                let command = match Command::parse(&payload) {
                    Ok(command) => command,
                    Err(e) => {
                        // The server awaits a result per command; a
                        // rejected frame still gets an acknowledgment
                        // or the server waits forever.
                        warn!("rejected command frame: {}", e);
                        let id = payload.get("id").and_then(serde_json::Value::as_str);
                        let _ = tx.send(Outbound::task_rejected(id, &e.to_string()));
                        return;
                    }
                };
                // Awaited inline: the next frame is not read until this
                // command finishes, which is what keeps execution
                // strictly sequential.
                let result = self.controller.execute(&command).await;
                info!(
                    "{}: {}",
                    if result.success { "done" } else { "failed" },
                    result.message
                );
                let _ = tx.send(Outbound::task_complete(&result, command.id.as_deref()));
            }
            Inbound::LecturePause { reason } => {
                info!("lecture paused ({})", reason.as_deref().unwrap_or("no reason"));
                self.paused.store(true, Ordering::SeqCst);
            }
            Inbound::LectureResume => {
                info!("lecture resumed");
                self.paused.store(false, Ordering::SeqCst);
            }
            Inbound::Other { event } => {
                debug!("ignoring event '{}'", event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskpilot_core::input::SystemInputBackend;
    use deskpilot_core::keymap::Keymap;
    use deskpilot_core::window::SystemWindowBackend;
    use serde_json::{json, Value};

    // Frames on the parse-error and lecture-control paths never touch
    // the OS backends, so the system implementations are safe here.
    fn bridge() -> Bridge {
        let config = Arc::new(AgentConfig::default());
        let controller = Arc::new(EditorController::new(
            config.clone(),
            Arc::new(Keymap::default()),
            Arc::new(SystemWindowBackend::new()),
            Arc::new(SystemInputBackend::new()),
        ));
        Bridge::new(config, controller)
    }

    #[tokio::test]
    async fn test_rejected_frame_still_acknowledged() {
        let b = bridge();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let frame = json!({
            "type": "editor_sync",
            "command": {"type": "resize_window", "payload": {}, "id": "cmd-3"}
        });
        b.handle_frame(&frame.to_string(), &tx).await;

        let ack: Value = serde_json::from_str(&rx.recv().await.unwrap().to_json()).unwrap();
        assert_eq!(ack["type"], "task_complete");
        assert_eq!(ack["status"], "failed");
        assert_eq!(ack["command_id"], "cmd-3");
        assert!(ack["message"].as_str().unwrap().contains("resize_window"));
    }

    #[tokio::test]
    async fn test_rejected_frame_without_id_reports_unknown() {
        let b = bridge();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let frame = json!({"type": "hotkey", "payload": {"keys": "not-a-list"}});
        b.handle_frame(&frame.to_string(), &tx).await;

        let ack: Value = serde_json::from_str(&rx.recv().await.unwrap().to_json()).unwrap();
        assert_eq!(ack["status"], "failed");
        assert_eq!(ack["command_id"], "unknown");
    }

    #[tokio::test]
    async fn test_lecture_events_toggle_paused_without_ack() {
        let b = bridge();
        let (tx, mut rx) = mpsc::unbounded_channel();

        b.handle_frame(&json!({"type": "lecture_pause"}).to_string(), &tx)
            .await;
        assert!(b.paused.load(Ordering::SeqCst));
        b.handle_frame(&json!({"type": "lecture_resume"}).to_string(), &tx)
            .await;
        assert!(!b.paused.load(Ordering::SeqCst));
        assert!(rx.try_recv().is_err());
    }
}
