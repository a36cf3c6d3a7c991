//! Log-tail ingestor
//!
//! Opens a follow-mode log stream per expected agent pod and parses each line
//! as a JSON event onto a bounded fan-in channel. Agents may print
//! non-structured text between events; those lines are dropped silently.

use crate::types::Event;
use futures::{AsyncBufReadExt, TryStreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::api::LogParams;
use kube::{Api, Client};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Fan-in capacity for parsed events
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Capacity for stream-level errors
const ERROR_CHANNEL_CAPACITY: usize = 10;

pub struct LogWatcher {
    client: Client,
    namespace: String,
    event_tx: mpsc::Sender<Event>,
    error_tx: mpsc::Sender<String>,
    tasks: JoinSet<()>,
}

impl LogWatcher {
    /// Build a watcher plus the receiving ends of its fan-in channels
    pub fn new(
        client: Client,
        namespace: &str,
    ) -> (Self, mpsc::Receiver<Event>, mpsc::Receiver<String>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (error_tx, error_rx) = mpsc::channel(ERROR_CHANNEL_CAPACITY);

        let watcher = Self {
            client,
            namespace: namespace.to_string(),
            event_tx,
            error_tx,
            tasks: JoinSet::new(),
        };
        (watcher, event_rx, error_rx)
    }

    /// Start a streamer task tailing one pod's stdout
    pub fn watch_pod(&mut self, cancel: CancellationToken, pod_name: String) {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);
        let event_tx = self.event_tx.clone();
        let error_tx = self.error_tx.clone();

        self.tasks
            .spawn(stream_pod_logs(cancel, api, pod_name, event_tx, error_tx));
    }

    /// Wait for every streamer to exit, then let the channels close by
    /// dropping the last senders.
    pub async fn close(mut self) {
        while self.tasks.join_next().await.is_some() {}
    }
}

async fn stream_pod_logs(
    cancel: CancellationToken,
    api: Api<Pod>,
    pod_name: String,
    event_tx: mpsc::Sender<Event>,
    error_tx: mpsc::Sender<String>,
) {
    let params = LogParams {
        follow: true,
        ..Default::default()
    };

    let stream = tokio::select! {
        _ = cancel.cancelled() => return,
        stream = api.log_stream(&pod_name, &params) => stream,
    };

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            send_or_cancel(
                &error_tx,
                format!("failed to stream logs from pod {pod_name}: {e}"),
                &cancel,
            )
            .await;
            return;
        }
    };

    let mut lines = stream.lines();

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => return,
            line = lines.try_next() => line,
        };

        match line {
            Ok(Some(line)) => {
                let Ok(event) = serde_json::from_str::<Event>(&line) else {
                    continue;
                };

                // Never block shutdown on a full fan-in channel
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    send = event_tx.send(event) => {
                        if send.is_err() {
                            return;
                        }
                    }
                }
            }
            Ok(None) => return,
            Err(e) => {
                send_or_cancel(
                    &error_tx,
                    format!("error reading logs from pod {pod_name}: {e}"),
                    &cancel,
                )
                .await;
                return;
            }
        }
    }
}

async fn send_or_cancel(tx: &mpsc::Sender<String>, message: String, cancel: &CancellationToken) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tx.send(message) => {}
    }
}
