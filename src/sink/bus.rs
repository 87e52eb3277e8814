use crate::core::{PublishError, Result, Sink};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Channel-backed bus producer: each publish becomes one `(key, value)`
/// message on the channel.
pub struct BusSink {
    sender: mpsc::Sender<(String, String)>,
}

impl BusSink {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<(String, String)>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { sender: tx }, rx)
    }
}

#[async_trait]
impl Sink for BusSink {
    async fn publish(&mut self, key: &str, value: &str) -> Result<()> {
        self.sender
            .send((key.to_string(), value.to_string()))
            .await
            .map_err(|_| {
                PublishError {
                    reason: "bus receiver dropped".to_string(),
                }
                .into()
            })
    }
}
