//! Channel-backed output sink

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::OutputSink;
use super::wire::WireFormat;
use crate::error::{ParleyError, Result};

/// Frames relay signals and pushes them into a bounded channel.
///
/// The receiving half is drained by the response body. Once it is dropped
/// every send fails with [`ParleyError::ClientDisconnected`].
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<String>,
    format: WireFormat,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<String>, format: WireFormat) -> Self {
        Self { tx, format }
    }

    /// Create a sink together with the receiver its frames arrive on.
    pub fn channel(format: WireFormat, capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx, format), rx)
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    async fn send(&self, frame: String) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| ParleyError::ClientDisconnected)
    }
}

#[async_trait]
impl OutputSink for ChannelSink {
    async fn chunk(&mut self, fragment: &str) -> Result<()> {
        self.send(self.format.frame_chunk(fragment)).await
    }

    async fn error(&mut self, message: &str) -> Result<()> {
        self.send(self.format.frame_error(message)).await
    }

    async fn end(&mut self) -> Result<()> {
        match self.format.frame_end() {
            Some(frame) => self.send(frame).await,
            None => Ok(()),
        }
    }
}
