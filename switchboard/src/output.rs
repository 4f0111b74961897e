//! Envelope output on stdout, one JSON document per line

use async_trait::async_trait;
use serde::Serialize;
use switchboard_core::Message;
use switchboard_gateway::{Envelope, ResponseSink};
use tokio::io::{AsyncWriteExt, Stdout};

pub struct StdoutSink {
    out: Stdout,
    failures: usize,
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl StdoutSink {
    pub fn new() -> Self {
        Self {
            out: tokio::io::stdout(),
            failures: 0,
        }
    }

    /// Failed frames written so far
    pub const fn failures(&self) -> usize {
        self.failures
    }

    pub async fn write<T: Serialize + Send + Sync>(&mut self, envelope: &Envelope<T>) -> anyhow::Result<()> {
        if !envelope.is_success() {
            self.failures += 1;
        }
        let mut line = serde_json::to_vec(envelope)?;
        line.push(b'\n');
        self.out.write_all(&line).await?;
        self.out.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl ResponseSink for StdoutSink {
    async fn send(&mut self, frame: Envelope<Message>) -> anyhow::Result<()> {
        self.write(&frame).await
    }
}
