//! Transport double collecting streamed envelopes

use async_trait::async_trait;
use switchboard_core::Message;
use switchboard_gateway::{Envelope, ResponseSink};

#[derive(Default)]
pub struct Frames(pub Vec<Envelope<Message>>);

impl Frames {
    pub fn codes(&self) -> Vec<u16> {
        self.0.iter().map(|f| f.code).collect()
    }

    /// Text of every successful frame
    pub fn texts(&self) -> Vec<String> {
        self.0
            .iter()
            .filter_map(|f| f.data.as_ref())
            .map(|m| m.text().unwrap_or_default())
            .collect()
    }
}

#[async_trait]
impl ResponseSink for Frames {
    async fn send(&mut self, frame: Envelope<Message>) -> anyhow::Result<()> {
        self.0.push(frame);
        Ok(())
    }
}
