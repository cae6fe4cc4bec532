//! Channel-backed message sources and sinks.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use super::{InboundMessage, MessageSource, OutboundMessage, ResponseSink, SendError};

/// Transport-side ends of an in-memory connection.
#[derive(Debug)]
pub struct TransportEnd {
    /// Feeds the dispatcher's [`ChannelSource`].
    pub inbound: mpsc::UnboundedSender<InboundMessage>,
    /// Drains the dispatcher's [`ChannelSink`].
    pub outbound: mpsc::UnboundedReceiver<OutboundMessage>,
}

/// Build an in-memory connection: the transport keeps the [`TransportEnd`],
/// the dispatcher gets the source and sink.
pub fn channel_pair() -> (TransportEnd, ChannelSource, ChannelSink) {
    let (inbound, source) = inbound_pair();
    let (sink, outbound) = outbound_pair();
    (TransportEnd { inbound, outbound }, source, sink)
}

pub(crate) fn inbound_pair() -> (mpsc::UnboundedSender<InboundMessage>, ChannelSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, ChannelSource { rx })
}

pub(crate) fn outbound_pair() -> (ChannelSink, mpsc::UnboundedReceiver<OutboundMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelSink { tx }, rx)
}

/// [`MessageSource`] reading from an mpsc channel.
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<InboundMessage>,
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn receive(&mut self) -> Option<InboundMessage> {
        self.rx.recv().await
    }
}

/// [`ResponseSink`] writing into an mpsc channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

#[async_trait]
impl ResponseSink for ChannelSink {
    async fn send_raw(&mut self, message: OutboundMessage) -> Result<(), SendError> {
        self.tx.send(message).map_err(|_| SendError::Closed)
    }
}

/// Replays an already-read body, then defers to the original source.
///
/// The first `receive` yields the whole body as a single final chunk.
pub struct ReplaySource<'a> {
    body: Option<Bytes>,
    inner: &'a mut dyn MessageSource,
}

impl<'a> ReplaySource<'a> {
    pub fn new(body: Bytes, inner: &'a mut dyn MessageSource) -> Self {
        Self {
            body: Some(body),
            inner,
        }
    }
}

#[async_trait]
impl MessageSource for ReplaySource<'_> {
    async fn receive(&mut self) -> Option<InboundMessage> {
        match self.body.take() {
            Some(body) => Some(InboundMessage::Request {
                body,
                more_body: false,
            }),
            None => self.inner.receive().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replay_yields_body_then_inner() {
        let (tx, mut inner) = inbound_pair();
        tx.send(InboundMessage::Disconnect).unwrap();

        let mut replay = ReplaySource::new(Bytes::from("payload"), &mut inner);
        assert_eq!(
            replay.receive().await,
            Some(InboundMessage::Request {
                body: Bytes::from("payload"),
                more_body: false
            })
        );
        assert_eq!(replay.receive().await, Some(InboundMessage::Disconnect));
    }

    #[tokio::test]
    async fn closed_sink_reports_closed() {
        let (mut sink, rx) = outbound_pair();
        drop(rx);
        let result = sink.send_raw(OutboundMessage::StartupComplete).await;
        assert!(matches!(result, Err(SendError::Closed)));
    }
}
