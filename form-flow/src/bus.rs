//! Typed channel between a host and its form.
//!
//! Each side holds a [`Port`]; neither holds a reference to the other.
//! Messages cross as [`WireEvent`]s so both sides go through the same codec
//! a separately deployed peer would use.

use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{FormError, Result};
use crate::protocol::{Message, WireEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Host,
    Form,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Host => write!(f, "host"),
            Side::Form => write!(f, "form"),
        }
    }
}

pub struct Port {
    side: Side,
    outbound: mpsc::UnboundedSender<WireEvent>,
    inbound: mpsc::UnboundedReceiver<WireEvent>,
}

/// Create a connected (host, form) port pair.
pub fn channel() -> (Port, Port) {
    let (to_form, from_host) = mpsc::unbounded_channel();
    let (to_host, from_form) = mpsc::unbounded_channel();
    let host = Port {
        side: Side::Host,
        outbound: to_form,
        inbound: from_form,
    };
    let form = Port {
        side: Side::Form,
        outbound: to_host,
        inbound: from_host,
    };
    (host, form)
}

impl Port {
    pub fn side(&self) -> Side {
        self.side
    }

    pub fn send(&self, message: &Message) -> Result<()> {
        self.send_wire(message.to_wire()?)
    }

    /// Send an already encoded event, e.g. one relayed from another peer.
    pub fn send_wire(&self, wire: WireEvent) -> Result<()> {
        debug!(side = %self.side, event = %wire.event, "sending event");
        self.outbound
            .send(wire)
            .map_err(|_| FormError::ChannelClosed)
    }

    /// Next decodable message, or `None` once the peer is gone. Events that
    /// fail to decode are logged and skipped.
    pub async fn recv(&mut self) -> Option<Message> {
        loop {
            let wire = self.inbound.recv().await?;
            let event = wire.event.clone();
            match Message::from_wire(wire) {
                Ok(Some(message)) => {
                    debug!(side = %self.side, event = %event, "received event");
                    return Some(message);
                }
                Ok(None) => {
                    warn!(side = %self.side, event = %event, "payload matches no known shape; ignoring");
                }
                Err(e) => {
                    warn!(side = %self.side, event = %event, error = %e, "undecodable event; ignoring");
                }
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{
        FORM_SUBMIT, Feature, InsuranceType, ResultMessage, StartMessage, SubmitMessage,
    };
    use serde_json::json;

    #[tokio::test]
    async fn messages_cross_in_both_directions() {
        let (mut host, mut form) = channel();
        let start = Message::Start(StartMessage::new("LPC001", Feature::Quote, InsuranceType::Life));
        host.send(&start).unwrap();
        assert_eq!(form.recv().await, Some(start));

        form.send(&Message::Result(ResultMessage::failure("nope"))).unwrap();
        assert_eq!(
            host.recv().await,
            Some(Message::Result(ResultMessage::failure("nope")))
        );
    }

    #[tokio::test]
    async fn misshapen_events_are_skipped() {
        let (host, mut form) = channel();
        host.send_wire(WireEvent {
            event: FORM_SUBMIT.to_string(),
            detail: json!({ "unexpected": true }),
        })
        .unwrap();
        host.send_wire(WireEvent {
            event: "form:unknown".to_string(),
            detail: json!({}),
        })
        .unwrap();
        host.send(&Message::Submit(SubmitMessage::Loading(true))).unwrap();

        assert_eq!(
            form.recv().await,
            Some(Message::Submit(SubmitMessage::Loading(true)))
        );
    }

    #[tokio::test]
    async fn recv_ends_when_peer_is_dropped() {
        let (host, mut form) = channel();
        drop(host);
        assert_eq!(form.recv().await, None);
        assert!(form.is_closed());
        assert!(matches!(
            form.send(&Message::Submit(SubmitMessage::Loading(false))),
            Err(FormError::ChannelClosed)
        ));
    }
}
