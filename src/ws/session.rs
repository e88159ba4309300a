//! Hub session state machine.
//!
//! Pure and transport-agnostic: the caller feeds transport events in and
//! gets back frames to write and blocks to reduce. The real socket lives in
//! [`crate::ws::client`].

use crate::block::RawBlock;
use crate::ws::frame::{encode_frame, FrameDecoder};
use crate::ws::message::{parse_inbound, HandshakeRequest, Inbound, Invocation};
use crate::ws::WsError;
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    Handshaking,
    Subscribing,
    Streaming,
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Connecting => "connecting",
            Phase::Handshaking => "handshaking",
            Phase::Subscribing => "subscribing",
            Phase::Streaming => "streaming",
            Phase::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Output of one session step, in the order it must be acted on.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Framed text to write to the transport.
    Send(String),
    /// Newest block of a `blocks` update.
    Block(RawBlock),
    /// The session ended; no further events will be produced.
    Closed { reason: Option<String> },
}

#[derive(Debug)]
pub struct Session {
    phase: Phase,
    decoder: FrameDecoder,
    frames: u64,
    dropped: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            phase: Phase::Connecting,
            decoder: FrameDecoder::new(),
            frames: 0,
            dropped: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_connected(&self) -> bool {
        matches!(
            self.phase,
            Phase::Handshaking | Phase::Subscribing | Phase::Streaming
        )
    }

    /// Frames decoded so far, and how many of them were dropped as malformed.
    pub fn frame_counts(&self) -> (u64, u64) {
        (self.frames, self.dropped)
    }

    /// Transport is up: start the handshake.
    pub fn on_open(&mut self) -> Result<Vec<SessionEvent>, WsError> {
        if self.phase != Phase::Connecting {
            warn!(phase = %self.phase, "transport opened twice, ignoring");
            return Ok(Vec::new());
        }
        let frame = encode_frame(&HandshakeRequest::default())?;
        self.phase = Phase::Handshaking;
        debug!("handshake sent");
        Ok(vec![SessionEvent::Send(frame)])
    }

    /// The subscription invocation has been handed to the transport.
    pub fn on_sent(&mut self) {
        if self.phase == Phase::Subscribing {
            self.phase = Phase::Streaming;
            info!("subscribed to blocks");
        }
    }

    /// Feed one chunk of inbound text.
    pub fn on_text(&mut self, chunk: &str) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        if self.phase == Phase::Closed {
            return out;
        }
        for frame in self.decoder.push(chunk) {
            self.handle_frame(&frame, &mut out);
            if self.phase == Phase::Closed {
                break;
            }
        }
        out
    }

    /// Transport closed or failed. Terminal.
    pub fn on_close(&mut self, reason: Option<String>) -> Vec<SessionEvent> {
        if self.phase == Phase::Closed {
            return Vec::new();
        }
        self.close(reason)
    }

    fn close(&mut self, reason: Option<String>) -> Vec<SessionEvent> {
        self.phase = Phase::Closed;
        let pending = self.decoder.pending();
        if pending > 0 {
            debug!(bytes = pending, "discarding partial frame");
        }
        self.decoder.clear();
        info!(reason = ?reason, "session closed");
        vec![SessionEvent::Closed { reason }]
    }

    fn handle_frame(&mut self, frame: &str, out: &mut Vec<SessionEvent>) {
        self.frames += 1;

        let inbound = match parse_inbound(frame) {
            Ok(inbound) => inbound,
            Err(e) => {
                self.dropped += 1;
                warn!(error = %e, len = frame.len(), "dropping malformed frame");
                return;
            }
        };

        match (self.phase, inbound) {
            (Phase::Handshaking, Inbound::HandshakeAck { error: Some(error) }) => {
                warn!(error = %error, "handshake rejected");
                out.extend(self.close(Some(format!("handshake rejected: {error}"))));
            }
            (Phase::Handshaking, Inbound::HandshakeAck { error: None }) => {
                match encode_frame(&Invocation::subscribe_blocks()) {
                    Ok(frame) => {
                        self.phase = Phase::Subscribing;
                        out.push(SessionEvent::Send(frame));
                    }
                    Err(e) => out.extend(self.close(Some(format!("encode subscription: {e}")))),
                }
            }
            (_, Inbound::KeepAlive) => {}
            (_, Inbound::Close { error }) => {
                out.extend(self.close(error.or_else(|| Some("hub closed the session".to_string()))));
            }
            (Phase::Subscribing | Phase::Streaming, Inbound::BlockUpdate { block }) => {
                if let Some(block) = block {
                    out.push(SessionEvent::Block(block));
                }
            }
            (phase, other) => {
                debug!(phase = %phase, message = ?other, "ignoring message");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::frame::RECORD_SEPARATOR;

    fn sent(events: &[SessionEvent]) -> Vec<serde_json::Value> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Send(frame) => {
                    assert!(frame.ends_with(RECORD_SEPARATOR));
                    Some(serde_json::from_str(frame.trim_end_matches(RECORD_SEPARATOR)).unwrap())
                }
                _ => None,
            })
            .collect()
    }

    fn blocks(events: &[SessionEvent]) -> Vec<i64> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Block(b) => Some(b.level),
                _ => None,
            })
            .collect()
    }

    fn block_frame(level: i64) -> String {
        format!(
            "{{\"type\":1,\"target\":\"blocks\",\"arguments\":[{{\"type\":1,\"state\":{level},\"data\":[{{\"level\":{level},\"lbToggleEma\":10,\"proposer\":{{\"address\":\"tz1\"}}}}]}}]}}\u{1e}"
        )
    }

    fn streaming() -> Session {
        let mut session = Session::new();
        session.on_open().unwrap();
        session.on_text("{}\u{1e}");
        session.on_sent();
        session
    }

    #[test]
    fn test_handshake_then_subscribe() {
        let mut session = Session::new();
        assert_eq!(session.phase(), Phase::Connecting);
        assert!(!session.is_connected());

        let events = session.on_open().unwrap();
        assert_eq!(sent(&events), vec![serde_json::json!({"protocol": "json", "version": 1})]);
        assert_eq!(session.phase(), Phase::Handshaking);

        let events = session.on_text("{}\u{1e}");
        assert_eq!(
            sent(&events),
            vec![serde_json::json!({"type": 1, "target": "SubscribeToBlocks", "arguments": []})]
        );
        assert_eq!(session.phase(), Phase::Subscribing);

        session.on_sent();
        assert_eq!(session.phase(), Phase::Streaming);
        assert!(session.is_connected());
    }

    #[test]
    fn test_block_before_handshake_ignored() {
        let mut session = Session::new();
        session.on_open().unwrap();
        assert!(session.on_text(&block_frame(5)).is_empty());
    }

    #[test]
    fn test_keepalive_has_no_effect() {
        let mut session = streaming();
        assert!(session.on_text("{\"type\":6}\u{1e}").is_empty());
        assert_eq!(session.phase(), Phase::Streaming);
    }

    #[test]
    fn test_blocks_accepted_while_subscribing() {
        let mut session = Session::new();
        session.on_open().unwrap();
        session.on_text("{}\u{1e}");
        assert_eq!(blocks(&session.on_text(&block_frame(7))), vec![7]);
    }

    #[test]
    fn test_malformed_frame_does_not_stop_chunk() {
        let mut session = streaming();
        assert_eq!(session.frame_counts(), (1, 0));
        let chunk = format!("{{broken\u{1e}{}{}", block_frame(8), block_frame(9));
        let events = session.on_text(&chunk);
        assert_eq!(blocks(&events), vec![8, 9]);
        assert_eq!(session.frame_counts(), (4, 1));
        assert_eq!(session.phase(), Phase::Streaming);
    }

    #[test]
    fn test_block_split_across_chunks() {
        let mut session = streaming();
        let frame = block_frame(12);
        let (a, b) = frame.split_at(20);
        assert!(session.on_text(a).is_empty());
        assert_eq!(blocks(&session.on_text(b)), vec![12]);
    }

    #[test]
    fn test_close_is_terminal() {
        let mut session = streaming();
        let events = session.on_close(Some("eof".to_string()));
        assert!(matches!(events.as_slice(), [SessionEvent::Closed { .. }]));
        assert_eq!(session.phase(), Phase::Closed);
        assert!(session.on_text(&block_frame(13)).is_empty());
        assert!(session.on_close(None).is_empty());
    }

    #[test]
    fn test_close_discards_partial_frame() {
        let mut session = streaming();
        let frame = block_frame(15);
        assert!(session.on_text(&frame[..20]).is_empty());
        assert_eq!(session.decoder.pending(), 20);
        session.on_close(None);
        assert_eq!(session.decoder.pending(), 0);
        assert!(session.on_text(&frame[20..]).is_empty());
    }

    #[test]
    fn test_hub_close_message() {
        let mut session = streaming();
        let chunk = format!("{{\"type\":7,\"error\":\"shutdown\"}}\u{1e}{}", block_frame(14));
        let events = session.on_text(&chunk);
        assert!(blocks(&events).is_empty());
        assert!(matches!(
            events.as_slice(),
            [SessionEvent::Closed { reason: Some(r) }] if r == "shutdown"
        ));
    }

    #[test]
    fn test_handshake_rejected() {
        let mut session = Session::new();
        session.on_open().unwrap();
        let events = session.on_text("{\"error\":\"nope\"}\u{1e}");
        assert!(matches!(events.as_slice(), [SessionEvent::Closed { .. }]));
        assert_eq!(session.phase(), Phase::Closed);
    }
}
