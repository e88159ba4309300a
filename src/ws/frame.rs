//! Record-separator framing used by the TzKT hub.
//!
//! Every JSON document on the wire is terminated by ASCII 0x1E. A single
//! WebSocket text message may carry several documents, and a document may
//! in principle straddle two messages, so inbound text goes through a
//! buffering [`FrameDecoder`].

use serde::Serialize;

pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Split a chunk on the record separator, dropping empty fragments.
pub fn split_frames(chunk: &str) -> impl Iterator<Item = &str> {
    chunk.split(RECORD_SEPARATOR).filter(|f| !f.is_empty())
}

/// Serialize `msg` as JSON followed by exactly one record separator.
pub fn encode_frame<T: Serialize>(msg: &T) -> Result<String, serde_json::Error> {
    let mut frame = serde_json::to_string(msg)?;
    frame.push(RECORD_SEPARATOR);
    Ok(frame)
}

/// Accumulates inbound text and yields complete frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: String,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns every frame completed by it. Text after the
    /// last separator stays buffered for the next call.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.buf.push_str(chunk);

        let Some(end) = self.buf.rfind(RECORD_SEPARATOR) else {
            return Vec::new();
        };

        let rest = self.buf.split_off(end + RECORD_SEPARATOR.len_utf8());
        let complete = std::mem::replace(&mut self.buf, rest);
        split_frames(&complete).map(str::to_string).collect()
    }

    /// Bytes buffered waiting for a separator.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_discards_empty_fragments() {
        let frames: Vec<&str> = split_frames("\u{1e}{}\u{1e}\u{1e}{\"type\":6}\u{1e}").collect();
        assert_eq!(frames, vec!["{}", "{\"type\":6}"]);
        assert_eq!(split_frames("").count(), 0);
    }

    #[test]
    fn test_encode_appends_one_separator() {
        let frame = encode_frame(&serde_json::json!({"protocol": "json", "version": 1})).unwrap();
        assert!(frame.ends_with(RECORD_SEPARATOR));
        assert_eq!(frame.matches(RECORD_SEPARATOR).count(), 1);
        let body: serde_json::Value = serde_json::from_str(frame.trim_end_matches(RECORD_SEPARATOR)).unwrap();
        assert_eq!(body["protocol"], "json");
    }

    #[test]
    fn test_decoder_whole_frames() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push("{}\u{1e}{\"type\":6}\u{1e}");
        assert_eq!(frames, vec!["{}".to_string(), "{\"type\":6}".to_string()]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_decoder_split_frame() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push("{\"type\":1,\"tar").is_empty());
        assert!(decoder.pending() > 0);
        let frames = decoder.push("get\":\"blocks\"}\u{1e}{\"ty");
        assert_eq!(frames, vec!["{\"type\":1,\"target\":\"blocks\"}".to_string()]);
        let frames = decoder.push("pe\":6}\u{1e}");
        assert_eq!(frames, vec!["{\"type\":6}".to_string()]);
        assert_eq!(decoder.pending(), 0);
    }
}
