//! Incremental decoding of `data:` event lines.
//!
//! The answer endpoint streams newline-delimited lines. Lines of interest
//! look like `data: {"response":"..."}`; everything else is ignored. Network
//! chunks may end anywhere, including inside a line or inside a multi-byte
//! UTF-8 sequence, so the decoder keeps exactly one pending fragment between
//! calls and only decodes lines once their terminator has arrived.

use serde::Deserialize;

/// Prefix marking a line that carries an event payload.
pub const DATA_PREFIX: &str = "data: ";

/// One decoded unit of the answer stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EventFrame {
    /// Incremental answer text carried by this frame, if any.
    #[serde(default)]
    pub response: Option<String>,
}

impl EventFrame {
    /// Frame carrying `text` as its delta.
    #[must_use]
    pub fn delta_of(text: impl Into<String>) -> Self {
        Self {
            response: Some(text.into()),
        }
    }

    /// The non-empty delta carried by this frame.
    #[must_use]
    pub fn delta(&self) -> Option<&str> {
        self.response.as_deref().filter(|text| !text.is_empty())
    }

    /// Consume the frame, returning its non-empty delta.
    #[must_use]
    pub fn into_delta(self) -> Option<String> {
        self.response.filter(|text| !text.is_empty())
    }
}

/// Splits a chunked byte stream into [`EventFrame`]s.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
    /// Leading bytes of `pending` already searched without finding a newline.
    scanned: usize,
}

impl FrameDecoder {
    /// Create a decoder with an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk and iterate over the frames it completes.
    ///
    /// Frames are produced lazily in arrival order. Complete lines left
    /// unread when the iterator is dropped stay buffered and are yielded
    /// by the next call.
    pub fn push<'a>(&'a mut self, chunk: &[u8]) -> Frames<'a> {
        self.pending.extend_from_slice(chunk);
        Frames {
            pending: &mut self.pending,
            scanned: &mut self.scanned,
        }
    }

    /// Number of buffered bytes not yet terminated by a newline.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Signal end of stream, discarding any unterminated fragment.
    ///
    /// Returns the number of bytes dropped.
    pub fn finish(&mut self) -> usize {
        let dropped = self.pending.len();
        if dropped > 0 {
            tracing::debug!(bytes = dropped, "Discarding unterminated trailing line");
        }
        self.pending.clear();
        self.scanned = 0;
        dropped
    }
}

/// Iterator over the frames completed by one [`FrameDecoder::push`].
#[derive(Debug)]
pub struct Frames<'a> {
    pending: &'a mut Vec<u8>,
    scanned: &'a mut usize,
}

impl Iterator for Frames<'_> {
    type Item = EventFrame;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let start = *self.scanned;
            let Some(offset) = self.pending[start..].iter().position(|&b| b == b'\n') else {
                *self.scanned = self.pending.len();
                return None;
            };
            *self.scanned = 0;
            let line: Vec<u8> = self.pending.drain(..=start + offset).collect();
            if let Some(frame) = decode_line(&line) {
                return Some(frame);
            }
        }
    }
}

/// Decode a single complete line. Non-data and malformed lines yield `None`.
fn decode_line(line: &[u8]) -> Option<EventFrame> {
    let text = String::from_utf8_lossy(line);
    let trimmed = text.trim();
    let payload = trimmed.strip_prefix(DATA_PREFIX)?;

    match serde_json::from_str::<EventFrame>(payload) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::warn!(error = %e, line = %trimmed, "Failed to parse stream line");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deltas(decoder: &mut FrameDecoder, chunk: &[u8]) -> Vec<String> {
        decoder.push(chunk).filter_map(EventFrame::into_delta).collect()
    }

    const STREAM: &str = concat!(
        "data: {\"response\":\"Canopy \"}\n",
        "data: {\"response\":\"elements \"}\n",
        "\n",
        "data: {\"response\":\"are reusable ✓ blöcks\"}\n",
        "data: {\"response\":\"elements \"}\n",
    );

    #[test]
    fn partial_line_is_held_until_terminated() {
        let mut decoder = FrameDecoder::new();

        assert!(deltas(&mut decoder, br#"data: {"response":"Hel"#).is_empty());
        assert!(decoder.pending_len() > 0);

        assert_eq!(deltas(&mut decoder, b"lo\"}\n"), vec!["Hello"]);
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn long_line_is_scanned_once() {
        let mut decoder = FrameDecoder::new();
        let line = format!("data: {{\"response\":\"{}\"}}", "x".repeat(4096));

        for b in line.as_bytes() {
            assert!(deltas(&mut decoder, std::slice::from_ref(b)).is_empty());
            assert_eq!(decoder.scanned, decoder.pending_len());
        }

        let got = deltas(&mut decoder, b"\ndata: {\"response\":\"tail");
        assert_eq!(got, vec!["x".repeat(4096)]);
        assert_eq!(decoder.scanned, decoder.pending_len());
        assert_eq!(deltas(&mut decoder, b"\"}\n"), vec!["tail"]);
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn output_is_independent_of_chunk_boundaries() {
        let bytes = STREAM.as_bytes();
        let expected = deltas(&mut FrameDecoder::new(), bytes);
        assert_eq!(
            expected,
            vec!["Canopy ", "elements ", "are reusable ✓ blöcks", "elements "]
        );

        for first in 0..=bytes.len() {
            for second in first..=bytes.len() {
                let mut decoder = FrameDecoder::new();
                let mut got = deltas(&mut decoder, &bytes[..first]);
                got.extend(deltas(&mut decoder, &bytes[first..second]));
                got.extend(deltas(&mut decoder, &bytes[second..]));
                assert_eq!(got, expected, "split at {first}/{second}");
            }
        }
    }

    #[test]
    fn byte_at_a_time_matches_whole_stream() {
        let mut decoder = FrameDecoder::new();
        let got: Vec<String> = STREAM
            .as_bytes()
            .iter()
            .flat_map(|b| deltas(&mut decoder, std::slice::from_ref(b)))
            .collect();
        assert_eq!(got.concat(), "Canopy elements are reusable ✓ blöcks elements ");
    }

    #[test]
    fn malformed_line_does_not_drop_neighbours() {
        let chunk = b"data: {\"response\":\"A\"}\ndata: {not json\ndata: {\"response\":\"B\"}\n";
        assert_eq!(deltas(&mut FrameDecoder::new(), chunk), vec!["A", "B"]);
    }

    #[test]
    fn ignores_lines_without_data_prefix() {
        let chunk = b"event: message\n: keep-alive\nid: 7\nretry: 100\ndata: {\"response\":\"ok\"}\n";
        assert_eq!(deltas(&mut FrameDecoder::new(), chunk), vec!["ok"]);
    }

    #[test]
    fn multiple_frames_keep_arrival_order() {
        let chunk = b"data: {\"response\":\"1\"}\ndata: {\"response\":\"2\"}\ndata: {\"response\":\"3\"}\n";
        assert_eq!(deltas(&mut FrameDecoder::new(), chunk), vec!["1", "2", "3"]);
    }

    #[test]
    fn empty_chunk_is_noop() {
        let mut decoder = FrameDecoder::new();
        assert!(deltas(&mut decoder, b"").is_empty());
        assert_eq!(decoder.pending_len(), 0);

        assert!(deltas(&mut decoder, b"data: {\"resp").is_empty());
        let held = decoder.pending_len();
        assert!(deltas(&mut decoder, b"").is_empty());
        assert_eq!(decoder.pending_len(), held);
    }

    #[test]
    fn trailing_fragment_is_discarded_on_finish() {
        let mut decoder = FrameDecoder::new();
        let got = deltas(&mut decoder, b"data: {\"response\":\"kept\"}\ndata: {\"response\":\"lost\"}");
        assert_eq!(got, vec!["kept"]);

        let dropped = decoder.finish();
        assert_eq!(dropped, "data: {\"response\":\"lost\"}".len());
        assert_eq!(decoder.pending_len(), 0);
        assert!(deltas(&mut decoder, b"").is_empty());
    }

    #[test]
    fn crlf_terminators_are_accepted() {
        let chunk = b"data: {\"response\":\"a\"}\r\ndata: {\"response\":\"b\"}\r\n";
        assert_eq!(deltas(&mut FrameDecoder::new(), chunk), vec!["a", "b"]);
    }

    #[test]
    fn frames_without_delta_are_still_frames() {
        let frames: Vec<EventFrame> = FrameDecoder::new()
            .push(b"data: {}\ndata: {\"response\":\"\"}\ndata: {\"response\":null,\"extra\":1}\n")
            .collect();
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.delta().is_none()));
    }

    #[test]
    fn repeated_deltas_are_not_deduplicated() {
        let chunk = b"data: {\"response\":\"ha\"}\ndata: {\"response\":\"ha\"}\n";
        assert_eq!(deltas(&mut FrameDecoder::new(), chunk), vec!["ha", "ha"]);
    }

    #[test]
    fn unread_lines_survive_until_next_push() {
        let mut decoder = FrameDecoder::new();
        {
            let mut frames =
                decoder.push(b"data: {\"response\":\"x\"}\ndata: {\"response\":\"y\"}\n");
            assert_eq!(frames.next(), Some(EventFrame::delta_of("x")));
        }
        assert_eq!(deltas(&mut decoder, b"data: {\"response\":\"z\"}\n"), vec!["y", "z"]);
    }
}
