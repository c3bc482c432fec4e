use super::logging::emit_stream_parse_error;
use crate::types::StreamEvent;

/// Splits an NDJSON byte stream into [`StreamEvent`]s, buffering partial lines
/// across chunks. Malformed lines are logged and dropped.
#[derive(Default)]
pub struct StreamParser {
    buffer: Vec<u8>,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        let mut start = 0;

        // Split on raw bytes so a multi-byte character cut across chunks is
        // only decoded once its line is complete.
        while let Some(offset) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let line_end = start + offset;
            if let Some(event) = parse_line(&self.buffer[start..line_end]) {
                events.push(event);
            }
            start = line_end + 1;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }

        events
    }

    /// Parses whatever is left once the stream has closed; servers are not
    /// required to terminate the last event with a newline.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest)
    }
}

fn parse_line(raw: &[u8]) -> Option<StreamEvent> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    // Tolerate SSE-style framing from proxies that wrap each line.
    let json = line.strip_prefix("data:").map(str::trim).unwrap_or(line);
    if json == "[DONE]" {
        return None;
    }

    match serde_json::from_str::<StreamEvent>(json) {
        Ok(event) => Some(event),
        Err(error) => {
            tracing::warn!(%error, line_len = json.len(), "dropping malformed stream line");
            emit_stream_parse_error(json, &error);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_lines_and_done_marker_are_skipped() {
        let mut parser = StreamParser::new();
        let events = parser.process(b"\n\r\ndata: [DONE]\n");
        assert!(events.is_empty());
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let mut parser = StreamParser::new();
        let line = "{\"type\":\"message-chunk\",\"id\":\"m\",\"content\":\"caf\u{e9}\"}\n";
        let bytes = line.as_bytes();
        let split = line.find('\u{e9}').unwrap() + 1;

        assert!(parser.process(&bytes[..split]).is_empty());
        let events = parser.process(&bytes[split..]);
        match &events[..] {
            [StreamEvent::MessageChunk(chunk)] => {
                assert_eq!(chunk.content.as_deref(), Some("caf\u{e9}"))
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }
}
