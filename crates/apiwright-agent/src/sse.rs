// ABOUTME: Incremental server-sent-events parser for run streams.
// ABOUTME: Accepts arbitrary byte chunks and yields complete (event, data) frames.

/// One complete SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    /// Feed a chunk and collect every frame it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>, String> {
        let mut frames = Vec::new();
        for byte in chunk {
            if *byte == b'\n' {
                let line = std::mem::take(&mut self.buffer);
                self.process_line(&line, &mut frames)?;
            } else {
                self.buffer.push(*byte);
            }
        }
        Ok(frames)
    }

    /// Flush whatever is buffered once the body has ended.
    pub fn finish(mut self) -> Result<Vec<SseFrame>, String> {
        let mut frames = Vec::new();
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.process_line(&line, &mut frames)?;
        }
        self.flush(&mut frames);
        Ok(frames)
    }

    fn process_line(&mut self, raw: &[u8], frames: &mut Vec<SseFrame>) -> Result<(), String> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        if raw.is_empty() {
            self.flush(frames);
            return Ok(());
        }
        if raw.starts_with(b":") {
            return Ok(());
        }

        let (field, value) = match raw.iter().position(|b| *b == b':') {
            Some(i) => (&raw[..i], &raw[i + 1..]),
            None => (raw, &[][..]),
        };
        let value = value.strip_prefix(b" ").unwrap_or(value);
        let value = std::str::from_utf8(value)
            .map_err(|e| format!("invalid UTF-8 in SSE line: {e}"))?;

        match field {
            b"event" => self.event = Some(value.to_string()),
            b"data" => self.data.push(value.to_string()),
            _ => {}
        }
        Ok(())
    }

    fn flush(&mut self, frames: &mut Vec<SseFrame>) {
        if self.data.is_empty() {
            self.event = None;
            return;
        }
        frames.push(SseFrame {
            event: self.event.take(),
            data: self.data.join("\n"),
        });
        self.data.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_split_across_chunks() {
        let mut parser = SseParser::default();
        let mut frames = parser.push(b"event: thread.message.delta\nda").unwrap();
        assert!(frames.is_empty());
        frames.extend(parser.push(b"ta: {\"a\":1}\r\n\r\nevent: done\ndata: [DONE]\n").unwrap());
        frames.extend(parser.finish().unwrap());

        assert_eq!(
            frames,
            vec![
                SseFrame {
                    event: Some("thread.message.delta".to_string()),
                    data: "{\"a\":1}".to_string(),
                },
                SseFrame {
                    event: Some("done".to_string()),
                    data: "[DONE]".to_string(),
                },
            ]
        );
    }

    #[test]
    fn comments_and_dataless_events_are_dropped() {
        let mut parser = SseParser::default();
        let frames = parser.push(b": keepalive\n\nevent: ping\n\ndata: x\n\n").unwrap();
        assert_eq!(
            frames,
            vec![SseFrame {
                event: None,
                data: "x".to_string()
            }]
        );
    }
}
