//! Incremental `text/event-stream` parser.
//!
//! Bytes are buffered until a full line is available so multi-byte
//! characters split across network chunks decode correctly.

/// One dispatched server-sent event
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SseEvent {
    pub data_lines: Vec<String>,
    pub id: Option<String>,
    pub retry_ms: Option<u64>,
}

impl SseEvent {
    /// Joined `data:` payload
    pub fn data(&self) -> String {
        self.data_lines.join("\n")
    }

    fn is_empty(&self) -> bool {
        self.data_lines.is_empty() && self.id.is_none() && self.retry_ms.is_none()
    }
}

#[derive(Debug, Default)]
pub struct SseParser {
    pending: Vec<u8>,
    current: SseEvent,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(line.trim_end_matches(['\r', '\n'])) {
                events.push(event);
            }
        }
        events
    }

    /// Flush whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            let line = String::from_utf8_lossy(&rest).into_owned();
            if let Some(event) = self.process_line(line.trim_end_matches('\r')) {
                return Some(event);
            }
        }
        let event = std::mem::take(&mut self.current);
        (!event.is_empty()).then_some(event)
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            let event = std::mem::take(&mut self.current);
            return (!event.is_empty()).then_some(event);
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.current.data_lines.push(value.to_string()),
            "id" => self.current.id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.trim().parse::<u64>() {
                    self.current.retry_ms = Some(ms);
                }
            }
            _ => {}
        }
        None
    }
}
