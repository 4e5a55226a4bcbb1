use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// JSONL diagnostics for a composition run: one event per skipped
/// fragment, decode failure, or page break, plus named counters drained
/// into a summary line at the end of the run.
#[derive(Clone)]
pub(crate) struct DebugLogger {
    inner: Arc<Mutex<DebugState>>,
}

struct DebugState {
    writer: BufWriter<File>,
    counters: HashMap<String, u64>,
}

impl DebugLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(DebugState {
                writer: BufWriter::new(file),
                counters: HashMap::new(),
            })),
        })
    }

    pub fn event(&self, kind: &str, detail: &str) {
        let json = format!(
            "{{\"type\":\"{}\",\"detail\":\"{}\"}}",
            json_escape(kind),
            json_escape(detail)
        );
        self.log_json(&json);
    }

    pub fn page_break(&self, from_page: usize, to_page: usize, reason: &str) {
        let json = format!(
            "{{\"type\":\"compose.page_break\",\"reason\":\"{}\",\"from_page\":{},\"to_page\":{}}}",
            json_escape(reason),
            from_page,
            to_page
        );
        self.log_json(&json);
        self.increment("compose.page_break", 1);
    }

    pub fn log_json(&self, json: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn increment(&self, key: &str, amount: u64) {
        if let Ok(mut state) = self.inner.lock() {
            let entry = state.counters.entry(key.to_string()).or_insert(0);
            *entry = entry.saturating_add(amount);
        }
    }

    pub fn emit_summary(&self, context: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let mut counters: Vec<(String, u64)> = state.counters.drain().collect();
            counters.sort_by(|a, b| a.0.cmp(&b.0));
            let counts_json = if counters.is_empty() {
                "{}".to_string()
            } else {
                let mut out = String::from("{");
                for (idx, (key, value)) in counters.iter().enumerate() {
                    if idx > 0 {
                        out.push(',');
                    }
                    out.push_str(&format!("\"{}\":{}", json_escape(key), value));
                }
                out.push('}');
                out
            };
            let json = format!(
                "{{\"type\":\"debug.summary\",\"context\":\"{}\",\"counts\":{}}}",
                json_escape(context),
                counts_json
            );
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

pub(crate) fn json_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_log_path(tag: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!(
            "pagepress_{tag}_{}_{}.jsonl",
            std::process::id(),
            nanos
        ))
    }

    #[test]
    fn events_and_summary_are_written_as_jsonl() {
        let path = temp_log_path("events");
        let logger = DebugLogger::new(&path).expect("logger");
        logger.event("compose.skip", "selector #missing matched nothing");
        logger.page_break(1, 2, "element_overflow");
        logger.increment("compose.skip", 1);
        logger.emit_summary("compose");
        logger.flush();

        let contents = std::fs::read_to_string(&path).expect("log contents");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("\"type\":\"compose.skip\""));
        assert!(lines[1].contains("\"reason\":\"element_overflow\""));
        assert!(lines[2].contains("\"compose.page_break\":1"));
        assert!(lines[2].contains("\"compose.skip\":1"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn json_escape_handles_quotes_and_newlines() {
        assert_eq!(json_escape("a\"b\nc"), "a\\\"b\\nc");
    }
}
