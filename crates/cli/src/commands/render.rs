//! Terminal rendering of stream events.

use std::io::{self, Write};

use agentloop_core::stream::StreamEvent;
use serde_json::Value;

/// Writes events as they arrive: text inline, tool activity on its own lines.
#[derive(Debug, Default)]
pub struct Renderer {
    mid_line: bool,
    saw_text: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, event: &StreamEvent, out: &mut impl Write) -> io::Result<()> {
        match event {
            StreamEvent::ContentChunk { text } => {
                write!(out, "{text}")?;
                self.mid_line = !text.ends_with('\n');
                self.saw_text = true;
            }
            StreamEvent::ToolCall { name, id, arguments } => {
                self.end_line(out)?;
                writeln!(out, "  [tool] {name}({arguments}) #{id}")?;
            }
            StreamEvent::ToolResult { name, result, .. } => {
                self.end_line(out)?;
                writeln!(out, "  [result] {name} -> {}", display_value(result))?;
            }
            StreamEvent::Error { message } => {
                self.end_line(out)?;
                writeln!(out, "  [error] {message}")?;
            }
            StreamEvent::Done { final_content } => {
                if !self.saw_text {
                    if let Some(content) = final_content {
                        write!(out, "{content}")?;
                        self.mid_line = true;
                    }
                }
                self.end_line(out)?;
            }
        }
        out.flush()
    }

    fn end_line(&mut self, out: &mut impl Write) -> io::Result<()> {
        if self.mid_line {
            writeln!(out)?;
            self.mid_line = false;
        }
        Ok(())
    }
}

/// Strings print bare; anything else as compact JSON.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
