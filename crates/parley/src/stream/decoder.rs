use serde::Deserialize;

/// Prefix marking an event line in the wire format.
pub const EVENT_PREFIX: &str = "data: ";

/// Literal payload signalling end of stream, distinct from any content.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One decoded protocol unit from the streaming body.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A role-tagged text fragment. Either field may be absent: providers
    /// send a role-only delta first and an empty delta with the finish
    /// reason last.
    Delta {
        role: Option<String>,
        content: Option<String>,
    },
    /// The terminal marker.
    Done,
}

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    role: Option<String>,
    content: Option<String>,
}

/// Incremental decoder for the line-delimited event stream.
///
/// Bytes are buffered until a complete line is available, so chunks may end
/// mid-line or mid-character without losing data: a line feed byte never
/// occurs inside a multi-byte UTF-8 sequence, which makes the byte-level
/// split safe at any chunk boundary. Lines that don't carry the event
/// prefix (blank keep-alives included) and payloads that fail to parse are
/// skipped without ending the stream.
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        SseDecoder {
            buffer: Vec::new(),
            done: false,
        }
    }

    /// Decode every complete frame in `buffer + chunk`, in arrival order.
    /// Any trailing partial line is retained for the next call. Once the
    /// terminal frame has been emitted, further input is ignored.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        if self.done {
            return frames;
        }
        self.buffer.extend_from_slice(chunk);

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(frame) = decode_line(&line[..line.len() - 1]) {
                let terminal = frame == Frame::Done;
                frames.push(frame);
                if terminal {
                    self.done = true;
                    break;
                }
            }
        }
        frames
    }

    /// Whether the terminal marker has been observed.
    pub fn is_done(&self) -> bool {
        self.done
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_line(line: &[u8]) -> Option<Frame> {
    // A line that isn't valid UTF-8 can't be a well-formed event; skip it.
    let line = std::str::from_utf8(line).ok()?;
    let line = line.strip_suffix('\r').unwrap_or(line);
    let payload = line.strip_prefix(EVENT_PREFIX)?;

    if payload == DONE_SENTINEL {
        return Some(Frame::Done);
    }

    // Malformed payloads are dropped; one bad frame must not kill the stream.
    let parsed: ChunkPayload = serde_json::from_str(payload).ok()?;
    let delta = parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.delta)
        .unwrap_or_default();

    Some(Frame::Delta {
        role: delta.role,
        content: delta.content,
    })
}
