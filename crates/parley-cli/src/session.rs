use anyhow::Result;
use base64::Engine;
use console::style;
use std::path::Path;
use std::sync::{Arc, Mutex};

use parley::models::conversation::Conversation;
use parley::models::message::{AssetRef, Role};
use parley::orchestrator::{ChatOrchestrator, ConversationPublisher, SendOutcome};

/// Prints assistant text as it streams in. The orchestrator republishes the
/// whole conversation after every increment, so this tracks what has
/// already been written and emits only the new suffix.
pub struct ConsolePublisher {
    printed: Mutex<(String, usize)>,
}

impl ConsolePublisher {
    pub fn new() -> Self {
        Self {
            printed: Mutex::new((String::new(), 0)),
        }
    }
}

impl ConversationPublisher for ConsolePublisher {
    fn publish(&self, conversation: &Conversation) {
        let Some(message) = conversation.messages.last() else {
            return;
        };
        if message.role != Role::Assistant {
            return;
        }

        let mut printed = self.printed.lock().unwrap();
        if printed.0 != message.id {
            *printed = (message.id.clone(), 0);
            print!("{} ", style("assistant:").green().bold());
        }
        if message.content.len() < printed.1 {
            // The working placeholder was replaced wholesale; reprint.
            print!("\n{}", message.content);
            printed.1 = message.content.len();
        } else {
            print!("{}", &message.content[printed.1..]);
            printed.1 = message.content.len();
        }
        use std::io::Write;
        let _ = std::io::stdout().flush();
    }
}

pub struct Session {
    orchestrator: Arc<ChatOrchestrator>,
}

impl Session {
    pub fn new(orchestrator: Arc<ChatOrchestrator>) -> Self {
        Session { orchestrator }
    }

    pub async fn start(&mut self) -> Result<()> {
        println!(
            "{}",
            style("Type a message, `/attach <path> <text>` to include an image, or `exit`.").dim()
        );

        loop {
            let line: String = cliclack::input("you:").interact()?;
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            if line == "exit" || line == "quit" {
                break;
            }

            let (text, asset) = match split_attachment(&line) {
                Ok(parsed) => parsed,
                Err(e) => {
                    eprintln!("{}", style(format!("Could not attach: {e}")).red());
                    continue;
                }
            };

            let outcome = self.send_with_interrupt(&text, asset).await;
            println!();
            match outcome {
                SendOutcome::Completed => {}
                SendOutcome::Errored(message) => {
                    eprintln!("{}", style(message).red());
                }
                SendOutcome::Cancelled => {
                    println!("{}", style("(interrupted)").dim());
                }
                SendOutcome::Busy => {
                    println!("{}", style("(a reply is already in flight)").dim());
                }
            }
        }
        Ok(())
    }

    /// Drive one turn, turning ctrl-c into stream cancellation rather than
    /// process exit.
    async fn send_with_interrupt(&self, text: &str, asset: Option<AssetRef>) -> SendOutcome {
        let send = self.orchestrator.send_message(text, asset);
        tokio::pin!(send);

        loop {
            tokio::select! {
                outcome = &mut send => break outcome,
                _ = tokio::signal::ctrl_c() => {
                    self.orchestrator.cancel();
                }
            }
        }
    }
}

/// `/attach <path> <text…>` pulls a local image into the turn.
fn split_attachment(line: &str) -> Result<(String, Option<AssetRef>)> {
    let Some(rest) = line.strip_prefix("/attach ") else {
        return Ok((line.to_string(), None));
    };
    let mut parts = rest.splitn(2, ' ');
    let path = parts.next().unwrap_or_default();
    let text = parts.next().unwrap_or("").trim().to_string();

    let bytes = std::fs::read(path)?;
    let mime_type = mime_for(path);
    let asset = AssetRef::new(
        base64::engine::general_purpose::STANDARD.encode(bytes),
        mime_type,
    );
    Ok((text, Some(asset)))
}

fn mime_for(path: &str) -> String {
    match Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg".to_string(),
        Some("webp") => "image/webp".to_string(),
        Some("gif") => "image/gif".to_string(),
        _ => "image/png".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_line_has_no_asset() {
        let (text, asset) = split_attachment("hello there").unwrap();
        assert_eq!(text, "hello there");
        assert!(asset.is_none());
    }

    #[test]
    fn test_attach_reads_file_and_keeps_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pic.jpg");
        std::fs::write(&path, [0xffu8, 0xd8]).unwrap();

        let line = format!("/attach {} remove the background", path.display());
        let (text, asset) = split_attachment(&line).unwrap();
        assert_eq!(text, "remove the background");
        let asset = asset.unwrap();
        assert_eq!(asset.mime_type, "image/jpeg");
        assert_eq!(
            base64::engine::general_purpose::STANDARD
                .decode(asset.data)
                .unwrap(),
            vec![0xff, 0xd8]
        );
    }

    #[test]
    fn test_attach_missing_file_errors() {
        assert!(split_attachment("/attach /no/such/file.png hi").is_err());
    }
}
