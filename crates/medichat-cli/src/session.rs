use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use console::style;
use medichat::accumulator::Accumulator;
use medichat::models::attachment::Attachment;
use medichat::models::conversation::Conversation;
use medichat::store::FileStore;

use crate::client::RelayClient;

/// How many restored turns to replay on screen before the prompt.
const RECAP_TURNS: usize = 4;
const RECAP_WIDTH: usize = 60;

pub struct Session {
    client: RelayClient,
    accumulator: Accumulator,
}

impl Session {
    pub fn new(server: &str, store_path: PathBuf) -> Result<Self> {
        let store = FileStore::open(store_path)?;
        Ok(Session {
            client: RelayClient::new(server)?,
            accumulator: Accumulator::new(Box::new(store)),
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        cliclack::intro(style(" medichat ").on_cyan().black())?;

        match self.accumulator.restore() {
            Ok(0) => {}
            Ok(interrupted) => {
                let _ = cliclack::log::warning(format!(
                    "{interrupted} unfinished reply(ies) from the last session marked as failed"
                ));
            }
            Err(error) => {
                // Keep going with an empty transcript; the stored record is
                // left in place untouched.
                let _ = cliclack::log::warning(format!("Could not restore saved history: {error}"));
            }
        }
        render_recap(self.accumulator.conversation());

        let _ = cliclack::log::info(format!(
            "Type {} to attach an image, {} to leave",
            style("attach:<path> <message>").cyan(),
            style("exit").cyan()
        ));

        loop {
            let line: String = cliclack::input("Message:").placeholder("").interact()?;
            let line = line.trim();

            if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
                break;
            }

            let (attach_path, text) = split_attach_directive(line);
            let attachment = match attach_path {
                Some(path) => match load_attachment(Path::new(path)) {
                    Ok(attachment) => Some(attachment),
                    Err(error) => {
                        let _ = cliclack::log::warning(format!("{error:#}"));
                        continue;
                    }
                },
                None => None,
            };

            if text.is_empty() && attachment.is_none() {
                continue;
            }

            self.run_turn(text, attachment).await?;
        }

        let _ = cliclack::outro(format!(
            "{} questions asked, {} replies completed",
            self.accumulator.questions_asked(),
            self.accumulator.replies_completed()
        ));
        Ok(())
    }

    /// One question/reply round trip. Relay and stream failures mark the turn
    /// failed and return Ok so the loop continues; only a dead store is fatal.
    async fn run_turn(&mut self, text: &str, attachment: Option<Attachment>) -> Result<()> {
        let handle = self.accumulator.submit(text, attachment)?;

        let spin = cliclack::spinner();
        spin.start("awaiting reply");

        let outbound = self.accumulator.conversation().sendable();
        let mut reply = match self.client.send(&outbound).await {
            Ok(reply) => reply,
            Err(error) => {
                spin.stop("");
                self.accumulator.fail(handle)?;
                let _ = cliclack::log::warning(format!("{error:#}"));
                return Ok(());
            }
        };
        spin.stop("");

        loop {
            match reply.next_chunk().await {
                Ok(Some(fragment)) => {
                    print!("{fragment}");
                    io::stdout().flush().expect("Failed to flush stdout");
                    if let Err(error) = self.accumulator.apply_chunk(handle, &fragment) {
                        let _ = cliclack::log::warning(format!(
                            "Failed to persist reply progress: {error}"
                        ));
                    }
                }
                Ok(None) => {
                    self.accumulator.finish(handle)?;
                    break;
                }
                Err(error) => {
                    println!();
                    self.accumulator.fail(handle)?;
                    let _ = cliclack::log::warning(format!(
                        "Reply interrupted, partial answer kept: {error:#}"
                    ));
                    break;
                }
            }
        }
        println!("\n");
        Ok(())
    }
}

/// Forget the saved conversation and reset the usage counters.
pub fn clear(store_path: PathBuf) -> Result<()> {
    let store = FileStore::open(store_path)?;
    let mut accumulator = Accumulator::new(Box::new(store));
    accumulator.clear()?;
    accumulator.reset_counters()?;
    println!("Conversation history cleared.");
    Ok(())
}

fn render_recap(conversation: &Conversation) {
    if conversation.is_empty() {
        return;
    }
    println!(
        "{}",
        style(format!(
            "Resuming a saved conversation ({} messages)",
            conversation.len()
        ))
        .dim()
    );
    let skip = conversation.len().saturating_sub(RECAP_TURNS);
    for message in conversation.messages().iter().skip(skip) {
        let speaker = if message.role.is_user() {
            style("you").cyan()
        } else {
            style("허리인사이드").green()
        };
        let mut line = message.content.lines().next().unwrap_or("").to_string();
        if line.chars().count() > RECAP_WIDTH {
            line = line.chars().take(RECAP_WIDTH).collect::<String>() + "…";
        }
        if message.status.is_errored() {
            println!("{speaker}: {line} {}", style("(interrupted)").dim());
        } else {
            println!("{speaker}: {line}");
        }
    }
    println!();
}

/// Split an `attach:<path>` prefix off an input line. The path runs to the
/// first whitespace; the rest is the message text.
fn split_attach_directive(line: &str) -> (Option<&str>, &str) {
    let Some(rest) = line.strip_prefix("attach:") else {
        return (None, line);
    };
    match rest.split_once(char::is_whitespace) {
        Some((path, text)) => (Some(path), text.trim()),
        None => (Some(rest), ""),
    }
}

fn load_attachment(path: &Path) -> Result<Attachment> {
    let mime_type = path
        .extension()
        .and_then(|extension| extension.to_str())
        .and_then(mime_for_extension)
        .with_context(|| format!("Cannot tell the image type of {}", path.display()))?;
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Attachment::new(mime_type, BASE64.encode(bytes)))
}

fn mime_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_directive_splits_path_and_text() {
        assert_eq!(
            split_attach_directive("attach:/tmp/xray.png 여기가 아파요"),
            (Some("/tmp/xray.png"), "여기가 아파요")
        );
        assert_eq!(
            split_attach_directive("attach:scan.jpeg"),
            (Some("scan.jpeg"), "")
        );
        assert_eq!(
            split_attach_directive("그냥 질문입니다"),
            (None, "그냥 질문입니다")
        );
    }

    #[test]
    fn image_types_come_from_the_extension() {
        assert_eq!(mime_for_extension("JPG"), Some("image/jpeg"));
        assert_eq!(mime_for_extension("png"), Some("image/png"));
        assert_eq!(mime_for_extension("pdf"), None);
    }

    #[test]
    fn attachments_read_as_base64() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"hello").unwrap();

        let attachment = load_attachment(&path).unwrap();
        assert_eq!(attachment.mime_type, "image/png");
        assert_eq!(attachment.data, "aGVsbG8=");
    }

    #[test]
    fn unknown_extension_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hi").unwrap();

        assert!(load_attachment(&path).is_err());
    }
}
