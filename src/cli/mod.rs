//! Interactive chat REPL and one-shot prompt runner.
//!
//! The REPL prints each completed turn rather than rendering deltas live;
//! a turn is done when the session returns from `send_message`, so the
//! transcript suffix past the last printed index is exactly the new
//! output.

use std::io::Write as _;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::session::{SessionError, ThreadSession};
use crate::threads::ThreadRegistry;
use crate::transcript::{Message, Role, Segment};

const HELP: &str = "\
Commands:
  /threads          list known threads
  /new [topic]      start a new thread (and switch to it)
  /open <id>        switch to an existing thread
  /help             show this help
  /quit             exit
Anything else is sent to the assistant.";

/// Render one message for the terminal.
fn render(message: &Message) -> String {
    let who = match message.role {
        Role::User => "you",
        Role::Assistant => "chef",
        Role::Code => "code",
    };
    let mut body = String::new();
    for segment in &message.segments {
        match segment {
            Segment::Text { value } => body.push_str(value),
            Segment::Image { file_id } => {
                body.push_str(&format!("[image {file_id}]"));
            }
        }
    }
    format!("{who}> {body}")
}

/// Print every transcript message at index `from` or later, returning the
/// new high-water mark.
fn print_new_messages(session: &ThreadSession, from: usize) -> usize {
    let messages = session.transcript().messages();
    for message in &messages[from.min(messages.len())..] {
        // The user's own line was already echoed by the terminal.
        if message.role != Role::User {
            println!("{}", render(message));
        }
    }
    messages.len()
}

/// Send one message and print the assistant's turn.
async fn send_and_print(session: &mut ThreadSession, text: &str, printed: &mut usize) {
    // Count the user message we are about to push as already printed.
    *printed = session.transcript().len() + 1;
    match session.send_message(text).await {
        Ok(()) => {
            *printed = print_new_messages(session, *printed);
        }
        Err(SessionError::RunInProgress) => {
            eprintln!("A run is still in progress; wait for it to finish.");
        }
        Err(e) => {
            eprintln!("Run failed: {e}");
            *printed = print_new_messages(session, *printed);
        }
    }
}

async fn open_new_thread(
    session: &mut ThreadSession,
    registry: &ThreadRegistry,
    topic: Option<&str>,
) -> anyhow::Result<String> {
    let new = registry.create_thread(topic).await?;
    if let Some(e) = &new.stub_write_failed {
        warn!(error = %e, "Thread will not appear in /threads listings");
        eprintln!("Note: thread created but not registered locally ({e}).");
    }
    session.select_thread(&new.thread.id).await?;
    Ok(new.thread.id)
}

/// Run a single prompt and exit, on a fresh thread unless one is already
/// selected. Unlike the REPL, a failed run is propagated so the process
/// exits nonzero.
pub async fn run_single_prompt(
    mut session: ThreadSession,
    registry: ThreadRegistry,
    prompt: &str,
) -> anyhow::Result<()> {
    if session.thread_id().is_none() {
        open_new_thread(&mut session, &registry, None).await?;
    }
    let printed = session.transcript().len() + 1;
    session.send_message(prompt).await?;
    print_new_messages(&session, printed);
    Ok(())
}

/// The interactive REPL.
pub async fn run_interactive(
    mut session: ThreadSession,
    registry: ThreadRegistry,
) -> anyhow::Result<()> {
    println!("souschef {} (/help for commands)", env!("CARGO_PKG_VERSION"));
    let mut printed = 0;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("you> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit", _) | ("/exit", _) => break,
            ("/help", _) => println!("{HELP}"),
            ("/threads", _) => match registry.list_threads().await {
                Ok(threads) if threads.is_empty() => println!("No threads yet."),
                Ok(threads) => {
                    for thread in threads {
                        let topic = thread.topic.as_deref().unwrap_or("(no topic)");
                        let marker = if Some(thread.id.as_str()) == session.thread_id() {
                            "*"
                        } else {
                            " "
                        };
                        println!("{marker} {}  {topic}", thread.id);
                    }
                }
                Err(e) => eprintln!("Could not list threads: {e}"),
            },
            ("/new", rest) => {
                let topic = (!rest.trim().is_empty()).then(|| rest.trim());
                match open_new_thread(&mut session, &registry, topic).await {
                    Ok(id) => {
                        printed = 0;
                        println!("Switched to new thread {id}.");
                    }
                    Err(e) => eprintln!("Could not create thread: {e}"),
                }
            }
            ("/open", rest) if !rest.trim().is_empty() => {
                match session.select_thread(rest.trim()).await {
                    Ok(()) => {
                        println!("Switched to {}.", rest.trim());
                        // Replay what the thread already holds.
                        printed = print_new_messages(&session, 0);
                    }
                    Err(e) => eprintln!("Could not open thread: {e}"),
                }
            }
            _ if line.starts_with('/') => {
                eprintln!("Unknown command: {line} (/help for commands)");
            }
            _ => {
                if session.thread_id().is_none() {
                    match open_new_thread(&mut session, &registry, None).await {
                        Ok(id) => println!("Started thread {id}."),
                        Err(e) => {
                            eprintln!("Could not create thread: {e}");
                            continue;
                        }
                    }
                }
                send_and_print(&mut session, line, &mut printed).await;
                if let Some(thread_id) = session.thread_id() {
                    if let Err(e) = registry.touch(thread_id).await {
                        warn!(error = %e, "Failed to stamp thread");
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::protocol::RunEvent;
    use crate::runs::{RunConfig, ScriptItem, ScriptedRunService};
    use crate::store::MemoryRecordStore;
    use crate::tools::{ToolCallCoordinator, ToolRegistry};
    use crate::transcript::Message;

    fn session_and_registry(
        scripts: Vec<Vec<ScriptItem>>,
    ) -> (ThreadSession, ThreadRegistry) {
        let service = Arc::new(ScriptedRunService::new(scripts));
        let session = ThreadSession::new(
            service.clone(),
            ToolCallCoordinator::new(Arc::new(ToolRegistry::new())),
            RunConfig {
                assistant_id: "asst_test".to_string(),
            },
        );
        let registry = ThreadRegistry::new(service, Arc::new(MemoryRecordStore::new()));
        (session, registry)
    }

    #[tokio::test]
    async fn single_prompt_succeeds_on_completed_run() {
        let (session, registry) = session_and_registry(vec![vec![
            ScriptItem::Event(RunEvent::TextCreated),
            ScriptItem::Event(RunEvent::TextDelta {
                value: "Added milk.".to_string(),
                annotations: vec![],
            }),
            ScriptItem::Event(RunEvent::Completed),
        ]]);
        assert!(run_single_prompt(session, registry, "add milk").await.is_ok());
    }

    #[tokio::test]
    async fn single_prompt_propagates_run_failure() {
        let (session, registry) = session_and_registry(vec![vec![
            ScriptItem::Event(RunEvent::TextCreated),
            ScriptItem::Error("connection reset".to_string()),
        ]]);
        let err = run_single_prompt(session, registry, "add milk")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn render_labels_roles() {
        let msg = Message::with_text(Role::Assistant, "Added milk.");
        assert_eq!(render(&msg), "chef> Added milk.");
        let msg = Message::with_text(Role::Code, "print(1)");
        assert_eq!(render(&msg), "code> print(1)");
    }

    #[test]
    fn render_inlines_image_segments() {
        let mut msg = Message::with_text(Role::Assistant, "Here you go: ");
        msg.segments.push(Segment::Image {
            file_id: "file_1".to_string(),
        });
        assert_eq!(render(&msg), "chef> Here you go: [image file_1]");
    }
}
