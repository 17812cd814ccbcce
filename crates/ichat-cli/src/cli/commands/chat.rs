//! Interactive chat loop.

use std::future::Future;
use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use ichat_core::client::ChatClient;
use ichat_core::interrupt;
use ichat_core::session::{ChatSession, ExchangeOutcome, ResponseMode};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::cli::AppContext;
use crate::render::TranscriptRenderer;

const QUIT_COMMANDS: [&str; 2] = ["/quit", "/exit"];

/// What the prompt produced.
#[derive(Debug, PartialEq, Eq)]
enum PromptInput {
    Line(String),
    Eof,
    Interrupted,
}

/// Reads stdin on a plain thread so the prompt can be raced against Ctrl+C.
/// The thread stops at EOF, on a read error, or once the receiver is gone.
fn spawn_stdin_reader() -> UnboundedReceiver<io::Result<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::spawn(move || read_lines(io::stdin().lock(), &tx));
    rx
}

fn read_lines(mut input: impl BufRead, tx: &UnboundedSender<io::Result<String>>) {
    loop {
        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) => return,
            Ok(_) => {
                if tx.send(Ok(line)).is_err() {
                    return;
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e));
                return;
            }
        }
    }
}

/// Waits for the next line, EOF, or `cancel`, whichever comes first.
async fn next_input<C>(
    lines: &mut UnboundedReceiver<io::Result<String>>,
    cancel: C,
) -> io::Result<PromptInput>
where
    C: Future<Output = ()>,
{
    tokio::select! {
        line = lines.recv() => match line {
            Some(line) => line.map(PromptInput::Line),
            None => Ok(PromptInput::Eof),
        },
        () = cancel => Ok(PromptInput::Interrupted),
    }
}

pub async fn run(ctx: &AppContext, mode: ResponseMode) -> Result<()> {
    let client = ChatClient::new(ctx.client.clone(), Arc::clone(&ctx.tokens))?;
    let mut session = ChatSession::new(client, mode);

    let interactive = io::stdin().is_terminal();
    let mut renderer = TranscriptRenderer::new(ctx.client.base_url.clone());
    if interactive {
        // The typed line is already on screen.
        renderer = renderer.without_user_echo();
    }

    if session.transcript().is_empty() {
        renderer.welcome();
    }

    let mut lines = spawn_stdin_reader();

    loop {
        if interactive {
            print!("> ");
            io::stdout().flush().context("flush stdout")?;
        }

        interrupt::reset();
        let line = match next_input(&mut lines, interrupt::wait_for_interrupt())
            .await
            .context("read input")?
        {
            PromptInput::Line(line) => line,
            // Ctrl+C at an idle prompt leaves the chat.
            PromptInput::Eof | PromptInput::Interrupted => {
                if interactive {
                    println!();
                }
                break;
            }
        };

        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if QUIT_COMMANDS.contains(&text) {
            break;
        }

        let outcome = exchange(&mut session, &mut renderer, text).await;
        debug!(?outcome, "exchange finished");
    }

    Ok(())
}

/// Runs one exchange, rendering as it goes. Ctrl+C cancels it.
pub async fn exchange(
    session: &mut ChatSession,
    renderer: &mut TranscriptRenderer,
    text: &str,
) -> ExchangeOutcome {
    interrupt::reset();
    session
        .send(text, interrupt::wait_for_interrupt(), |transcript| {
            renderer.render(transcript);
        })
        .await
}
