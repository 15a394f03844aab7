//! Line-oriented interactive loop

use anyhow::Result;
use notion_agent_agent::Assistant;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;

pub const PROMPT: &str = "> ";

pub const HELP_TEXT: &str = "Commands:
  /help   show this help
  /exit   quit
Tips:
  Ask: 'what are my tasks for today?'";

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Skip,
    Exit,
    Help,
    Ask(&'a str),
}

fn parse_line(line: &str) -> Command<'_> {
    match line.trim() {
        "" | "\\" => Command::Skip,
        "/exit" | "/quit" | "/q" => Command::Exit,
        "/help" => Command::Help,
        text => Command::Ask(text),
    }
}

/// Read lines until end of input, an exit command or cancellation.
///
/// An error from the assistant ends the loop and is returned.
pub async fn run<A, R, W>(
    assistant: &A,
    session_id: &str,
    mut input: R,
    mut output: W,
    cancel: &CancellationToken,
) -> Result<()>
where
    A: Assistant + ?Sized,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut line = String::new();
    loop {
        write!(output, "{}", PROMPT)?;
        output.flush()?;

        line.clear();
        let read = tokio::select! {
            _ = cancel.cancelled() => {
                writeln!(output)?;
                return Ok(());
            }
            read = input.read_line(&mut line) => read?,
        };
        if read == 0 {
            return Ok(());
        }

        match parse_line(&line) {
            Command::Skip => continue,
            Command::Exit => return Ok(()),
            Command::Help => writeln!(output, "{}", HELP_TEXT)?,
            Command::Ask(text) => {
                let answer = assistant.ask(session_id, text).await?;
                if !answer.is_empty() {
                    writeln!(output, "{}", answer)?;
                }
            }
        }
    }
}
