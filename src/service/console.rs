//! User-facing terminal I/O.
//!
//! The session engine talks to the user only through [`Console`], so tests can
//! script input and capture output without a terminal.

use std::future::Future;
use std::io::{self, BufRead, Write};
use std::thread;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{ProtocolError, Result};
use crate::protocol::messaging::ChatMessage;
use crate::utils::time::clock_time;

/// Line-oriented user input plus status and message output.
pub trait Console {
    /// Next line of input with its terminator stripped, or `None` at end of input.
    ///
    /// Must be cancel-safe: dropping the future before it completes loses no input.
    fn read_line(&mut self) -> impl Future<Output = io::Result<Option<String>>>;

    /// Show a prompt with no trailing newline
    fn prompt(&mut self, text: &str);

    fn print_status(&mut self, text: &str);

    fn print_error(&mut self, text: &str);

    fn show_message(&mut self, message: &ChatMessage);
}

/// Prompt, then read one line. End of input is [`ProtocolError::InputClosed`].
pub async fn prompt_line<C: Console>(console: &mut C, text: &str) -> Result<String> {
    console.prompt(text);
    console
        .read_line()
        .await?
        .ok_or(ProtocolError::InputClosed)
}

/// Prompt until a non-empty line is entered.
pub async fn prompt_non_empty<C: Console>(
    console: &mut C,
    text: &str,
    empty_notice: &str,
) -> Result<String> {
    loop {
        let line = prompt_line(console, text).await?;
        if !line.is_empty() {
            return Ok(line);
        }
        console.print_error(empty_notice);
    }
}

/// Console backed by the process's stdin and stdout.
///
/// Stdin is read on a detached thread that forwards lines over a channel, so a
/// pending read never holds up runtime shutdown.
pub struct StdConsole {
    lines: mpsc::UnboundedReceiver<io::Result<String>>,
}

impl StdConsole {
    pub fn new() -> io::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        thread::Builder::new()
            .name("stdin-reader".to_string())
            .spawn(move || forward_stdin(tx))?;
        Ok(Self { lines: rx })
    }
}

fn forward_stdin(tx: mpsc::UnboundedSender<io::Result<String>>) {
    for line in io::stdin().lock().lines() {
        let failed = line.is_err();
        if tx.send(line).is_err() || failed {
            break;
        }
    }
    debug!("Stdin reader finished");
}

impl Console for StdConsole {
    async fn read_line(&mut self) -> io::Result<Option<String>> {
        self.lines.recv().await.transpose()
    }

    fn prompt(&mut self, text: &str) {
        let mut stdout = io::stdout().lock();
        // Display only; a closed stdout surfaces on the next read instead
        let _ = write!(stdout, "{text}");
        let _ = stdout.flush();
    }

    fn print_status(&mut self, text: &str) {
        println!("{text}");
    }

    fn print_error(&mut self, text: &str) {
        eprintln!("{text}");
    }

    fn show_message(&mut self, message: &ChatMessage) {
        println!(
            "[{}] #{} <{}> {}",
            clock_time(message.timestamp),
            message.channel_id,
            message.sender_id,
            message.text
        );
    }
}
