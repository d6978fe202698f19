//! Renders output-sink lines on stdout.
//!
//! In interactive mode the prompt line is cleared before each event and
//! redrawn after it, so incoming messages don't land mid-prompt.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use iris_services::OutputLine;

/// Erase the current terminal line and return the cursor to column 0.
const CLEAR_LINE: &str = "\r\x1b[2K";

pub fn render(line: &OutputLine, prompt: Option<&str>) -> String {
    match prompt {
        Some(prompt) => format!("{CLEAR_LINE}{line}\n{prompt}"),
        None => format!("{line}\n"),
    }
}

/// Drain `lines` into `out` until every sink is dropped.
pub async fn print_loop<W>(
    mut lines: mpsc::UnboundedReceiver<OutputLine>,
    mut out: W,
    prompt: Option<String>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = lines.recv().await {
        let text = render(&line, prompt.as_deref());
        if let Err(e) = out.write_all(text.as_bytes()).await {
            tracing::warn!(error = %e, "stdout write failed");
            continue;
        }
        let _ = out.flush().await;
    }
    tracing::debug!("output sink closed, printer exiting");
}
