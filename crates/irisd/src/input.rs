//! Interactive input — one line at a time, each broadcast to every peer.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use iris_services::BroadcastDispatcher;

/// Prompt, read a line, dispatch it; repeat until `input` hits EOF.
///
/// Trailing `\r\n` / `\n` is stripped. Empty lines are not sent.
pub async fn input_loop<R, W>(
    dispatcher: BroadcastDispatcher,
    input: R,
    mut prompt_out: W,
    prompt: String,
) where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    loop {
        if let Err(e) = prompt_out.write_all(prompt.as_bytes()).await {
            tracing::warn!(error = %e, "failed to write prompt");
        }
        let _ = prompt_out.flush().await;

        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim_end_matches('\r');
                dispatcher.dispatch(line);
            }
            Ok(None) => {
                tracing::info!("stdin closed, no more local input");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed, input loop exiting");
                return;
            }
        }
    }
}
