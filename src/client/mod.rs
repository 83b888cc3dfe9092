//! Client - interactive line client for the chat server
//!
//! Prints every server line as it arrives and forwards stdin line by line. The
//! session ends after `/quit` or `goodbye` is sent, or when the server hangs up.

use crate::protocol::is_exit_line;
use crate::server::write_line;
use anyhow::{Context, Result};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, BufReader};
use tokio::net::TcpStream;

const FAREWELL_WAIT: Duration = Duration::from_secs(1);

/// Connect to `addr` and run an interactive session on stdin/stdout
pub async fn run(addr: &str) -> Result<()> {
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("Failed to connect to {}", addr))?;
    println!("Connected to {}", stream.peer_addr()?);
    println!("----- Type: /menu -----");

    let (reader, writer) = stream.into_split();

    let mut server_lines = tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => println!("{}", line),
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!("Server read failed: {}", e);
                    break;
                }
            }
        }
    });

    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = forward_input(stdin, writer) => {
            if result? {
                // Let the farewell arrive before exiting
                let _ = tokio::time::timeout(FAREWELL_WAIT, &mut server_lines).await;
            }
        }
        _ = &mut server_lines => println!("Server closed the connection"),
    }

    Ok(())
}

/// Copy input lines to the server until an exit line has been sent
///
/// Returns `true` if the session ended with an exit line.
pub async fn forward_input<R, W>(input: R, mut writer: W) -> Result<bool>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        write_line(&mut writer, &line).await?;
        if is_exit_line(&line) {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_forward_stops_after_goodbye() {
        let input: &[u8] = b"hello\n/list\nGoodbye\nnot sent\n";
        let mut sent = Vec::new();

        let ended = forward_input(input, &mut sent).await.unwrap();

        assert!(ended);
        assert_eq!(String::from_utf8(sent).unwrap(), "hello\n/list\nGoodbye\n");
    }

    #[tokio::test]
    async fn test_forward_until_eof() {
        let input: &[u8] = b"one\ntwo\n";
        let mut sent = Vec::new();

        let ended = forward_input(input, &mut sent).await.unwrap();

        assert!(!ended);
        assert_eq!(String::from_utf8(sent).unwrap(), "one\ntwo\n");
    }
}
