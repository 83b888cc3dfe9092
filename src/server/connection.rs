//! Client connection handling

use crate::error::ChatError;
use crate::protocol::system_line;
use crate::router::{Flow, Router};
use crate::session::Session;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// How long the writer gets to flush after the session ends
const WRITER_GRACE: Duration = Duration::from_secs(1);

/// Per-connection buffer limits
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    pub outbox_capacity: usize,
    pub max_line_len: usize,
}

/// One input line as read off the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLine {
    Text(String),

    /// The line exceeded the limit and was discarded
    TooLong,
}

/// Newline-delimited reader with a length cap and lossy UTF-8 decoding
pub struct LineReader<R> {
    reader: R,
    max_len: usize,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> LineReader<R> {
    pub fn new(reader: R, max_len: usize) -> Self {
        Self {
            reader,
            max_len,
            buf: Vec::new(),
        }
    }

    /// Next line, or `None` at end of stream
    ///
    /// Never buffers more than `max_len` bytes; the rest of an oversized line is
    /// consumed and dropped.
    pub async fn next_line(&mut self) -> std::io::Result<Option<InputLine>> {
        self.buf.clear();
        let mut overflow = false;
        let mut read_any = false;

        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                if !read_any {
                    return Ok(None);
                }
                break;
            }
            read_any = true;

            let newline = available.iter().position(|&b| b == b'\n');
            let used = newline.map_or(available.len(), |i| i + 1);
            let content = newline.unwrap_or(available.len());

            if !overflow {
                if self.buf.len() + content > self.max_len {
                    overflow = true;
                    self.buf.clear();
                } else {
                    self.buf.extend_from_slice(&available[..content]);
                }
            }
            self.reader.consume(used);

            if newline.is_some() {
                break;
            }
        }

        if overflow {
            return Ok(Some(InputLine::TooLong));
        }
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        Ok(Some(InputLine::Text(
            String::from_utf8_lossy(&self.buf).into_owned(),
        )))
    }
}

/// Task to write outgoing lines to the client
pub async fn client_writer_task<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut receiver: mpsc::Receiver<String>,
) {
    while let Some(line) = receiver.recv().await {
        if let Err(e) = write_line(&mut writer, &line).await {
            tracing::error!("Failed to write line to client: {}", e);
            break;
        }
    }

    tracing::debug!("Client writer task finished");
}

/// Write one newline-terminated line
pub async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Prompt until the client picks an allowed, unused name
///
/// Returns `None` if the client goes away first. No command is interpreted here:
/// every answer is treated as a name.
pub async fn negotiate_name<R: AsyncBufRead + Unpin>(
    lines: &mut LineReader<R>,
    session: &Arc<Session>,
    router: &Router,
) -> Result<Option<String>> {
    let prompt = system_line(&format!(
        "Enter username (allowed: [{}]):",
        router.policy().allowed().join(", ")
    ));

    loop {
        session.send(prompt.clone());

        let answer = match lines.next_line().await? {
            Some(InputLine::Text(answer)) => answer,
            Some(InputLine::TooLong) => {
                session.send(system_line(
                    &ChatError::LineTooLong(lines.max_len).to_string(),
                ));
                continue;
            }
            None => return Ok(None),
        };

        match router.register(session, &answer).await {
            Ok(name) => {
                session.send(system_line(&format!("Welcome, {}!", name)));
                return Ok(Some(name));
            }
            Err(e @ (ChatError::InvalidName { .. } | ChatError::NameTaken(_))) => {
                tracing::debug!("Name rejected for {}: {}", session.addr(), e);
                session.send(system_line(&e.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Handle a single client connection
pub async fn handle_client(
    stream: TcpStream,
    addr: String,
    router: Router,
    limits: ConnectionLimits,
) -> Result<()> {
    let (reader, writer) = stream.into_split();
    let mut lines = LineReader::new(BufReader::new(reader), limits.max_line_len);

    // Create line channel for this client
    let (tx, rx) = mpsc::channel::<String>(limits.outbox_capacity);
    let session = Arc::new(Session::new(addr.clone(), tx));

    tracing::info!("Connection from {}", addr);

    let mut writer_handle = tokio::spawn(client_writer_task(writer, rx));

    let result = serve_session(&mut lines, &session, &router).await;

    // Cleanup runs however the session ended
    router.disconnect(&session).await;
    drop(session);

    if tokio::time::timeout(WRITER_GRACE, &mut writer_handle)
        .await
        .is_err()
    {
        tracing::debug!("Writer for {} did not finish in time", addr);
        writer_handle.abort();
    }

    tracing::info!("Client handler finished: {}", addr);
    result
}

/// Negotiate a name, then feed lines to the router until quit or end-of-stream
async fn serve_session<R: AsyncBufRead + Unpin>(
    lines: &mut LineReader<R>,
    session: &Arc<Session>,
    router: &Router,
) -> Result<()> {
    let Some(name) = negotiate_name(lines, session, router).await? else {
        tracing::info!("{} left during name negotiation", session.addr());
        return Ok(());
    };

    router.announce_join(session).await;

    while let Some(line) = lines.next_line().await? {
        let line = match line {
            InputLine::Text(line) => line,
            InputLine::TooLong => {
                tracing::debug!("{} sent an oversized line", name);
                session.send(system_line(
                    &ChatError::LineTooLong(lines.max_len).to_string(),
                ));
                continue;
            }
        };
        if router.dispatch(session, &line).await == Flow::Quit {
            tracing::info!("{} quit", name);
            break;
        }
    }

    Ok(())
}
