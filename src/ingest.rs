//! # Client Ingest Module
//!
//! Receives readings from the server and turns them into alerts.
//!
//! ## Duties
//! - **receive** (async task): read one frame at a time, decode it into a
//!   `Reading`, hand it over. Malformed frames are logged and skipped.
//! - **process** (blocking thread): classify each reading, print the table
//!   row, run the notifiers. Tone playback blocks here.
//!
//! The two meet at a rendezvous: the receive duty does not read the next frame
//! until processing has taken the previous reading. While processing is busy
//! at most one more reading is held waiting for it, and the socket is left
//! alone. That wait is the client's only backpressure.
//!
//! ## Shutdown
//! On interrupt a normal-closure frame is sent, then the server's close
//! acknowledgment is awaited for at most one second before the connection is
//! dropped.

use futures::{SinkExt, Stream, StreamExt};
use std::future::Future;
use std::io::{self, Write};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::display::Table;
use crate::error::ClientError;
use crate::notify::{AudioNotifier, CompositeNotifier, Notifier, TextNotifier};
use crate::reading::{classify, Condition, Reading};
use crate::session::ECG_PATH;

pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// A reading plus the signal that processing has taken it.
type Handoff = (Reading, oneshot::Sender<()>);

/// How an ingest run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestExit {
    /// The server closed the connection or it failed
    ServerClosed,
    /// Local shutdown was requested
    Interrupted,
}

/// Build `ws://<addr>/ecg` from a `host:port` address.
pub fn ecg_url(addr: &str) -> Result<String, ClientError> {
    let addr = addr.trim();
    if addr.is_empty() || addr.contains("://") || addr.contains('/') || addr.contains(char::is_whitespace) {
        return Err(ClientError::InvalidAddress(addr.to_string()));
    }
    Ok(format!("ws://{}{}", addr, ECG_PATH))
}

pub async fn connect(addr: &str) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>, ClientError> {
    let url = ecg_url(addr)?;
    log::info!("Connecting to {}", url);

    let (ws, _response) = connect_async(url.as_str())
        .await
        .map_err(|e| ClientError::Connect {
            url: url.clone(),
            reason: e.to_string(),
        })?;
    Ok(ws)
}

/// Decode one wire message into a reading.
pub fn decode(payload: &[u8]) -> Result<Reading, serde_json::Error> {
    serde_json::from_slice(payload)
}

/// Run both duties over `ws` until the server goes away or `shutdown` resolves.
///
/// `process` is called on a blocking thread, once per reading, in arrival order.
pub async fn run<S, P, F>(ws: WebSocketStream<S>, process: P, shutdown: F) -> Result<IngestExit, ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    P: FnMut(Reading) + Send + 'static,
    F: Future<Output = ()>,
{
    let (mut sink, mut stream) = ws.split();
    let (handoff, readings) = mpsc::channel::<Handoff>(1);

    let processing = tokio::task::spawn_blocking(move || process_loop(readings, process));
    let mut receive = tokio::spawn(async move { receive_loop(&mut stream, handoff).await });

    tokio::pin!(shutdown);

    let exit = tokio::select! {
        _ = &mut receive => IngestExit::ServerClosed,
        () = &mut shutdown => {
            log::info!("Interrupt received, closing connection...");
            let close = Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            }));
            if let Err(e) = sink.send(close).await {
                receive.abort();
                return Err(ClientError::CloseFailed(e.to_string()));
            }
            if tokio::time::timeout(CLOSE_TIMEOUT, &mut receive).await.is_err() {
                log::warn!("No close acknowledgment within {:?}, forcing shutdown", CLOSE_TIMEOUT);
                receive.abort();
            }
            IngestExit::Interrupted
        }
    };

    if processing.await.is_err() {
        log::error!("Processing thread panicked");
    }
    Ok(exit)
}

async fn receive_loop<St>(stream: &mut St, handoff: mpsc::Sender<Handoff>)
where
    St: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        let payload = match frame {
            Ok(Message::Text(text)) => text.into_bytes(),
            Ok(Message::Binary(bytes)) => bytes,
            Ok(Message::Close(frame)) => {
                log::info!("Server closed connection: {:?}", frame);
                return;
            }
            Ok(_) => continue,
            Err(e) => {
                log::warn!("read error: {}", e);
                return;
            }
        };

        match decode(&payload) {
            Ok(reading) => {
                let (taken, taken_rx) = oneshot::channel();
                if handoff.send((reading, taken)).await.is_err() || taken_rx.await.is_err() {
                    log::warn!("Processing stopped, ending receive loop");
                    return;
                }
            }
            Err(e) => log::warn!("Unmarshal error: {}", e),
        }
    }
}

fn process_loop<P>(mut readings: mpsc::Receiver<Handoff>, mut process: P)
where
    P: FnMut(Reading),
{
    while let Some((reading, taken)) = readings.blocking_recv() {
        let _ = taken.send(());
        process(reading);
    }
}

/// Client-side processing: classify, print the table row, notify.
pub struct Monitor {
    table: Table,
    notifier: CompositeNotifier,
    out: Box<dyn Write + Send>,
}

impl Monitor {
    /// Console monitor with a text notifier and a terminal-bell audio notifier.
    pub fn console(use_color: bool, min_severity: &str, quiet: bool) -> Self {
        let notifier = CompositeNotifier::new()
            .with(TextNotifier::stdout(use_color).suppressed(quiet))
            .with(AudioNotifier::from_setting(min_severity));
        Self::new(Table::new(use_color), notifier, Box::new(io::stdout()))
    }

    pub fn new(table: Table, notifier: CompositeNotifier, out: Box<dyn Write + Send>) -> Self {
        Self { table, notifier, out }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn process(&mut self, reading: Reading) -> Condition {
        let condition = classify(&reading);

        if let Err(e) = writeln!(self.out, "{}", self.table.row(&condition)) {
            log::warn!("Failed to print reading: {}", e);
        }
        if let Err(e) = self.notifier.notify(&condition) {
            log::warn!("Notification failed: {}", e);
        }

        condition
    }
}
