//! # Streaming Session Module
//!
//! Serves `/ecg` over WebSocket. Each accepted connection gets its own
//! `SimulationController` and runs two duties until either fails:
//! 1. **push**: every interval, generate a reading, log it, send it as JSON
//! 2. **read**: drain inbound frames only to notice close or I/O errors
//!
//! When one duty ends the other is stopped too, then the socket is closed.
//! Errors end the affected session only; the listener keeps accepting.

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::stream::{SplitSink, SplitStream};
use futures::{Sink, SinkExt, StreamExt};
use std::fmt;
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::error::SessionError;
use crate::logging::LogSinks;
use crate::reading::{ConditionType, Reading};
use crate::simulation::{PeriodicTask, SimulationController};

pub const ECG_PATH: &str = "/ecg";

type SharedSink = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Shared by every connection: the log sinks and the push cadence.
#[derive(Clone)]
pub struct AppState {
    pub sinks: LogSinks,
    pub push_interval: Duration,
}

impl AppState {
    pub fn new(sinks: LogSinks, push_interval: Duration) -> Self {
        Self { sinks, push_interval }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(ECG_PATH, get(ecg_handler))
        .with_state(state)
}

/// Serve until the listener fails or `shutdown` resolves.
///
/// Shutdown stops accepting immediately; open sessions are not drained.
pub async fn serve<S>(listener: TcpListener, state: AppState, shutdown: S) -> std::io::Result<()>
where
    S: Future<Output = ()> + Send,
{
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    tokio::select! {
        result = axum::serve(listener, app).into_future() => result,
        () = shutdown => Ok(()),
    }
}

/// Upgrade the request, or log why it could not be upgraded and reject it.
async fn ecg_handler(
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    let ws = match upgrade {
        Ok(ws) => ws,
        Err(rejection) => {
            state
                .sinks
                .info(&format!("WebSocket upgrade error: {}", rejection.body_text()));
            return rejection.into_response();
        }
    };

    let failure_sinks = state.sinks.clone();
    ws.on_failed_upgrade(move |e| {
        failure_sinks.info(&format!("WebSocket upgrade error: {}", e));
    })
    .on_upgrade(move |socket| run_session(socket, peer, state))
}

async fn run_session(socket: WebSocket, peer: SocketAddr, state: AppState) {
    let sinks = state.sinks.clone();
    sinks.info(&format!("New client connected from {}", peer));

    let (sink, mut stream) = socket.split();
    let sink: SharedSink = Arc::new(Mutex::new(sink));

    let controller = SimulationController::new();
    sinks.info(&format!("Simulating {} for {}", controller.profile().id, peer));
    let mut push = start_push(controller, sink.clone(), sinks.clone(), state.push_interval);

    tokio::select! {
        _ = push.finished() => {}
        result = drain_inbound(&mut stream) => match result {
            Ok(()) => sinks.info(&format!("Client {} closed the connection", peer)),
            Err(e) => sinks.info(&e.to_string()),
        },
    }

    push.stop();
    push.finished().await;
    let _ = sink.lock().await.close().await;
    sinks.info(&format!("Client {} disconnected", peer));
}

/// Run the push duty: one reading per `interval`, written to `sink`.
///
/// A reading that cannot be encoded is logged and skipped. A failed write
/// ends the duty.
fn start_push<K>(
    controller: SimulationController,
    sink: Arc<Mutex<K>>,
    sinks: LogSinks,
    interval: Duration,
) -> PeriodicTask
where
    K: Sink<Message> + Unpin + Send + 'static,
    K::Error: fmt::Display,
{
    controller.run_with_callback(interval, move |reading, condition| {
        let sink = sink.clone();
        let sinks = sinks.clone();
        async move {
            match push_reading(&sink, &sinks, &reading, condition).await {
                Ok(()) => ControlFlow::Continue(()),
                Err(e @ SessionError::Encode(_)) => {
                    sinks.info(&e.to_string());
                    ControlFlow::Continue(())
                }
                Err(e) => {
                    sinks.info(&e.to_string());
                    ControlFlow::Break(())
                }
            }
        }
    })
}

/// Consume inbound frames until the peer closes or the connection fails.
async fn drain_inbound(stream: &mut SplitStream<WebSocket>) -> Result<(), SessionError> {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Close(_)) => return Ok(()),
            Ok(_) => {}
            Err(e) => return Err(SessionError::Read(e.to_string())),
        }
    }
    Ok(())
}

async fn push_reading<K>(
    sink: &Mutex<K>,
    sinks: &LogSinks,
    reading: &Reading,
    condition: ConditionType,
) -> Result<(), SessionError>
where
    K: Sink<Message> + Unpin,
    K::Error: fmt::Display,
{
    sinks.info(&tick_summary(reading, condition));
    if let Some(alert) = alert_line(reading, condition) {
        sinks.alert(&alert);
    }

    let payload = serde_json::to_string(reading).map_err(SessionError::Encode)?;
    sink.lock()
        .await
        .send(Message::Text(payload.into()))
        .await
        .map_err(|e| SessionError::Write(e.to_string()))?;

    sinks.info(&format!(
        "Sent reading: HR={}, RR={:.2}",
        reading.heart_rate, reading.rr_interval
    ));
    Ok(())
}

fn condition_name(condition: ConditionType) -> &'static str {
    match condition {
        ConditionType::Normal => "Normal",
        ConditionType::Tachycardia => "Tachycardia",
        ConditionType::Bradycardia => "Bradycardia",
        ConditionType::Arrhythmia => "Arrhythmia",
    }
}

fn tick_summary(reading: &Reading, condition: ConditionType) -> String {
    format!(
        "{} - HR={}, RR={:.2}",
        condition_name(condition),
        reading.heart_rate,
        reading.rr_interval
    )
}

/// Alert text for the simulated condition, `None` while the cycle is normal.
///
/// Labels come from the schedule, not from threshold classification.
pub fn alert_line(reading: &Reading, condition: ConditionType) -> Option<String> {
    let text = match condition {
        ConditionType::Normal => return None,
        ConditionType::Tachycardia => "High heart rate",
        ConditionType::Bradycardia => "Low heart rate",
        ConditionType::Arrhythmia => "Irregular heartbeat",
    };
    Some(format!(
        "ALERT: {} detected - {} (HR={} BPM, RR={:.2} s)",
        condition.label(),
        text,
        reading.heart_rate,
        reading.rr_interval
    ))
}

/// Resolve on SIGINT or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => log::info!("Received SIGINT"),
        () = terminate => log::info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn test_sinks(dir: &tempfile::TempDir) -> LogSinks {
        LogSinks::setup(dir.path().join("ecg.log"), dir.path().join("alerts.log")).unwrap()
    }

    fn controller() -> SimulationController {
        SimulationController::with_rng(StdRng::seed_from_u64(9))
    }

    #[tokio::test]
    async fn test_push_sends_one_reading_per_tick() {
        let dir = tempfile::tempdir().unwrap();
        let sinks = test_sinks(&dir);
        let (tx, mut rx) = mpsc::unbounded::<Message>();

        let mut push = start_push(controller(), Arc::new(Mutex::new(tx)), sinks.clone(), Duration::from_millis(5));
        for _ in 0..3 {
            let frame = tokio::time::timeout(Duration::from_secs(1), rx.next())
                .await
                .expect("no reading pushed")
                .expect("push duty ended");
            match frame {
                Message::Text(text) => {
                    let reading: Reading = serde_json::from_str(text.as_str()).unwrap();
                    assert!((70..=80).contains(&reading.heart_rate));
                }
                other => panic!("unexpected frame {:?}", other),
            }
        }
        push.stop();
        push.finished().await;

        sinks.flush();
        let general = std::fs::read_to_string(sinks.general_path()).unwrap();
        assert!(general.contains("Sent reading: HR="));
    }

    #[tokio::test]
    async fn test_write_failure_ends_push_duty() {
        let dir = tempfile::tempdir().unwrap();
        let sinks = test_sinks(&dir);
        let (tx, rx) = mpsc::unbounded::<Message>();
        drop(rx);

        let mut push = start_push(controller(), Arc::new(Mutex::new(tx)), sinks.clone(), Duration::from_millis(5));
        tokio::time::timeout(Duration::from_secs(1), push.finished())
            .await
            .expect("push duty should end after a failed write");

        sinks.flush();
        let ticks = |log: &str| log.matches("Normal - HR=").count();
        let general = std::fs::read_to_string(sinks.general_path()).unwrap();
        assert!(general.contains("Write error: "));
        assert!(!general.contains("Sent reading"));
        assert_eq!(ticks(&general), 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        sinks.flush();
        let later = std::fs::read_to_string(sinks.general_path()).unwrap();
        assert_eq!(ticks(&later), 1);
    }

    #[test]
    fn test_alert_line_format() {
        let reading = Reading::new(112, 0.5357);
        assert_eq!(
            alert_line(&reading, ConditionType::Tachycardia).as_deref(),
            Some("ALERT: TACHYCARDIA detected - High heart rate (HR=112 BPM, RR=0.54 s)")
        );

        let reading = Reading::new(48, 1.25);
        assert_eq!(
            alert_line(&reading, ConditionType::Bradycardia).as_deref(),
            Some("ALERT: BRADYCARDIA detected - Low heart rate (HR=48 BPM, RR=1.25 s)")
        );

        let reading = Reading::new(74, 0.95);
        assert_eq!(
            alert_line(&reading, ConditionType::Arrhythmia).as_deref(),
            Some("ALERT: ARRHYTHMIA detected - Irregular heartbeat (HR=74 BPM, RR=0.95 s)")
        );
    }

    #[test]
    fn test_normal_tick_has_no_alert() {
        let reading = Reading::new(130, 0.46);
        assert_eq!(alert_line(&reading, ConditionType::Normal), None);
        assert_eq!(tick_summary(&reading, ConditionType::Normal), "Normal - HR=130, RR=0.46");
    }
}
