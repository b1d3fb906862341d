// src/server/websocket.rs
//
// One task per connection. Inbound messages are handled one at a time;
// outbound events go through a channel to a forwarding task so the camera
// pump can emit results too.

use super::protocol::{CaptureSource, ClientEvent, ServerEvent, TranslationResult};
use super::AppState;
use crate::camera::{self, CameraCapture, FrameSource};
use crate::error::{CaptureError, FrameError};
use crate::messages::StatusMessage;
use crate::session::{ConnectionId, SharedSession};
use crate::types::Frame;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

const OUTBOUND_CAPACITY: usize = 64;

#[tracing::instrument(skip(state, ws))]
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    // base64 inflates payloads by 4/3
    let max_message = state.config().server.max_frame_bytes / 3 * 4 + 4096;
    ws.max_message_size(max_message)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Everything a message handler needs to act for one connection.
#[derive(Clone)]
struct Connection {
    id: ConnectionId,
    state: AppState,
    session: SharedSession,
    outbound: mpsc::Sender<ServerEvent>,
}

impl Connection {
    fn open(state: AppState, outbound: mpsc::Sender<ServerEvent>) -> Self {
        let id = Uuid::new_v4();
        let session = state.registry().get_or_create(id);
        let metrics = state.pipeline().metrics();
        metrics.inc(&metrics.sessions_opened);
        Self {
            id,
            state,
            session,
            outbound,
        }
    }

    async fn send(&self, event: ServerEvent) {
        if self.outbound.send(event).await.is_err() {
            trace!(session = %self.id, "Outbound channel closed");
        }
    }

    async fn status(&self, message: StatusMessage) {
        self.send(ServerEvent::status(message.text(self.state.language())))
            .await;
    }

    async fn close(self) {
        self.state.registry().remove(self.id).await;
        let metrics = self.state.pipeline().metrics();
        metrics.inc(&metrics.sessions_closed);
    }
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(OUTBOUND_CAPACITY);

    let forward_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event.to_json() {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Failed to serialize event: {}", e),
            }
        }
    });

    let conn = Connection::open(state, tx);
    info!(session = %conn.id, "Client connected");
    greet(&conn).await;

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => handle_message(&text, &conn).await,
            Message::Binary(_) => debug!(session = %conn.id, "Ignoring binary message"),
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => break,
        }
    }

    let id = conn.id;
    conn.close().await;
    forward_task.abort();
    info!(session = %id, "Client disconnected");
}

async fn greet(conn: &Connection) {
    conn.status(StatusMessage::Connected).await;
    if !conn.state.pipeline().has_classifier() {
        conn.status(StatusMessage::NoModel).await;
    }
}

async fn handle_message(text: &str, conn: &Connection) {
    let event = match ClientEvent::parse(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(session = %conn.id, "Rejected message: {}", e);
            conn.send(ServerEvent::error(e.to_string())).await;
            return;
        }
    };

    match event {
        ClientEvent::StartCapture {
            source: CaptureSource::Client,
        } => {
            conn.state.registry().reset(conn.id).await;
            conn.status(StatusMessage::CaptureStarted).await;
        }
        ClientEvent::StartCapture {
            source: CaptureSource::Server,
        } => start_server_camera(conn).await,
        ClientEvent::StopCapture => {
            if release_camera(conn).await {
                conn.status(StatusMessage::CameraStopped).await;
            } else {
                conn.status(StatusMessage::CaptureStopped).await;
            }
        }
        ClientEvent::ResetCapture => {
            conn.state.registry().reset(conn.id).await;
            conn.status(StatusMessage::CaptureReset).await;
        }
        ClientEvent::SubmitFrame { image } => {
            run_frame(conn, FrameInput::Payload(image)).await;
        }
    }
}

enum FrameInput {
    Payload(String),
    Decoded(Frame),
}

/// Run one frame through the pipeline on the blocking pool. The session's
/// owned guard travels with the work, so a frame that times out still
/// finishes before the next one of this connection starts.
async fn run_frame(conn: &Connection, input: FrameInput) {
    let mut guard = conn.session.clone().lock_owned().await;
    let pipeline = conn.state.pipeline();
    if !pipeline.should_process(&mut guard) {
        return;
    }

    let timeout = conn.state.frame_timeout();
    let state = conn.state.clone();
    let work = tokio::task::spawn_blocking(move || {
        let pipeline = state.pipeline();
        match input {
            FrameInput::Payload(payload) => pipeline.process_payload(&payload, &mut guard),
            FrameInput::Decoded(frame) => pipeline.process(frame, &mut guard),
        }
    });

    let outcome = match tokio::time::timeout(timeout, work).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(FrameError::Unexpected(e.to_string())),
        Err(_) => Err(FrameError::Timeout(timeout)),
    };

    match outcome {
        Ok(result) => {
            trace!(session = %conn.id, ?result, "Frame processed");
            conn.send(ServerEvent::TranslationResult(TranslationResult::from(&result)))
                .await;
        }
        Err(e @ (FrameError::Timeout(_) | FrameError::Unexpected(_))) => {
            let metrics = pipeline.metrics();
            metrics.inc(&metrics.dropped_frames);
            warn!(session = %conn.id, kind = e.kind(), "Frame dropped: {}", e);
        }
        // Already counted and logged by the pipeline
        Err(e) => debug!(session = %conn.id, kind = e.kind(), "Frame dropped"),
    }
}

async fn start_server_camera(conn: &Connection) {
    conn.status(StatusMessage::CameraStarting).await;

    // The device must be free before it can be opened again
    release_camera(conn).await;

    let config = conn.state.config().camera.clone();
    let opened = tokio::task::spawn_blocking(move || camera::open_camera(&config)).await;
    match opened {
        Ok(Ok(source)) => {
            attach_camera(conn, source).await;
            conn.status(StatusMessage::CameraStarted).await;
        }
        Ok(Err(e)) => {
            warn!(session = %conn.id, "Camera unavailable: {}", e);
            conn.send(ServerEvent::error(e.to_string())).await;
        }
        Err(e) => {
            warn!(session = %conn.id, "Camera open task failed: {}", e);
            conn.send(ServerEvent::error(e.to_string())).await;
        }
    }
}

/// Start capturing from `source` into this connection's session, stopping
/// any capture it already owns, and pump its frames through the pipeline.
async fn attach_camera(conn: &Connection, source: Box<dyn FrameSource>) {
    release_camera(conn).await;

    let mirror = conn.state.config().camera.mirror;
    let capture = CameraCapture::start(source, mirror);
    let stopped = capture.stop_signal();

    let previous = {
        let mut session = conn.session.lock().await;
        session.reset();
        session.replace_camera(capture)
    };
    if let Some(previous) = previous {
        previous.release().await;
    }

    info!(session = %conn.id, "Server capture started");
    tokio::spawn(pump_camera(conn.clone(), stopped));
}

/// Stop the session's camera, if it has one. Returns whether one was running.
async fn release_camera(conn: &Connection) -> bool {
    let camera = conn.session.lock().await.take_camera();
    match camera {
        Some(camera) => {
            camera.release().await;
            true
        }
        None => false,
    }
}

/// The capture behind `stopped` quit on its own (read error, end of stream).
/// Detach it from the session and tell the client. A capture that was
/// stopped or replaced on request is already gone from the session.
async fn reap_dead_camera(conn: &Connection, stopped: &Arc<AtomicBool>) {
    let dead = {
        let mut session = conn.session.lock().await;
        let ours = session
            .camera()
            .is_some_and(|camera| Arc::ptr_eq(&camera.stop_signal(), stopped));
        if ours {
            session.take_camera()
        } else {
            None
        }
    };

    if let Some(camera) = dead {
        let reason = camera.take_failure().unwrap_or(CaptureError::Ended);
        camera.release().await;
        warn!(session = %conn.id, "Server capture lost: {}", reason);
        conn.send(ServerEvent::error(reason.to_string())).await;
    }
}

async fn pump_camera(conn: Connection, stopped: Arc<AtomicBool>) {
    let fps = conn.state.config().camera.fps.max(1);
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(fps)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_seq = 0;

    loop {
        ticker.tick().await;
        if stopped.load(Ordering::Acquire) {
            reap_dead_camera(&conn, &stopped).await;
            break;
        }

        let next = {
            let session = conn.session.lock().await;
            session.camera().and_then(|camera| camera.next_frame(last_seq))
        };
        if let Some((seq, frame)) = next {
            last_seq = seq;
            run_frame(&conn, FrameInput::Decoded(frame)).await;
        }
    }
    debug!(session = %conn.id, "Camera pump stopped");
}
