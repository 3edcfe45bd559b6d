// WebSocket layer: one handler per viewer connection plus the shared
// snapshot fan-out task.

use crate::domain::GameSnapshot;
use crate::interface_adapters::protocol::{SnapshotDto, SteerCommand};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{DirectionRequest, SubscriberId, SubscriberRegistry};

use axum::{
    Error,
    extract::{
        State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    SteeringClosed,
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

/// Serializes each snapshot once and encodes it as shared UTF-8 bytes.
pub fn encode_snapshot(snapshot: &GameSnapshot) -> Result<Utf8Bytes, serde_json::Error> {
    let txt = serde_json::to_string(&SnapshotDto::from(snapshot))?;
    Ok(Utf8Bytes::from(txt))
}

/// Fan-out task sitting between the simulation and the subscribers.
///
/// Each snapshot is serialized exactly once; the shared bytes go to every
/// registered subscriber and into the latest-snapshot slot that new
/// connections read on connect.
pub async fn snapshot_fanout(
    mut snapshot_rx: broadcast::Receiver<GameSnapshot>,
    subscribers: Arc<SubscriberRegistry>,
    latest_tx: watch::Sender<Utf8Bytes>,
) {
    loop {
        match snapshot_rx.recv().await {
            Ok(snapshot) => {
                let bytes = match encode_snapshot(&snapshot) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        error!(error = ?e, "failed to serialize snapshot");
                        continue;
                    }
                };

                // send_replace stores the value even while nobody holds a
                // receiver, so the slot never goes stale between viewers.
                let _ = latest_tx.send_replace(bytes.clone());
                subscribers.broadcast(bytes).await;
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(missed = n, "snapshot fan-out lagged; skipping to latest");
            }
            Err(broadcast::error::RecvError::Closed) => {
                warn!("snapshot channel closed; fan-out exiting");
                break;
            }
        }
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

struct ConnCtx {
    pub subscriber_id: SubscriberId,
    pub subscribers: Arc<SubscriberRegistry>,
    pub steering_tx: mpsc::Sender<DirectionRequest>,
    pub outbox_rx: mpsc::UnboundedReceiver<Utf8Bytes>,

    pub msgs_in: u64,
    pub msgs_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,

    pub invalid_payloads: u32,

    pub last_steering_full_log: Instant,
    pub last_invalid_payload_log: Instant,

    pub close_frame: Option<CloseFrame>,
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    // Read the board before registering. The fan-out updates the latest
    // slot before it broadcasts, so frames queued after this point are
    // never older than this read; a pass landing in between shows up as a
    // skipped frame, not a reordered one.
    let latest = state.snapshot_latest_tx.borrow().clone();

    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
    let subscriber_id = state.subscribers.register(outbox_tx).await;

    let span = info_span!("conn", subscriber_id);
    let _enter = span.enter();

    let viewers = state.subscribers.count().await;
    info!(viewers, "client connected");

    let throttle_start = Instant::now() - LOG_THROTTLE;
    let mut ctx = ConnCtx {
        subscriber_id,
        subscribers: state.subscribers.clone(),
        steering_tx: state.steering_tx.clone(),
        outbox_rx,

        msgs_in: 0,
        msgs_out: 0,
        bytes_in: 0,
        bytes_out: 0,

        invalid_payloads: 0,

        last_steering_full_log: throttle_start,
        last_invalid_payload_log: throttle_start,

        close_frame: None,
    };

    // New viewers get the current board immediately instead of waiting out
    // the tick in progress.
    let latest_len = latest.len();
    match socket.send(Message::Text(latest)).await {
        Ok(()) => {
            ctx.msgs_out += 1;
            ctx.bytes_out += latest_len as u64;
        }
        Err(e) => {
            // The client vanished between upgrade and first write.
            warn!(error = %e, "failed to send initial snapshot");
            disconnect_cleanup(&ctx).await;
            return;
        }
    }

    let loop_result = run_client_loop(&mut socket, &mut ctx).await;
    disconnect_cleanup(&ctx).await;
    if let Err(e) = loop_result {
        warn!(error = ?e, "client loop exited with error");
    }
}

enum LoopControl {
    Continue,
    Disconnect,
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let subscriber_id = ctx.subscriber_id;

    // Split borrows so `tokio::select!` can hold them concurrently.
    let ConnCtx {
        steering_tx,
        outbox_rx,
        msgs_in,
        msgs_out,
        bytes_in,
        bytes_out,
        invalid_payloads,
        last_steering_full_log,
        last_invalid_payload_log,
        close_frame,
        ..
    } = ctx;

    let mut fatal: Option<NetError> = None;

    loop {
        // disconnect becomes true on error
        let disconnect: bool = tokio::select! {
            // Incoming steering (or anything else) from the client.
            incoming = socket.recv() => {
                match handle_incoming_ws(
                    incoming,
                    subscriber_id,
                    steering_tx,
                    msgs_in,
                    bytes_in,
                    invalid_payloads,
                    last_steering_full_log,
                    last_invalid_payload_log,
                    close_frame,
                ) {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            // Outgoing snapshots queued by the fan-out task.
            outbound = outbox_rx.recv() => {
                match outbound {
                    Some(bytes) => {
                        match forward_snapshot_bytes(bytes, socket, msgs_out, bytes_out).await {
                            LoopControl::Continue => false,
                            LoopControl::Disconnect => true,
                        }
                    }
                    None => {
                        // The registry dropped our outbox after a failed
                        // delivery; nothing more will arrive.
                        debug!(subscriber_id, "outbox closed");
                        true
                    }
                }
            }
        };

        if disconnect {
            // The close frame carries the refusal reason when one was set.
            if let Err(err) = socket
                .send(Message::Close(close_frame.take()))
                .await
                .map_err(NetError::Ws)
            {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    subscriber_id: SubscriberId,
    steering_tx: &mpsc::Sender<DirectionRequest>,
    msgs_in: &mut u64,
    bytes_in: &mut u64,
    invalid_payloads: &mut u32,
    last_steering_full_log: &mut Instant,
    last_invalid_payload_log: &mut Instant,
    close_frame: &mut Option<CloseFrame>,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                *msgs_in += 1;
                *bytes_in += text.len() as u64;

                match serde_json::from_str::<SteerCommand>(&text) {
                    Ok(cmd) => forward_steering(
                        subscriber_id,
                        steering_tx,
                        cmd,
                        last_steering_full_log,
                    ),
                    Err(parse_err) => {
                        // Bad payloads never cost the sender its connection.
                        *invalid_payloads += 1;
                        if should_log(last_invalid_payload_log) {
                            warn!(
                                subscriber_id,
                                bytes = text.len(),
                                error = %parse_err,
                                "ignored unparseable steering message"
                            );
                        }
                        Ok(LoopControl::Continue)
                    }
                }
            }
            Message::Binary(_) => {
                *close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                Ok(LoopControl::Disconnect)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(subscriber_id, error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!(subscriber_id, "websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

fn forward_steering(
    subscriber_id: SubscriberId,
    steering_tx: &mpsc::Sender<DirectionRequest>,
    cmd: SteerCommand,
    last_steering_full_log: &mut Instant,
) -> Result<LoopControl, NetError> {
    let request = DirectionRequest {
        direction: cmd.direction.into(),
        requested_at: tokio::time::Instant::now(),
    };

    match steering_tx.try_send(request) {
        Ok(()) => Ok(LoopControl::Continue),
        Err(mpsc::error::TrySendError::Full(_)) => {
            // The simulation drains once per tick; under a flood we drop
            // rather than block the socket task.
            if should_log(last_steering_full_log) {
                warn!(subscriber_id, "steering channel full; dropping command");
            }
            Ok(LoopControl::Continue)
        }
        Err(mpsc::error::TrySendError::Closed(_)) => Err(NetError::SteeringClosed),
    }
}

async fn forward_snapshot_bytes(
    bytes: Utf8Bytes,
    socket: &mut WebSocket,
    msgs_out: &mut u64,
    bytes_out: &mut u64,
) -> LoopControl {
    let bytes_len = bytes.len();
    match socket.send(Message::Text(bytes)).await.map_err(NetError::Ws) {
        Ok(()) => {
            *msgs_out += 1;
            *bytes_out += bytes_len as u64;
            LoopControl::Continue
        }
        Err(err) => {
            // Log unexpected send failures; disconnect follows immediately.
            warn!(error = ?err, "failed to send snapshot");
            LoopControl::Disconnect
        }
    }
}

async fn disconnect_cleanup(ctx: &ConnCtx) {
    // Idempotent: a broadcast pass may already have pruned this entry.
    ctx.subscribers.unregister(ctx.subscriber_id).await;

    debug!(
        msgs_in = ctx.msgs_in,
        msgs_out = ctx.msgs_out,
        bytes_in = ctx.bytes_in,
        bytes_out = ctx.bytes_out,
        invalid_payloads = ctx.invalid_payloads,
        "connection stats"
    );
    info!("client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Coordinate, Direction};

    fn sample_snapshot() -> GameSnapshot {
        GameSnapshot {
            snake: vec![Coordinate { x: 10, y: 10 }],
            direction: Direction::Right,
            food: Coordinate { x: 4, y: 7 },
            score: 0,
            game_over: false,
        }
    }

    #[test]
    fn encoded_snapshot_is_valid_wire_json() {
        let bytes = encode_snapshot(&sample_snapshot()).unwrap();
        let value: serde_json::Value = serde_json::from_str(bytes.as_str()).unwrap();

        assert_eq!(value["snake"], serde_json::json!([[10, 10]]));
        assert_eq!(value["food"], serde_json::json!([4, 7]));
        assert_eq!(value["direction"], serde_json::json!("right"));
        assert_eq!(value["game_over"], serde_json::json!(false));
    }

    #[tokio::test]
    async fn fanout_delivers_shared_bytes_and_updates_the_latest_slot() {
        let (snapshot_tx, snapshot_rx) = broadcast::channel(8);
        let (latest_tx, latest_rx) = watch::channel(Utf8Bytes::from(""));
        let subscribers = Arc::new(SubscriberRegistry::new());
        let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel();
        subscribers.register(outbox_tx).await;

        tokio::spawn(snapshot_fanout(snapshot_rx, subscribers.clone(), latest_tx));

        snapshot_tx.send(sample_snapshot()).unwrap();

        let delivered = outbox_rx.recv().await.unwrap();
        assert_eq!(latest_rx.borrow().as_str(), delivered.as_str());

        let value: serde_json::Value = serde_json::from_str(delivered.as_str()).unwrap();
        assert_eq!(value["direction"], serde_json::json!("right"));
    }

    #[tokio::test]
    async fn latest_slot_updates_even_with_no_subscribers() {
        let (snapshot_tx, snapshot_rx) = broadcast::channel(8);
        let (latest_tx, mut latest_rx) = watch::channel(Utf8Bytes::from(""));
        let subscribers = Arc::new(SubscriberRegistry::new());

        tokio::spawn(snapshot_fanout(snapshot_rx, subscribers, latest_tx));
        snapshot_tx.send(sample_snapshot()).unwrap();

        latest_rx.changed().await.unwrap();
        assert!(!latest_rx.borrow().is_empty());
    }

    #[tokio::test]
    async fn registration_after_a_fanout_pass_only_queues_newer_frames() {
        let (snapshot_tx, snapshot_rx) = broadcast::channel(8);
        let first = encode_snapshot(&sample_snapshot()).unwrap();
        let (latest_tx, mut latest_rx) = watch::channel(first.clone());
        let subscribers = Arc::new(SubscriberRegistry::new());
        tokio::spawn(snapshot_fanout(snapshot_rx, subscribers.clone(), latest_tx));

        // Connect order as in handle_socket: read the board first.
        let initial = latest_rx.borrow().clone();

        // A fan-out pass lands before the registration gets in.
        let mut raced = sample_snapshot();
        raced.score = 1;
        snapshot_tx.send(raced).unwrap();
        latest_rx.changed().await.unwrap();

        // The late registration only sees passes from here on.
        let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel();
        subscribers.register(outbox_tx).await;
        let mut newest = sample_snapshot();
        newest.score = 2;
        snapshot_tx.send(newest).unwrap();

        let queued = outbox_rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(queued.as_str()).unwrap();
        assert_eq!(value["score"], serde_json::json!(2));
        assert_eq!(initial.as_str(), first.as_str());
        // The frame that raced the registration was skipped, never queued
        // behind a newer initial send.
        assert!(outbox_rx.try_recv().is_err());
    }
}
