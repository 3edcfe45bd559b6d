use crate::use_cases::{DirectionRequest, SubscriberRegistry};
use axum::extract::ws::Utf8Bytes;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

#[derive(Clone)]
pub struct AppState {
    // Steering commands flowing from connections into the simulation task.
    pub steering_tx: mpsc::Sender<DirectionRequest>,
    // Membership for snapshot fan-out, shared with the fan-out task.
    pub subscribers: Arc<SubscriberRegistry>,
    // Latest serialized snapshot; sent to new subscribers on connect.
    pub snapshot_latest_tx: watch::Sender<Utf8Bytes>,
}
