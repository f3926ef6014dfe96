use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::future;
use futures::StreamExt;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct FeedFilter {
    /// Only stream assignments made to this courier.
    pub courier_id: Option<Uuid>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(filter): Query<FeedFilter>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, filter))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, filter: FeedFilter) {
    let (mut sender, mut receiver) = socket.split();
    let courier_filter = filter.courier_id;

    let mut feed = BroadcastStream::new(state.assignment_events_tx.subscribe()).filter_map(
        move |event| {
            let assignment = match event {
                Ok(assignment) => courier_filter
                    .is_none_or(|courier| assignment.courier_id == courier)
                    .then_some(assignment),
                Err(err) => {
                    debug!(error = %err, "assignment feed lagged");
                    None
                }
            };
            future::ready(assignment)
        },
    );

    info!(courier_id = ?courier_filter, "assignment feed client connected");

    let send_task = tokio::spawn(async move {
        while let Some(assignment) = feed.next().await {
            let json = match serde_json::to_string(&assignment) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize assignment for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!("assignment feed client disconnected");
}
