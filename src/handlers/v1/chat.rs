//! Conversational turn endpoint.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::error;

use crate::api::TurnRequest;
use crate::handlers::problem_details;
use crate::server::AppState;
use crate::session::ResolveError;
use crate::turn::{drive_turn, TurnContext, TurnSender};

/// Capacity of the per-turn event channel. Backpressure from a slow
/// client stalls the turn rather than buffering unboundedly.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// POST /api/v1/chat
///
/// Resolves the session, spawns the turn, and streams its events as SSE.
/// Resolution failures reject the request before the stream opens;
/// anything after that is reported in-stream.
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<TurnRequest>,
) -> impl IntoResponse {
    if request.message.trim().is_empty() {
        return problem_details::bad_request("message must not be empty");
    }

    let resolution = match state.resolver.resolve(&request).await {
        Ok(resolution) => resolution,
        Err(ResolveError::InvalidParams(msg)) => return problem_details::bad_request(msg),
        Err(err @ ResolveError::Connect(_)) => {
            error!(error = %err, "tool provider connect failed");
            return problem_details::bad_gateway(err.to_string());
        }
        Err(err @ ResolveError::Store(_)) => {
            error!(error = %err, "session store failure");
            return problem_details::internal_error("session store failure");
        }
    };

    let model_ref = resolution.model.clone().or_else(|| request.model.clone());
    let model = match state.models.resolve(model_ref.as_deref()) {
        Ok(model) => model,
        Err(err) => return problem_details::bad_request(err.to_string()),
    };

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let ctx = TurnContext {
        provider: model.provider,
        model: model.name,
        temperature: model.temperature,
        resolution,
        store: state.store.clone(),
        user_message: request.message,
    };
    tokio::spawn(drive_turn(
        ctx,
        TurnSender::new(tx),
        Duration::from_secs(state.turn_timeout_seconds),
    ));

    let stream = ReceiverStream::new(rx).map(|event| {
        let name = event.name();
        Ok::<_, Infallible>(
            Event::default()
                .event(name)
                .json_data(&event)
                .unwrap_or_else(|_| Event::default().event(name).data("{}")),
        )
    });

    let keep_alive = KeepAlive::new()
        .interval(Duration::from_secs(state.keep_alive_interval_seconds))
        .text("keep-alive");

    Sse::new(stream).keep_alive(keep_alive).into_response()
}
