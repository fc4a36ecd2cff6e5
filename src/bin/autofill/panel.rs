//! Local HTTP surface for whatever UI edits the configuration and wants to
//! follow what the agent is doing.

use anyhow::{Result, anyhow};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, error, info};

use crate::types::RunEvent;
use form_autofill::targets::{self, TargetDraft};
use form_autofill::{ConfigStore, Profile, StorageData, StoreError, TargetRecord};

const PORT_RANGE: std::ops::Range<u16> = 3000..3010;

impl RunEvent {
    fn to_sse_event(&self) -> Event {
        match Event::default().event(self.name()).json_data(self) {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, "could not encode run event");
                Event::default().event(self.name()).data("{}")
            }
        }
    }
}

#[derive(Clone)]
pub struct PanelState {
    pub store: ConfigStore,
    pub events: broadcast::Sender<RunEvent>,
}

/// Store failures as HTTP responses.
struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_rejection() {
            StatusCode::BAD_REQUEST
        } else {
            error!(error = %self.0, "config store failure");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, self.0.to_string()).into_response()
    }
}

pub fn router(state: PanelState) -> Router {
    Router::new()
        .route("/config", get(config_handler))
        .route("/profile", put(set_profile_handler).delete(clear_profile_handler))
        .route("/targets", put(set_targets_handler).post(add_target_handler))
        .route("/events", get(sse_handler))
        .with_state(Arc::new(state))
}

/// Serve on the first free port from `preferred` up to 3009.
pub async fn start_server(state: PanelState, preferred: u16) -> Result<u16> {
    let ports = std::iter::once(preferred).chain(PORT_RANGE.filter(|p| *p > preferred));
    let mut bound = None;
    for port in ports {
        match tokio::net::TcpListener::bind(("127.0.0.1", port)).await {
            Ok(listener) => {
                bound = Some((listener, port));
                break;
            }
            Err(e) => debug!(port, error = %e, "port busy"),
        }
    }
    let (listener, port) =
        bound.ok_or_else(|| anyhow!("could not bind a panel port from {preferred} to 3009"))?;

    info!("panel listening on http://127.0.0.1:{port}");
    let app = router(state);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "panel server stopped");
        }
    });
    Ok(port)
}

async fn config_handler(
    State(state): State<Arc<PanelState>>,
) -> Result<Json<StorageData>, ApiError> {
    Ok(Json(state.store.load().await?))
}

async fn set_profile_handler(
    State(state): State<Arc<PanelState>>,
    Json(profile): Json<Profile>,
) -> Result<StatusCode, ApiError> {
    state.store.set_profile(profile).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn clear_profile_handler(State(state): State<Arc<PanelState>>) -> Result<StatusCode, ApiError> {
    state.store.clear_profile().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_targets_handler(
    State(state): State<Arc<PanelState>>,
    Json(list): Json<Vec<TargetRecord>>,
) -> Result<StatusCode, ApiError> {
    state.store.set_targets(list).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_target_handler(
    State(state): State<Arc<PanelState>>,
    Json(draft): Json<TargetDraft>,
) -> Result<(StatusCode, Json<TargetRecord>), ApiError> {
    let mut list = state.store.load().await?.targets;
    let record = targets::add(&mut list, draft)?;
    state.store.set_targets(list).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn sse_handler(
    State(state): State<Arc<PanelState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => Some(Ok::<_, Infallible>(event.to_sse_event())),
        Err(_) => None,
    });
    Sse::new(stream)
}
