// routes/events.rs
// Server-sent "data changed" hints for connected dashboards.

use axum::{
    extract::State,
    response::sse::{KeepAlive, Sse},
};
use std::sync::Arc;

use crate::notify::sse_stream;
use crate::session::SessionUser;
use crate::state::AppState;

pub async fn events(
    _session_user: SessionUser,
    State(state): State<Arc<AppState>>,
) -> Sse<impl futures::Stream<Item = Result<axum::response::sse::Event, std::convert::Infallible>>>
{
    Sse::new(sse_stream(state.events.subscribe())).keep_alive(KeepAlive::default())
}
