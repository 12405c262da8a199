//! Live auth button updates
//!
//! Each open event stream is a mounted session consumer. The stream emits a
//! freshly rendered auth button whenever the client's session changes and
//! unmounts when the browser disconnects.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;

use super::middleware::AppState;
use crate::models::{ClientId, SessionState};
use crate::session::SessionMount;

/// Next known state of the mount; `Unknown` is never emitted
async fn next_known(mut mount: SessionMount) -> Option<(SessionState, SessionMount)> {
    loop {
        let state = mount.changed().await?;
        if state.is_known() {
            return Some((state, mount));
        }
    }
}

/// GET /session/events - Server-sent auth button fragments
pub async fn events(
    State(state): State<AppState>,
    client: ClientId,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mount = state.hub.mount(&client);
    tracing::debug!(client = %client, "Session event stream opened");

    let theme = state.theme_engine.clone();
    let updates = stream::unfold(mount, next_known).filter_map(move |session| {
        let rendered = theme.render_auth_button(&session);
        async move {
            match rendered {
                Ok(html) => Some(Ok(Event::default().event("auth").data(html))),
                Err(e) => {
                    tracing::warn!(error = %e, "Could not render auth button");
                    None
                }
            }
        }
    });

    Sse::new(updates).keep_alive(KeepAlive::default())
}
