use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use futures::StreamExt;
use futures::stream::Stream;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::error::{ApiError, ApiResult};
use crate::server::appstate::AppState;

pub const EVENT_STATE_CHANGED: &str = "state_changed";

pub async fn get_stream(State(state): State<AppState>) -> Sse<impl Stream<Item = ApiResult<Event>>> {
    let hello = futures::stream::iter([Ok::<_, ApiError>(Event::default().comment("hi"))]);

    let channel = state.registry.lock().await.subscribe();
    let stream = BroadcastStream::new(channel).filter_map(|evt| async move {
        match evt {
            Ok(evt) => {
                log::trace!("## EVENT ##: {} -> {:?}", evt.entity_id, evt.new_state_str());
                Some(
                    Event::default()
                        .event(EVENT_STATE_CHANGED)
                        .json_data(evt)
                        .map_err(ApiError::from),
                )
            }
            Err(BroadcastStreamRecvError::Lagged(count)) => {
                log::warn!("Event stream client lagging, dropped {count} events");
                None
            }
        }
    });

    Sse::new(hello.chain(stream)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text(": ping"),
    )
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/stream", get(get_stream))
}
