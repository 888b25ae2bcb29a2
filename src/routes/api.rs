use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use hasslink_api::state::{EntityState, ServiceCall, StateUpdate, SwitchState};

use crate::error::{ApiError, ApiResult};
use crate::server::appstate::AppState;

async fn get_root() -> Json<Value> {
    Json(json!({"message": "API running."}))
}

async fn get_states(State(state): State<AppState>) -> Json<Vec<EntityState>> {
    Json(state.registry.lock().await.list())
}

async fn get_state(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> ApiResult<Json<EntityState>> {
    let lock = state.registry.lock().await;
    let Some(st) = lock.get(&entity_id).cloned() else {
        return Err(ApiError::EntityNotFound(entity_id));
    };
    drop(lock);
    Ok(Json(st))
}

async fn post_state(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
    Json(update): Json<StateUpdate>,
) -> (StatusCode, Json<EntityState>) {
    let (st, created) =
        state
            .registry
            .lock()
            .await
            .set_state(&entity_id, &update.state, update.attributes);

    if created {
        log::info!("Created entity {entity_id} as {}", st.state);
        (StatusCode::CREATED, Json(st))
    } else {
        (StatusCode::OK, Json(st))
    }
}

async fn post_switch_service(
    State(state): State<AppState>,
    Path(service): Path<String>,
    Json(call): Json<ServiceCall>,
) -> ApiResult<Json<Vec<EntityState>>> {
    let on = match service.as_str() {
        "turn_on" => true,
        "turn_off" => false,
        _ => return Err(ApiError::UnsupportedService(service)),
    };

    let coordinator = state.links().lock().await.coordinator_for(&call.entity_id);

    if let Some(coordinator) = coordinator {
        log::debug!("[{}] {service} requested", coordinator.name());
        if on {
            coordinator.turn_on().await;
        } else {
            coordinator.turn_off().await;
        }
    } else {
        let mut registry = state.registry.lock().await;
        let Some(current) = registry.get(&call.entity_id) else {
            return Err(ApiError::EntityNotFound(call.entity_id));
        };
        let attributes = current.attributes.clone();
        registry.set_state(&call.entity_id, SwitchState::from_on(on).as_str(), attributes);
    }

    let lock = state.registry.lock().await;
    let changed = lock.get(&call.entity_id).cloned().into_iter().collect();
    drop(lock);
    Ok(Json(changed))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/", get(get_root))
        .route("/api/states", get(get_states))
        .route("/api/states/{entity_id}", get(get_state))
        .route("/api/states/{entity_id}", post(post_state))
        .route("/api/services/switch/{service}", post(post_switch_service))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::link::testutil::{FakeRemoteServer, eventually};
    use crate::routes::testutil::TestApp;

    #[tokio::test]
    async fn set_and_get_states() {
        let app = TestApp::new(None).await;

        let (status, body) = app
            .request(
                Method::POST,
                "/api/states/switch.kitchen",
                Some(json!({"state": "on", "attributes": {"friendly_name": "Kitchen"}})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["state"], "on");

        let (status, _) = app
            .request(
                Method::POST,
                "/api/states/switch.kitchen",
                Some(json!({"state": "off"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app
            .request(Method::GET, "/api/states/switch.kitchen", None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["entity_id"], "switch.kitchen");
        assert_eq!(body["state"], "off");

        let (_, body) = app.request(Method::GET, "/api/states", None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_entity_is_404() {
        let app = TestApp::new(None).await;

        let (status, _) = app
            .request(Method::GET, "/api/states/switch.nope", None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app
            .request(
                Method::POST,
                "/api/services/switch/turn_on",
                Some(json!({"entity_id": "switch.nope"})),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn plain_switch_service_sets_state() {
        let app = TestApp::new(None).await;
        app.request(
            Method::POST,
            "/api/states/switch.kitchen",
            Some(json!({"state": "off", "attributes": {"friendly_name": "Kitchen"}})),
        )
        .await;

        let (status, body) = app
            .request(
                Method::POST,
                "/api/services/switch/turn_on",
                Some(json!({"entity_id": "switch.kitchen"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["state"], "on");
        assert_eq!(body[0]["attributes"]["friendly_name"], "Kitchen");
    }

    #[tokio::test]
    async fn unsupported_service_is_rejected() {
        let app = TestApp::new(None).await;

        let (status, _) = app
            .request(
                Method::POST,
                "/api/services/switch/toggle_twice",
                Some(json!({"entity_id": "switch.kitchen"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn linked_switch_service_goes_to_remote() {
        let remote = FakeRemoteServer::start().await;
        let app = TestApp::new(None).await;

        let (status, entry) = app
            .request(
                Method::POST,
                "/api/links",
                Some(json!({
                    "name": "Porch",
                    "remote_url": remote.url(),
                    "remote_token": "s3cret",
                    "remote_entity_id": "switch.remote",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(entry["entity_id"], "switch.porch");

        // wait for the initial poll
        assert!(eventually(Duration::from_secs(5), || !remote.requests().is_empty()).await);
        remote.respond_state(StatusCode::OK, r#"{"state": "on"}"#.to_string());

        let (status, body) = app
            .request(
                Method::POST,
                "/api/services/switch/turn_on",
                Some(json!({"entity_id": "switch.porch"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["state"], "on");

        let writes: Vec<_> = remote
            .requests()
            .into_iter()
            .filter(|req| req.method == "POST")
            .collect();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].path, "/api/services/switch/turn_on");
        assert_eq!(writes[0].body, json!({"entity_id": "switch.remote"}));
    }
}
