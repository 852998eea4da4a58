/*!
# flowsim-server

HTTP and WebSocket gateway of a [`SessionRegistry`].

Commands are plain JSON `POST`s acknowledged with `{"status": ..}`; the
snapshots of a session are streamed over `/api/ws/{sessionId}`.
*/

mod error;
pub mod handlers;
mod ws;

pub use self::error::ApiError;
use self::{handlers::*, ws::ws_handler};
use axum::{
    Router,
    routing::{get, post},
};
use flowsim::SessionRegistry;

/// Shared state of every handler.
#[derive(Clone)]
pub struct AppState {
    registry: SessionRegistry,
}

impl AppState {
    pub fn new(registry: SessionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api_routes())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/simulate", post(create_handler))
        .route("/sessions", get(sessions_handler))
        .route("/ws/{id}", get(ws_handler))
        .route("/simulate/{id}/snapshot", get(snapshot_handler))
        .route("/simulate/{id}/stop", post(stop_handler))
        .route("/simulate/{id}/traffic", post(traffic_handler))
        .route("/simulate/{id}/toggle", post(toggle_handler))
        .route("/simulate/{id}/config", post(config_handler))
        .route("/simulate/{id}/update-graph", post(update_graph_handler))
        .route("/simulate/{id}/reset-queues", post(reset_queues_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
        response::Response,
    };
    use flowsim::RegistryConfig;
    use flowsim_core::TickSnapshot;
    use serde::de::DeserializeOwned;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tower::ServiceExt;

    const TOPOLOGY: &str = r#"{
        "nodes": [
            {"id": "users", "type": "client", "rps": 0},
            {"id": "lb", "type": "loadbalancer", "maxRPS": 0},
            {"id": "api", "type": "appserver", "maxRPS": 100, "baseLatency": 20},
            {"id": "db", "type": "database"}
        ],
        "edges": [
            {"source": "users", "target": "lb"},
            {"source": "lb", "target": "api"},
            {"source": "api", "target": "db"}
        ],
        "trafficRPS": 80
    }"#;

    fn app(config: RegistryConfig) -> Router {
        router(AppState::new(SessionRegistry::new(config.with_id_seed(3))))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.map_or_else(Body::empty, |body| Body::from(body.to_owned())))
            .unwrap();
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json<T: DeserializeOwned>(response: Response) -> T {
        let body = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn create(app: &Router) -> String {
        let response = send(app, "POST", "/api/simulate", Some(TOPOLOGY)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let created: Created = json(response).await;
        assert_eq!(created.ws_url, format!("/api/ws/{}", created.session_id));
        created.session_id.to_string()
    }

    #[tokio::test]
    async fn health() {
        let response = send(&app(RegistryConfig::default()), "GET", "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let ack: Ack = json(response).await;
        assert_eq!(ack.status, "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn create_then_snapshot() {
        let app = app(RegistryConfig::default());
        let id = create(&app).await;

        let uri = format!("/api/simulate/{id}/snapshot");
        let response = send(&app, "GET", &uri, None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        let response = send(&app, "GET", &uri, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let snapshot: TickSnapshot = json(response).await;
        assert_eq!(snapshot.tick, 1);
        assert_eq!(snapshot.total_rps, 80.0);
        assert_eq!(snapshot.nodes.len(), 4);

        let sessions: Value = json(send(&app, "GET", "/api/sessions", None).await).await;
        assert_eq!(sessions, json!({ "sessions": [id] }));
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_wire_names() {
        let app = app(RegistryConfig::default());
        let id = create(&app).await;
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        let uri = format!("/api/simulate/{id}/snapshot");
        let snapshot: Value = json(send(&app, "GET", &uri, None).await).await;
        for key in ["tick", "totalRPS", "bottleneckIds", "nodes"] {
            assert!(snapshot.get(key).is_some(), "missing {key}");
        }
        let node = &snapshot["nodes"][0];
        for key in ["id", "status", "utilization", "latency", "throughput", "queueDepth"] {
            assert!(node.get(key).is_some(), "missing node {key}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn commands_are_acknowledged() {
        let app = app(RegistryConfig::default());
        let id = create(&app).await;

        let commands = [
            ("traffic", Some(r#"{"rps": 120, "spike": true}"#), "updated"),
            ("toggle", Some(r#"{"nodeId": "api", "down": true}"#), "toggled"),
            (
                "config",
                Some(r#"{"nodeId": "lb", "field": "backpressureEnabled", "value": true}"#),
                "configured",
            ),
            (
                "update-graph",
                Some(
                    r#"{
                        "nodes": [
                            {"id": "users", "type": "client"},
                            {"id": "api", "type": "appserver"}
                        ],
                        "edges": [{"source": "users", "target": "api"}]
                    }"#,
                ),
                "graph_updated",
            ),
            ("reset-queues", None, "queues_reset"),
            ("stop", None, "stopped"),
        ];

        for (command, body, status) in commands {
            let uri = format!("/api/simulate/{id}/{command}");
            let response = send(&app, "POST", &uri, body).await;
            assert_eq!(response.status(), StatusCode::OK, "{command}");
            let ack: Ack = json(response).await;
            assert_eq!(ack.status, status);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_commands() {
        let app = app(RegistryConfig::default());
        let id = create(&app).await;

        let uri = format!("/api/simulate/{id}/config");
        let response = send(
            &app,
            "POST",
            &uri,
            Some(r#"{"nodeId": "api", "field": "colour", "value": 1}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = json(response).await;
        assert!(body["error"].as_str().unwrap().contains("colour"));

        let uri = format!("/api/simulate/{id}/toggle");
        let response = send(&app, "POST", &uri, Some(r#"{"nodeId": "ghost", "down": true}"#)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&app, "POST", "/api/simulate/nope/stop", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let cyclic = r#"{
            "nodes": [{"id": "a", "type": "appserver"}, {"id": "b", "type": "appserver"}],
            "edges": [{"source": "a", "target": "b"}, {"source": "b", "target": "a"}]
        }"#;
        let response = send(&app, "POST", "/api/simulate", Some(cyclic)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_twice() {
        let app = app(RegistryConfig::default());
        let id = create(&app).await;
        let uri = format!("/api/simulate/{id}/stop");

        assert_eq!(send(&app, "POST", &uri, None).await.status(), StatusCode::OK);
        assert_eq!(
            send(&app, "POST", &uri, None).await.status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test(start_paused = true)]
    async fn session_limit() {
        let app = app(RegistryConfig::default().with_max_sessions(1));
        create(&app).await;

        let response = send(&app, "POST", "/api/simulate", Some(TOPOLOGY)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
