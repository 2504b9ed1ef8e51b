use super::*;
use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::Value;
use shared::protocol::STATUS_SUCCESSFUL;
use std::time::Duration;
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct ServerState {
    calls: Arc<Mutex<Vec<String>>>,
}

async fn current_state(
    State(state): State<ServerState>,
    Path(quiz): Path<String>,
) -> Json<SessionMessage> {
    state.calls.lock().await.push(format!("state:{quiz}"));
    Json(SessionMessage::new(
        step::CURRENT_STATE,
        json!({ "questionIndex": 1, "startTimestamp": 1_700_000_000_000_i64 }),
    ))
}

async fn start(
    State(state): State<ServerState>,
    Json(body): Json<QuizNamePayload>,
) -> Json<SessionMessage> {
    state.calls.lock().await.push(format!("start:{}", body.quiz_name));
    Json(SessionMessage::new(
        step::START,
        json!({ "startTimestamp": 1_700_000_005_000_i64 }),
    ))
}

async fn reading_confirmation(
    State(state): State<ServerState>,
    Json(body): Json<QuizNamePayload>,
) -> Json<SessionMessage> {
    state
        .calls
        .lock()
        .await
        .push(format!("reading:{}", body.quiz_name));
    Json(SessionMessage::new(
        step::READING_CONFIRMATION_REQUESTED,
        Value::Null,
    ))
}

async fn reset(
    State(state): State<ServerState>,
    Path(quiz): Path<String>,
) -> Json<SessionMessage> {
    state.calls.lock().await.push(format!("reset:{quiz}"));
    Json(SessionMessage::new(step::RESET, json!({})))
}

async fn spawn_api_server() -> Result<(String, ServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();
    let app = Router::new()
        .route("/api/v1/quiz/currentState/:quiz", get(current_state))
        .route("/api/v1/quiz/start", post(start))
        .route("/api/v1/quiz/reading-confirmation", post(reading_confirmation))
        .route("/api/v1/quiz/reset/:quiz", patch(reset))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}/api/v1/"), state))
}

async fn reply_with_roster(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(roster_socket)
}

// Answers every frame with a roster whose single member is named after the received step.
async fn roster_socket(mut socket: WebSocket) {
    while let Some(Ok(WsMessage::Text(text))) = socket.recv().await {
        let Ok(request) = serde_json::from_str::<SessionMessage>(&text) else {
            break;
        };
        let reply = SessionMessage::new(
            step::ALL_PLAYERS,
            json!({ "members": [{ "name": request.step, "responses": [] }] }),
        );
        let Ok(text) = serde_json::to_string(&reply) else {
            break;
        };
        if socket.send(WsMessage::Text(text)).await.is_err() {
            break;
        }
    }
}

async fn spawn_socket_server() -> Result<Url> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new().route("/", get(reply_with_roster));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(Url::parse(&format!("ws://{addr}/"))?)
}

#[tokio::test]
async fn http_api_uses_session_routes() {
    let (api_url, state) = spawn_api_server().await.expect("spawn server");
    let api = HttpSessionApi::new(api_url);

    let current = api.current_state("physics-101").await.expect("state");
    assert_eq!(current.status, STATUS_SUCCESSFUL);
    assert_eq!(
        current.start_timestamp().expect("timestamp").timestamp_millis(),
        1_700_000_000_000
    );
    assert_eq!(current.question_state().expect("state").question_index, Some(1));

    let started = api.start_question("physics-101").await.expect("start");
    assert_eq!(started.step, step::START);

    let reading = api
        .request_reading_confirmation("physics-101")
        .await
        .expect("reading confirmation");
    assert_eq!(reading.step, step::READING_CONFIRMATION_REQUESTED);

    let reset = api.reset_session("physics-101").await.expect("reset");
    assert_eq!(reset.step, step::RESET);

    assert_eq!(
        state.calls.lock().await.clone(),
        vec![
            "state:physics-101",
            "start:physics-101",
            "reading:physics-101",
            "reset:physics-101",
        ]
    );
}

#[tokio::test]
async fn http_api_reports_server_errors() {
    let (api_url, _state) = spawn_api_server().await.expect("spawn server");
    let api = HttpSessionApi::new(format!("{api_url}missing"));
    let err = api.start_question("physics-101").await.expect_err("404");
    assert!(err.to_string().contains("POST"), "unexpected error: {err}");
}

#[tokio::test]
async fn websocket_delivers_frames_to_subscribers() {
    let ws_url = spawn_socket_server().await.expect("spawn socket server");
    let connection = WebSocketConnection::connect(
        &ws_url,
        ConnectionCredentials {
            private_key: None,
            nickname: Some("ada".to_string()),
        },
    )
    .await
    .expect("connect");

    let mut events = connection.subscribe();
    connection
        .authorize("physics-101", Role::Attendee)
        .await
        .expect("authorize");

    let frame = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("frame in time")
        .expect("frame");
    assert_eq!(frame.step, step::ALL_PLAYERS);
    assert_eq!(frame.payload["members"][0]["name"], step::AUTHORIZE);
}

#[test]
fn owner_authorization_carries_private_key() {
    let credentials = ConnectionCredentials {
        private_key: Some("secret".to_string()),
        nickname: None,
    };
    let message = credentials
        .authorize_message("physics-101", Role::Owner)
        .expect("message");
    assert_eq!(message.step, step::AUTHORIZE_AS_OWNER);
    assert_eq!(
        message.payload,
        json!({ "quizName": "physics-101", "privateKey": "secret" })
    );
}

#[test]
fn owner_authorization_without_key_fails() {
    let err = ConnectionCredentials::default()
        .authorize_message("physics-101", Role::Owner)
        .expect_err("missing key");
    assert!(err.to_string().contains("private key"));
}

#[test]
fn attendee_authorization_carries_nickname() {
    let credentials = ConnectionCredentials {
        private_key: Some("ignored".to_string()),
        nickname: Some("ada".to_string()),
    };
    let message = credentials
        .authorize_message("physics-101", Role::Attendee)
        .expect("message");
    assert_eq!(message.step, step::AUTHORIZE);
    assert_eq!(
        message.payload,
        json!({ "quizName": "physics-101", "nickname": "ada" })
    );
}

#[test]
fn websocket_url_follows_api_scheme() {
    assert_eq!(
        websocket_url_for("https://quiz.example.org/api/v1")
            .expect("url")
            .as_str(),
        "wss://quiz.example.org/"
    );
    assert_eq!(
        websocket_url_for("http://127.0.0.1:3000/api/v1?x=1")
            .expect("url")
            .as_str(),
        "ws://127.0.0.1:3000/"
    );
    assert!(websocket_url_for("ftp://example.org").is_err());
}
