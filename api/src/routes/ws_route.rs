//! The per-connection protocol state machine and streaming relay.
//!
//! Connection lifecycle: CONNECTED → (login | query | logout)* → CLOSED.
//! Malformed messages produce typed error responses and keep the
//! connection open; only transport failures close it. Answer fragments
//! are forwarded the moment the inference service produces them, and the
//! history/fact side effects are committed after the stream ends. Partial
//! answers are committed too; they still carry informational value.

use std::time::Instant;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use context_fusion::prompt;
use llm_service::services::open_ai_service::StreamEvent;
use nlp_core::extract_facts;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::core::app_state::AppState;
use crate::protocol::{ClientMessage, ServerMessage};

/// Upgrades the connection and hands it to the protocol loop.
pub async fn ws_route(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    while let Some(received) = socket.recv().await {
        let message = match received {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "websocket transport error");
                break;
            }
        };

        if dispatch(&mut socket, &state, message.as_str()).await.is_err() {
            // The peer is gone; dropping the socket (and any in-flight
            // stream receiver) cancels upstream work.
            break;
        }
    }
    info!("websocket connection closed");
}

/// Routes one raw client message. `Err` means the socket is unusable.
async fn dispatch(socket: &mut WebSocket, state: &AppState, raw: &str) -> Result<(), ()> {
    let parsed: Result<ClientMessage, _> = serde_json::from_str(raw);
    let message = match parsed {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "malformed client message");
            return send(
                socket,
                &ServerMessage::Error {
                    error: "Invalid message".to_string(),
                },
            )
            .await;
        }
    };

    match message {
        ClientMessage::Login { username, password } => {
            handle_login(socket, state, &username, &password).await
        }
        ClientMessage::Logout { session_id } => {
            let response = if session_id.is_none() {
                ServerMessage::LogoutResponse {
                    error: Some("Not logged in".to_string()),
                }
            } else {
                ServerMessage::LogoutResponse { error: None }
            };
            send(socket, &response).await
        }
        ClientMessage::Query {
            query,
            session_id,
            user_id,
        } => handle_query(socket, state, query.trim(), &session_id, &user_id).await,
    }
}

async fn handle_login(
    socket: &mut WebSocket,
    state: &AppState,
    username: &str,
    password: &str,
) -> Result<(), ()> {
    match state.credentials.authenticate(username, password).await {
        Some(user_id) => {
            let session_id = Uuid::new_v4().simple().to_string();
            info!(%user_id, "login successful");
            send(socket, &ServerMessage::login_ok(session_id, user_id)).await?;
            send_stats(socket, state, None, None).await
        }
        None => {
            info!(%username, "login failed");
            send(socket, &ServerMessage::login_failed()).await
        }
    }
}

async fn handle_query(
    socket: &mut WebSocket,
    state: &AppState,
    query: &str,
    session_id: &str,
    user_id: &str,
) -> Result<(), ()> {
    if query.is_empty() {
        return send(socket, &ServerMessage::fragment("No question provided.", true)).await;
    }

    // Fuse context and build the prompt.
    let fused = match state.fusion.fuse(query, session_id).await {
        Ok(f) => f,
        Err(e) => {
            error!(error = %e, "context fusion failed");
            let msg = format!("Error: context fusion failed: {e}");
            return send(socket, &ServerMessage::fragment(msg, true)).await;
        }
    };

    let facts = match state.store.user_facts(session_id, 5).await {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "fact lookup failed, continuing without facts");
            Vec::new()
        }
    };
    let system_prompt = prompt::build_system_prompt(&facts);
    let user_prompt = prompt::build_user_prompt(&fused.text, query);

    // Stream the answer, relaying each fragment as it arrives.
    let generation_start = Instant::now();
    let mut relay = StreamRelay::new();

    match state.llm.chat_stream(&system_prompt, &user_prompt).await {
        Ok(mut rx) => {
            while let Some(event) = rx.recv().await {
                let (messages, finished) = relay.on_event(event, generation_start);
                for msg in &messages {
                    send(socket, msg).await?;
                }
                if finished {
                    break;
                }
            }
        }
        Err(e) => {
            error!(error = %e, "inference service connection failed");
            let msg = format!("Error: inference service connection failed: {e}");
            send(socket, &ServerMessage::fragment(msg, true)).await?;
        }
    }

    let generation = generation_start.elapsed().as_secs_f64();
    info!(
        %query,
        answer_len = relay.answer.len(),
        ttfb = relay.ttfb.unwrap_or(0.0),
        generation,
        "response generated"
    );

    // Side effects: one history record per exchange (partial answers
    // included), then fact extraction on the original query.
    if let Err(e) = state
        .store
        .add_to_history(query, &relay.answer, session_id, user_id)
        .await
    {
        error!(error = %e, "failed to persist history record");
    }

    match extract_facts(state.parser.as_ref(), query).await {
        Ok(facts) if facts != ["none"] => {
            if let Err(e) = state.store.store_user_facts(&facts, session_id, query).await {
                error!(error = %e, "failed to persist user facts");
            }
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "fact extraction failed"),
    }

    send_stats(socket, state, relay.ttfb, Some(generation)).await
}

async fn send_stats(
    socket: &mut WebSocket,
    state: &AppState,
    ttfb: Option<f64>,
    generation: Option<f64>,
) -> Result<(), ()> {
    let chunk_count = match state.store.docs().point_count().await {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "failed to read corpus size");
            0
        }
    };
    send(
        socket,
        &ServerMessage::Stats {
            chunk_count,
            ttfb,
            generation,
        },
    )
    .await
}

async fn send(socket: &mut WebSocket, msg: &ServerMessage) -> Result<(), ()> {
    let text = match serde_json::to_string(msg) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "failed to serialize server message");
            return Ok(());
        }
    };
    socket
        .send(Message::Text(text.into()))
        .await
        .map_err(|_| ())
}

/// Accumulates the streamed answer and decides what to forward.
///
/// Guarantees exactly one `done=true` fragment per exchange regardless of
/// how the stream ends.
struct StreamRelay {
    answer: String,
    ttfb: Option<f64>,
    done_sent: bool,
}

impl StreamRelay {
    fn new() -> Self {
        Self {
            answer: String::new(),
            ttfb: None,
            done_sent: false,
        }
    }

    fn on_event(
        &mut self,
        event: StreamEvent,
        generation_start: Instant,
    ) -> (Vec<ServerMessage>, bool) {
        match event {
            StreamEvent::Delta(content) => {
                if self.ttfb.is_none() {
                    self.ttfb = Some(generation_start.elapsed().as_secs_f64());
                }
                self.answer.push_str(&content);
                (vec![ServerMessage::fragment(content, false)], false)
            }
            StreamEvent::Error(reason) => {
                let msg = format!("Error: {reason}");
                self.done_sent = true;
                (vec![ServerMessage::fragment(msg, true)], false)
            }
            StreamEvent::Done => {
                if self.done_sent {
                    (Vec::new(), true)
                } else {
                    self.done_sent = true;
                    (vec![ServerMessage::fragment("", true)], true)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn done_count(messages: &[ServerMessage]) -> usize {
        messages
            .iter()
            .filter(|m| matches!(m, ServerMessage::QueryResponse { done: true, .. }))
            .count()
    }

    #[test]
    fn successful_stream_ends_with_exactly_one_done() {
        let start = Instant::now();
        let mut relay = StreamRelay::new();
        let mut sent = Vec::new();

        for event in [
            StreamEvent::Delta("Hel".into()),
            StreamEvent::Delta("lo".into()),
            StreamEvent::Done,
        ] {
            let (messages, _) = relay.on_event(event, start);
            sent.extend(messages);
        }

        assert_eq!(relay.answer, "Hello");
        assert_eq!(done_count(&sent), 1);
        assert!(relay.ttfb.is_some());
    }

    #[test]
    fn error_stream_still_ends_with_exactly_one_done() {
        let start = Instant::now();
        let mut relay = StreamRelay::new();
        let mut sent = Vec::new();

        for event in [
            StreamEvent::Delta("partial".into()),
            StreamEvent::Error("connection reset".into()),
            StreamEvent::Done,
        ] {
            let (messages, _) = relay.on_event(event, start);
            sent.extend(messages);
        }

        // The partial answer is preserved for the history commit.
        assert_eq!(relay.answer, "partial");
        assert_eq!(done_count(&sent), 1);
    }

    #[test]
    fn fragments_forward_in_arrival_order() {
        let start = Instant::now();
        let mut relay = StreamRelay::new();
        let mut texts = Vec::new();

        for event in [
            StreamEvent::Delta("a".into()),
            StreamEvent::Delta("b".into()),
            StreamEvent::Delta("c".into()),
        ] {
            let (messages, finished) = relay.on_event(event, start);
            assert!(!finished);
            for m in messages {
                if let ServerMessage::QueryResponse { content, .. } = m {
                    texts.push(content);
                }
            }
        }
        assert_eq!(texts, vec!["a", "b", "c"]);
    }
}
