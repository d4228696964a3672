use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::notify::realtime::Topic;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ClientCommand {
    Subscribe { topic: String },
    Unsubscribe { topic: String },
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// One connected client. Every client implicitly receives the global feed;
/// driver- and order-scoped events require a subscribe command first.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = BroadcastStream::new(state.realtime.subscribe());
    let mut topics: HashSet<Topic> = HashSet::new();

    info!("websocket client connected");

    loop {
        tokio::select! {
            event = events.next() => {
                match event {
                    Some(Ok(envelope)) => {
                        if !envelope.matches(&topics) {
                            continue;
                        }

                        let json = match serde_json::to_string(&envelope.event) {
                            Ok(json) => json,
                            Err(err) => {
                                warn!(error = %err, "failed to serialize event for ws");
                                continue;
                            }
                        };

                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                        warn!(skipped, "websocket client lagged; events dropped");
                    }
                    None => break,
                }
            }
            message = receiver.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => handle_command(&text, &mut topics),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    info!("websocket client disconnected");
}

fn handle_command(raw: &str, topics: &mut HashSet<Topic>) {
    let command: ClientCommand = match serde_json::from_str(raw) {
        Ok(command) => command,
        Err(err) => {
            warn!(error = %err, "ignoring malformed ws command");
            return;
        }
    };

    match command {
        ClientCommand::Subscribe { topic } => match Topic::parse(&topic) {
            Some(topic) => {
                topics.insert(topic);
            }
            None => warn!(topic = %topic, "ignoring subscription to unknown topic"),
        },
        ClientCommand::Unsubscribe { topic } => {
            if let Some(topic) = Topic::parse(&topic) {
                topics.remove(&topic);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::handle_command;
    use crate::notify::realtime::Topic;
    use uuid::Uuid;

    #[test]
    fn subscribe_and_unsubscribe_manage_the_topic_set() {
        let id = Uuid::new_v4();
        let mut topics = HashSet::new();

        handle_command(
            &format!(r#"{{"action":"subscribe","topic":"order:{id}"}}"#),
            &mut topics,
        );
        assert!(topics.contains(&Topic::Order(id)));

        handle_command(
            &format!(r#"{{"action":"unsubscribe","topic":"order:{id}"}}"#),
            &mut topics,
        );
        assert!(topics.is_empty());
    }

    #[test]
    fn malformed_commands_are_ignored() {
        let mut topics = HashSet::new();
        handle_command("not json", &mut topics);
        handle_command(r#"{"action":"subscribe","topic":"nonsense"}"#, &mut topics);
        assert!(topics.is_empty());
    }
}
