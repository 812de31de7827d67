//! Test fixtures
//!
//! Builders for messages, conversations and configurations pointing at a
//! local test server.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use wachat::client::{Config, SyncController, SyncSettings};
use wachat::shared::{AppConfig, Conversation, Message, Timestamp};

use super::mock_transport::MockRest;

/// Incoming message in `conversation_id` at `ts` seconds
pub fn incoming(conversation_id: &str, id: &str, ts: u64) -> Message {
    Message::incoming(id, conversation_id, format!("text {}", id), Timestamp::from_secs(ts))
}

/// Outgoing message in `conversation_id` at `ts` seconds
pub fn outgoing(conversation_id: &str, id: &str, ts: u64) -> Message {
    Message::outgoing(id, conversation_id, format!("text {}", id), Timestamp::from_secs(ts))
}

pub fn conversation(id: &str, name: &str, last_ts: Option<u64>, unread: u32) -> Conversation {
    let mut conversation = Conversation::new(id, name);
    if let Some(ts) = last_ts {
        conversation.last_message = format!("last message of {}", id);
        conversation.last_message_time = Some(Timestamp::from_secs(ts));
    }
    conversation.unread_count = unread;
    conversation
}

pub fn timestamps(messages: &[Message]) -> Vec<u64> {
    messages.iter().map(|m| m.timestamp.as_secs()).collect()
}

pub fn ids(messages: &[Message]) -> Vec<String> {
    messages.iter().map(|m| m.id.clone()).collect()
}

/// Controller over a fresh mock transport with default settings
pub fn harness() -> (Arc<MockRest>, SyncController) {
    harness_with(SyncSettings::default())
}

pub fn harness_with(settings: SyncSettings) -> (Arc<MockRest>, SyncController) {
    let rest = Arc::new(MockRest::new());
    let controller = SyncController::with_transport(rest.clone(), settings);
    (rest, controller)
}

pub fn short_timeout(millis: u64) -> SyncSettings {
    SyncSettings {
        request_timeout: Duration::from_millis(millis),
        ..SyncSettings::default()
    }
}

/// Configuration pointing the REST adapter at `server_url`
pub fn config_for(server_url: &str, token: Option<&str>) -> Config {
    let mut config = Config::with_builder(AppConfig::builder().server_url(server_url))
        .expect("valid test config");
    config.set_token(token.map(str::to_string));
    config
}

/// Configuration pointing the live client at `live_url`
pub fn live_config_for(live_url: &str) -> Config {
    Config::with_builder(AppConfig::builder().live_url(live_url)).expect("valid test config")
}

/// Configuration storing its session under `dir`
pub fn config_with_session_dir(server_url: &str, dir: &Path) -> Config {
    Config::with_builder(
        AppConfig::builder()
            .server_url(server_url)
            .token_file(dir.join("session.json")),
    )
    .expect("valid test config")
}

/// Poll `condition` until it holds, yielding to other tasks in between
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
