//! Socket Mode envelopes and the events we react to.
//!
//! Only `app_mention` events are handled. Everything else is acknowledged
//! and dropped.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SlackError, SlackResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketModeEnvelope {
    /// Missing on `hello` and `disconnect` frames.
    #[serde(default)]
    pub envelope_id: Option<String>,
    #[serde(rename = "type")]
    pub envelope_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<EventPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketModeAck {
    pub envelope_id: String,
}

impl SocketModeAck {
    pub fn new(envelope_id: impl Into<String>) -> Self {
        Self {
            envelope_id: envelope_id.into(),
        }
    }
}

/// Someone wrote `@bot ...` in a channel the bot is in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMentionEvent {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    pub channel: String,
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
}

impl AppMentionEvent {
    /// Bots (including this one) mentioning us are ignored.
    pub fn is_bot_message(&self) -> bool {
        self.bot_id.is_some() || self.subtype.as_deref() == Some("bot_message")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlackEvent {
    AppMention(AppMentionEvent),
    Unknown(String),
}

pub fn parse_event(payload: &EventPayload) -> SlackResult<SlackEvent> {
    let event_json = payload
        .event
        .as_ref()
        .ok_or_else(|| SlackError::InvalidPayload("missing event field".to_string()))?;

    let event_type = event_json
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or("unknown");

    debug!(event_type, "parsing event");

    match event_type {
        "app_mention" => Ok(SlackEvent::AppMention(serde_json::from_value(
            event_json.clone(),
        )?)),
        other => Ok(SlackEvent::Unknown(other.to_string())),
    }
}

/// Removes the bot's own `<@ID>` mention and turns every other user
/// mention into `@name`, using `resolve` to look names up.
pub fn normalize_mentions<F>(text: &str, bot_user_id: &str, mut resolve: F) -> String
where
    F: FnMut(&str) -> String,
{
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("<@") {
        let Some(len) = rest[start..].find('>') else {
            break;
        };

        out.push_str(&rest[..start]);
        let inner = &rest[start + 2..start + len];
        // <@U123|name> carries a display name we don't need
        let user_id = inner.split('|').next().unwrap_or(inner);

        if user_id != bot_user_id {
            out.push('@');
            out.push_str(&resolve(user_id));
        }
        rest = &rest[start + len + 1..];
    }
    out.push_str(rest);

    out.trim().to_string()
}

/// Extracts every `<@ID>` mention in order of appearance.
pub fn mentioned_user_ids(text: &str) -> Vec<&str> {
    let mut ids = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("<@") {
        let Some(len) = rest[start..].find('>') else {
            break;
        };
        let inner = &rest[start + 2..start + len];
        ids.push(inner.split('|').next().unwrap_or(inner));
        rest = &rest[start + len + 1..];
    }

    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(id: &str) -> String {
        match id {
            "U1" => "alice".to_string(),
            other => other.to_string(),
        }
    }

    #[test]
    fn strips_bot_mention() {
        assert_eq!(
            normalize_mentions("<@UBOT> what is 2+2?", "UBOT", names),
            "what is 2+2?"
        );
    }

    #[test]
    fn replaces_other_mentions_with_names() {
        assert_eq!(
            normalize_mentions("<@UBOT> who is <@U1|al> and <@U2>?", "UBOT", names),
            "who is @alice and @U2?"
        );
    }

    #[test]
    fn unterminated_mention_is_left_alone() {
        assert_eq!(normalize_mentions("hi <@U1", "UBOT", names), "hi <@U1");
    }

    #[test]
    fn collects_mentioned_ids() {
        assert_eq!(
            mentioned_user_ids("<@UBOT> ping <@U1|al> <@U2>"),
            vec!["UBOT", "U1", "U2"]
        );
    }

    #[test]
    fn parses_app_mention_envelope() {
        let raw = r#"{
            "envelope_id": "env-1",
            "type": "events_api",
            "payload": {
                "team_id": "T1",
                "event": {
                    "type": "app_mention",
                    "user": "U1",
                    "text": "<@UBOT> +forget",
                    "channel": "C1",
                    "ts": "1700000000.000100"
                }
            }
        }"#;

        let envelope: SocketModeEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.envelope_id.as_deref(), Some("env-1"));

        let payload = envelope.payload.unwrap();
        let SlackEvent::AppMention(event) = parse_event(&payload).unwrap() else {
            panic!("expected app mention");
        };
        assert_eq!(event.user.as_deref(), Some("U1"));
        assert_eq!(event.channel, "C1");
        assert!(!event.is_bot_message());
    }

    #[test]
    fn hello_frames_have_no_envelope_id() {
        let envelope: SocketModeEnvelope =
            serde_json::from_str(r#"{"type":"hello","num_connections":1}"#).unwrap();
        assert_eq!(envelope.envelope_type, "hello");
        assert!(envelope.envelope_id.is_none());
    }

    #[test]
    fn other_events_are_unknown() {
        let payload = EventPayload {
            team_id: None,
            event_id: None,
            event: Some(serde_json::json!({"type": "reaction_added"})),
        };
        assert_eq!(
            parse_event(&payload).unwrap(),
            SlackEvent::Unknown("reaction_added".to_string())
        );
    }

    #[test]
    fn missing_event_is_invalid() {
        let payload = EventPayload {
            team_id: None,
            event_id: None,
            event: None,
        };
        assert!(matches!(
            parse_event(&payload),
            Err(SlackError::InvalidPayload(_))
        ));
    }

    #[test]
    fn bot_mentions_are_flagged() {
        let event = AppMentionEvent {
            user: None,
            text: "hi".into(),
            channel: "C1".into(),
            ts: "1".into(),
            thread_ts: None,
            bot_id: Some("B1".into()),
            subtype: None,
        };
        assert!(event.is_bot_message());
    }

    #[test]
    fn ack_serializes_envelope_id() {
        let ack = serde_json::to_string(&SocketModeAck::new("env-9")).unwrap();
        assert_eq!(ack, r#"{"envelope_id":"env-9"}"#);
    }
}
