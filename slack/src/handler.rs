//! Turns an `app_mention` into a question for the chat service and posts
//! the reply back to the channel.

use std::sync::Arc;

use basebone_core::{Answer, ChatService, IncomingMessage, Reply};
use tracing::{info, warn};

use crate::client::{BotIdentity, SlackClient};
use crate::error::{SlackError, SlackResult};
use crate::events::{AppMentionEvent, mentioned_user_ids, normalize_mentions};
use crate::users::UserDirectory;

pub const FINAL_ANSWER_PREFIX: &str = "Final Answer: ";
pub const CHAIN_HEADER: &str = "Prompting Chain:";

pub struct MentionHandler {
    client: SlackClient,
    users: Arc<UserDirectory>,
    service: Arc<ChatService>,
    identity: BotIdentity,
}

impl MentionHandler {
    pub fn new(
        client: SlackClient,
        users: Arc<UserDirectory>,
        service: Arc<ChatService>,
        identity: BotIdentity,
    ) -> Self {
        Self {
            client,
            users,
            service,
            identity,
        }
    }

    pub async fn handle(&self, event: AppMentionEvent) -> SlackResult<()> {
        if event.is_bot_message() {
            return Ok(());
        }
        let user_id = event
            .user
            .clone()
            .ok_or_else(|| SlackError::InvalidPayload("app_mention without user".into()))?;

        let text = self.normalize(&event.text).await;
        info!(user = %user_id, channel = %event.channel, "handling mention");

        let message = IncomingMessage::new(&user_id, &event.channel, text);
        let reply = self.service.handle(&message).await;
        let thread_ts = event.thread_ts.as_deref();

        match reply {
            Reply::Answer(answer) => self.post_answer(&event.channel, thread_ts, &answer).await,
            other => {
                self.client
                    .post_message(&event.channel, &other.text(), thread_ts)
                    .await?;
                Ok(())
            }
        }
    }

    async fn normalize(&self, text: &str) -> String {
        let others: Vec<&str> = mentioned_user_ids(text)
            .into_iter()
            .filter(|id| *id != self.identity.user_id)
            .collect();
        let names = if others.is_empty() {
            Default::default()
        } else {
            self.users.lookup(&others).await
        };

        normalize_mentions(text, &self.identity.user_id, |id| {
            names.get(id).cloned().unwrap_or_else(|| id.to_string())
        })
    }

    /// The answer goes to the channel; the chain goes in a thread under it.
    async fn post_answer(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        answer: &Answer,
    ) -> SlackResult<()> {
        let (answer_text, chain_text) = format_answer(answer, &self.identity);

        let answer_ts = self.client.post_message(channel, &answer_text, thread_ts).await?;

        let chain_thread = thread_ts.unwrap_or(&answer_ts);
        if let Err(e) = self
            .client
            .post_message(channel, &chain_text, Some(chain_thread))
            .await
        {
            warn!(channel, error = %e, "failed to post prompting chain");
        }
        Ok(())
    }
}

/// `<@BOT>` reads as `@botname` in both messages.
pub fn format_answer(answer: &Answer, identity: &BotIdentity) -> (String, String) {
    let own_mention = format!("<@{}>", identity.user_id);
    let own_name = format!("@{}", identity.name);

    let text = format!("{}{}", FINAL_ANSWER_PREFIX, answer.text).replace(&own_mention, &own_name);
    let chain = format!("{}\n{}", CHAIN_HEADER, answer.chain.join("\n"))
        .replace(&own_mention, &own_name);

    (text, chain)
}
