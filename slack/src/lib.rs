//! Slack front-end for the Basebone Oracle.
//!
//! Connects over Socket Mode, answers `app_mention` events through
//! [`basebone_core::ChatService`] and posts the final answer followed by
//! the prompting chain in a thread.
//!
//! Required environment variables:
//! - `SLACK_BOT_TOKEN` - Bot OAuth token (xoxb-...)
//! - `SLACK_APP_TOKEN` - App-level token for Socket Mode (xapp-...)
//!
//! The lower-case `slackbottoken` / `slackapptoken` are read as fallbacks.

pub mod bot;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod handler;
pub mod users;

pub use bot::{BotOptions, OracleBot};
pub use client::{BotIdentity, SlackClient, SlackUser};
pub use config::SlackConfig;
pub use error::{SlackError, SlackResult};
pub use handler::MentionHandler;
pub use users::UserDirectory;
