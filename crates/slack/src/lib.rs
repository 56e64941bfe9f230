//! Slack interface for refbot.
//!
//! - **Socket Mode** (`socket`, `transport`) - envelope loop with reconnection over a WebSocket
//! - **Events** (`events`) - envelope parsing and per-event-type handlers
//! - **Commands** (`commands`) - cooldown gate, lookups and rendered replies
//! - **Web API** (`web`) - `auth.test`, `apps.connections.open`, `chat.postMessage`
//!
//! ```text
//! WebSocket → SocketModeRunner → EventDispatcher → MessageHandler
//!                                                      ↓
//!            chat.postMessage ← MessageSink ← CommandDispatcher → GitHub / Jira
//! ```

pub mod commands;
pub mod events;
pub mod socket;
pub mod transport;
pub mod web;
