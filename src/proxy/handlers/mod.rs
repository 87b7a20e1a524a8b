//! Request handlers for the proxy
//!
//! The informational endpoints answer from config alone; the chat completion
//! handler runs the full select → translate → forward → relay pipeline.

mod chat;
mod info;


pub(super) use chat::chat_completions;
pub(super) use info::{list_models, root, v1_root};
