//! Lexipen: a writing assistant that attaches to a page, tracks its editable
//! text fields and offers AI transformations the user approves or rejects.

pub mod approval;
pub mod change_watcher;
pub mod config;
pub mod diagnostics;
pub mod field_registry;
pub mod host;
pub mod indicator;
pub mod logging;
pub mod models;
pub mod network;
pub mod overlay;
pub mod pipeline;
pub mod prompts;
pub mod service;
pub mod session;

pub use session::{AssistantSession, SessionOptions};
