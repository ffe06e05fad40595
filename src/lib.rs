//! mail-restyle — re-renders inbound email into a user-defined style.

pub mod config;
pub mod error;
pub mod llm;
pub mod mail;
pub mod pipeline;
pub mod server;
pub mod store;
pub mod styles;
pub mod webhook;
