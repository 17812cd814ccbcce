//! Core IntelliChat library (stream decoding, transcript, transport, auth, config).

pub mod auth;
pub mod chat;
pub mod client;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod logging;
pub mod session;
