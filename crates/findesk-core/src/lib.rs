//! Core findesk library (session store, context builder, streaming, clients, config).

pub mod client;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod export;
pub mod logging;
pub mod prompts;
pub mod search;
pub mod session;
pub mod stream;
