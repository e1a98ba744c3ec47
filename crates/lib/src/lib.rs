//! Hotline core library — Slack interaction routing, the steps interactions are routed to,
//! and the gateway that receives them. Used by the CLI.

pub mod auth;
pub mod channels;
pub mod config;
pub mod domain;
pub mod gateway;
pub mod init;
pub mod metadata;
pub mod routing;
pub mod steps;
