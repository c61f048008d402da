//! pizzabot core library: activities, routing, the guided order form, per-conversation
//! sessions, reply channels, and the gateway used by the CLI.

pub mod activity;
pub mod bot;
pub mod card;
pub mod channels;
pub mod config;
pub mod form;
pub mod gateway;
pub mod init;
pub mod pizza;
pub mod routing;
pub mod session;
