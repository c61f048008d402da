//! Gateway: HTTP endpoint for the chat connector.
//!
//! `POST /api/messages` takes one activity per call and answers 202 once the turn is done.
//! `GET /` is a health probe.

mod auth;
mod server;

pub use auth::required_token;
pub use server::{app, run_gateway, GatewayState};
