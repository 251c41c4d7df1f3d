//! Request-handling core: decode, dispatch, encode
//!
//! Nothing in here touches a socket. [`handle_request`] turns the raw bytes of
//! one request into the status to send back.

pub mod command;
pub mod dispatch;
pub mod request;
pub mod status;

use command::Command;
use dispatch::Dispatcher;
use status::StatusOutcome;

/// Decode one raw request and dispatch it
pub async fn handle_request(raw: &[u8], dispatcher: &Dispatcher) -> StatusOutcome {
    let payload = match request::parse_payload(raw) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Rejected request: {}", e);
            return e.status();
        }
    };

    let command = match Command::decode(payload) {
        Ok(command) => command,
        Err(e) => {
            tracing::warn!("Invalid command: {}", e);
            return e.status();
        }
    };

    tracing::debug!("Handling {} for pid {}", command.name(), command.pid());

    match dispatcher.dispatch(&command).await {
        Ok(()) => StatusOutcome::Ok,
        Err(e) => {
            tracing::warn!("{} for pid {} failed: {}", command.name(), command.pid(), e);
            e.status()
        }
    }
}
