mod connection;
mod handler;
mod message;

pub use connection::WsConnection;
pub use handler::ws_handler;
pub use message::{ClientMessage, ServerMessage};
