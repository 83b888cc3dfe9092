//! Server module - TCP listener and client connection handling

mod connection;
mod listener;

pub use connection::{
    client_writer_task, handle_client, negotiate_name, write_line, ConnectionLimits, InputLine,
    LineReader,
};
pub use listener::ServerListener;
