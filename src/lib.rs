//! parlor - a presence-and-routing line chat server
//!
//! This crate provides the core functionality for parlor, including:
//! - Session registry and the busy/free/in-room state of every user
//! - Two-party rooms with read-only supervisor observers
//! - Pending-request queues that re-pair users when they free up
//! - The line router that authorizes every state change
//!
//! # Architecture
//!
//! parlor uses a client-server model where:
//! - The server (`parlor-server`) accepts TCP connections, one task per client
//! - The client (`parlor`) is a plain line terminal
//! - Communication is newline-delimited text; `/`-prefixed lines are commands

pub mod client;
pub mod config;
pub mod error;
pub mod pending;
pub mod protocol;
pub mod room;
pub mod router;
pub mod server;
pub mod session;
