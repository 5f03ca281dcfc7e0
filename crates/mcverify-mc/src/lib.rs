//! Minecraft protocol implementation for account verification.
//!
//! This crate provides types and utilities for reading and writing the
//! handshake and login packets exchanged before a Minecraft client is
//! authenticated.

pub mod codec;
pub mod error;
pub mod packets;
pub mod varint;

pub use error::ProtocolError;
