//! http-facade - HTTP request/response abstraction
//!
//! This crate provides a read-only view over an inbound HTTP request and a
//! fluent builder for the outbound response, including content negotiation,
//! proxy-aware client addresses, uploads, streamed downloads and an
//! interceptable send path.

pub mod http;
