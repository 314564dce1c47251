//! Daemon support: configuration and the observer endpoint.
//!
//! This module provides:
//! - Configuration types and file loading (`config`)
//! - A TCP transport carrying line-delimited JSON (`transport`)
//!
//! # Transport Extensibility
//!
//! The core only depends on [`ObserverSink`](crate::ObserverSink); other
//! push channels (websockets, SSE) attach through it the same way the TCP
//! transport does.

pub mod config;
pub mod transport;

pub use transport::serve;
