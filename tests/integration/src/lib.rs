//! Integration test utilities for the gateway client
//!
//! This crate provides an in-process mock gateway and frame fixtures for running end-to-end
//! tests over real WebSocket connections.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
