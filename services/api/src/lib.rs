//! services/api/src/lib.rs
//!
//! The composer service: adapters for the generative-text backend, the delivery
//! webhook and settings storage; the orchestrator that ties them together; and the
//! HTTP/WebSocket surface a browser client renders.

pub mod adapters;
pub mod composer;
pub mod config;
pub mod error;
pub mod web;
