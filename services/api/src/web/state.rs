//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::composer::Composer;

/// The shared application state, created once at startup and passed to all handlers.
///
/// One composer serves every connected client; each WebSocket only subscribes to it.
#[derive(Clone)]
pub struct AppState {
    pub composer: Composer,
}
