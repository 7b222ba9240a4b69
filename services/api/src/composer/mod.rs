pub mod controller;
pub mod state;
pub mod timer;

pub use controller::{AiOutcome, Composer, ComposerError, RejectReason, SendOutcome};
pub use state::{ComposerSnapshot, Timings};
