//! Per-connection subscription sessions
//!
//! One task per authenticated stream. A session only ever touches its own
//! transport; fan-out reaches it through its subscriber queue.

pub mod context;
pub mod state;
pub mod subscription;

pub use context::SessionContext;
pub use state::{SessionPhase, SessionState};
pub use subscription::{Session, SessionOutcome, SessionShared};
