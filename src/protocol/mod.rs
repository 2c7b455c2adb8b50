//! Bouncer stream protocol
//!
//! A client opens one TLS stream, sends `Subscribe` as its first frame, and
//! from then on receives `ChatMessage`/`SystemNotice` frames while it may send
//! control requests at any time.
//!
//! ```text
//! Client                                   Bouncer
//!   |------- Subscribe{want_history} ------->|
//!   |<------ ChatMessage (history) ... ------|
//!   |<------ ChatMessage (live) ... ---------|
//!   |------- ReplayHistory{since} ---------->|
//!   |<------ ChatMessage (history) ... ------|
//!   |------- SendMessage / Shutdown -------->|
//! ```

pub mod codec;
pub mod constants;
pub mod message;

pub use codec::{FrameReader, FrameWriter};
pub use message::{ChatMessage, ClientRequest, ServerEvent};
