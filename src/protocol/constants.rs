//! Wire protocol constants

/// Default TCP port the bouncer listens on
pub const DEFAULT_PORT: u16 = 50051;

/// Frame header: 4-byte big-endian length of (kind + body)
pub const FRAME_HEADER_SIZE: usize = 4;

/// Largest accepted frame (kind + body)
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

// Client -> server frame kinds
pub const KIND_SUBSCRIBE: u8 = 0x01;
pub const KIND_REPLAY_HISTORY: u8 = 0x02;
pub const KIND_SEND_MESSAGE: u8 = 0x03;
pub const KIND_SHUTDOWN: u8 = 0x04;

// Server -> client frame kinds
pub const KIND_CHAT_MESSAGE: u8 = 0x81;
pub const KIND_SYSTEM_NOTICE: u8 = 0x82;

/// Retained messages per channel when the configuration leaves the limit unset
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Outbound queue depth per subscriber
pub const DEFAULT_SUBSCRIBER_QUEUE: usize = 1024;
