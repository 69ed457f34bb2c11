//! Protocol constants

/// Frame type of a method frame
pub const FRAME_METHOD: u8 = 1;

/// Frame type of a content header frame
pub const FRAME_HEADER: u8 = 2;

/// Frame type of a content body frame
pub const FRAME_BODY: u8 = 3;

/// Frame type of a heartbeat frame
pub const FRAME_HEARTBEAT: u8 = 8;

/// Octet that terminates every frame
pub const FRAME_END: u8 = 206;

/// Smallest frame size a peer may negotiate
pub const FRAME_MIN_SIZE: u32 = 4096;

/// Size of the frame header (type, channel, size)
pub const FRAME_HEADER_SIZE: usize = 7;

/// Bytes a frame adds around its payload (header and frame end)
pub const FRAME_OVERHEAD: usize = FRAME_HEADER_SIZE + 1;

/// Class ids
pub mod class_id {
    /// connection
    pub const CONNECTION: u16 = 10;
    /// channel
    pub const CHANNEL: u16 = 20;
    /// exchange
    pub const EXCHANGE: u16 = 40;
    /// queue
    pub const QUEUE: u16 = 50;
    /// basic
    pub const BASIC: u16 = 60;
    /// confirm
    pub const CONFIRM: u16 = 85;
    /// tx
    pub const TX: u16 = 90;
}
