/// RTP version 2, no padding, no extension, no CSRCs.
pub const RTP_VERSION_BYTE: u8 = 0x80;

/// Dynamic payload type used for Opus.
pub const RTP_OPUS_PAYLOAD_TYPE: u8 = 0x78;

/// RTP timestamp advance per 20 ms frame at 48 kHz.
pub const RTP_TIMESTAMP_STEP: u32 = 960;

pub const RTP_HEADER_LEN: usize = 12;
