//! Wire codes and sizes of the companion protocol.
//!
//! Byte 0 of every frame is one of the `CMD_*`, `RESP_CODE_*` or
//! `PUSH_CODE_*` values below. Commands and responses share the numeric
//! range; the envelope direction tells them apart.

// ============================================================================
// Commands (host → device)
// ============================================================================

/// Opens a session; answered with `SelfInfo`.
pub const CMD_APP_START: u8 = 1;
/// Direct message to a contact, addressed by key prefix.
pub const CMD_SEND_TXT_MSG: u8 = 2;
/// Message on a group channel.
pub const CMD_SEND_CHANNEL_TXT_MSG: u8 = 3;
/// Contact listing, optionally incremental from a `since` watermark.
pub const CMD_GET_CONTACTS: u8 = 4;
pub const CMD_GET_DEVICE_TIME: u8 = 5;
pub const CMD_SET_DEVICE_TIME: u8 = 6;
/// Broadcast this node's advert, zero-hop or flooded.
pub const CMD_SEND_SELF_ADVERT: u8 = 7;
pub const CMD_SET_ADVERT_NAME: u8 = 8;
/// Insert a contact, or overwrite the one with the same key.
pub const CMD_ADD_UPDATE_CONTACT: u8 = 9;
/// Pop one message from the device's offline queue.
pub const CMD_SYNC_NEXT_MESSAGE: u8 = 10;
/// Frequency, bandwidth, spreading factor and coding rate in one frame.
pub const CMD_SET_RADIO_PARAMS: u8 = 11;
pub const CMD_SET_RADIO_TX_POWER: u8 = 12;

// ============================================================================
// Responses (device → host)
// ============================================================================

pub const RESP_CODE_OK: u8 = 0;
/// Failure; may carry one `ERR_CODE_*` byte.
pub const RESP_CODE_ERR: u8 = 1;
/// Announces how many `RESP_CODE_CONTACT` frames follow.
pub const RESP_CODE_CONTACTS_START: u8 = 2;
pub const RESP_CODE_CONTACT: u8 = 3;
/// Closes a listing and carries the next `since` watermark.
pub const RESP_CODE_END_OF_CONTACTS: u8 = 4;
pub const RESP_CODE_SELF_INFO: u8 = 5;
/// Direct message queued for transmission; carries the expected ack.
pub const RESP_CODE_SENT: u8 = 6;
pub const RESP_CODE_CONTACT_MSG_RECV: u8 = 7;
pub const RESP_CODE_CHANNEL_MSG_RECV: u8 = 8;
pub const RESP_CODE_CURR_TIME: u8 = 9;
/// Offline queue is empty.
pub const RESP_CODE_NO_MORE_MESSAGES: u8 = 10;

// ============================================================================
// Pushes (unsolicited, device → host)
// ============================================================================

/// First code of the push range; every code below it is a response.
pub const PUSH_CODE_MIN: u8 = 0x80;
pub const PUSH_CODE_ADVERT: u8 = 0x80;
pub const PUSH_CODE_PATH_UPDATED: u8 = 0x81;
/// An ack for an earlier `Sent` arrived.
pub const PUSH_CODE_SEND_CONFIRMED: u8 = 0x82;
/// New messages can be pulled with `CMD_SYNC_NEXT_MESSAGE`.
pub const PUSH_CODE_MSG_WAITING: u8 = 0x83;

/// Whether `code` is in the push range.
pub const fn is_push_code(code: u8) -> bool {
    code >= PUSH_CODE_MIN
}

// ============================================================================
// Device error codes (payload of RESP_CODE_ERR)
// ============================================================================

pub const ERR_CODE_UNSUPPORTED_CMD: u8 = 1;
pub const ERR_CODE_NOT_FOUND: u8 = 2;
pub const ERR_CODE_TABLE_FULL: u8 = 3;
pub const ERR_CODE_BAD_STATE: u8 = 4;
pub const ERR_CODE_FILE_IO_ERROR: u8 = 5;
pub const ERR_CODE_ILLEGAL_ARG: u8 = 6;

// ============================================================================
// Field values
// ============================================================================

pub const TXT_TYPE_PLAIN: u8 = 0;
pub const TXT_TYPE_CLI_DATA: u8 = 1;
pub const TXT_TYPE_SIGNED_PLAIN: u8 = 2;

pub const ADV_TYPE_NONE: u8 = 0;
pub const ADV_TYPE_CHAT: u8 = 1;
pub const ADV_TYPE_REPEATER: u8 = 2;
pub const ADV_TYPE_ROOM_SERVER: u8 = 3;

/// `advert_type` byte of `CMD_SEND_SELF_ADVERT`.
pub const SELF_ADVERT_ZERO_HOP: u8 = 0;
pub const SELF_ADVERT_FLOOD: u8 = 1;

/// `path_len` of a message that arrived by direct routing.
pub const PATH_LEN_DIRECT: u8 = 0xFF;

// ============================================================================
// Envelope
// ============================================================================

/// `'<'`
pub const MARKER_HOST_TO_DEVICE: u8 = 0x3c;
/// `'>'`
pub const MARKER_DEVICE_TO_HOST: u8 = 0x3e;
/// Marker byte plus little-endian u16 length.
pub const ENVELOPE_HEADER_SIZE: usize = 3;
pub const MAX_ENVELOPE_PAYLOAD: usize = u16::MAX as usize;

// ============================================================================
// Sizes
// ============================================================================

pub const PUB_KEY_SIZE: usize = 32;
/// Key prefix used to address direct messages.
pub const PUB_KEY_PREFIX_SIZE: usize = 6;
pub const ACK_CODE_SIZE: usize = 4;
/// Width of the `out_path` field in contact records.
pub const MAX_PATH_SIZE: usize = 64;
/// Width of the `adv_name` field in contact records, terminator included.
pub const MAX_NAME_SIZE: usize = 32;
/// Default payload bound of [`FrameDecoder`](crate::FrameDecoder).
pub const MAX_FRAME_SIZE: usize = 256;
