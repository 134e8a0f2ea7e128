//! Frame layouts for every command, response and push frame.
//!
//! Command and reply codes overlap (code 1 is both `AppStart` and `Err`), so
//! dispatch-by-code uses two separate tables.

use crate::codec::{DecodedFrame, FrameDef};
use crate::constants::*;
use crate::error::ProtocolError;
use crate::field::{Field, Result, Transform};
use crate::frame::Direction;

/// Declares a `static` [`FrameDef`].
///
/// The field list is placed in an inner `const` so the slice gets a
/// `'static` lifetime, and the layout check in [`FrameDef::new`] runs at
/// compile time.
macro_rules! define_frame {
    ($(#[$meta:meta])* $vis:vis static $ident:ident = $name:literal, $code:expr, [$($field:expr),* $(,)?];) => {
        $(#[$meta])*
        $vis static $ident: FrameDef = {
            const FIELDS: &[Field] = &[$($field),*];
            FrameDef::new($name, $code, FIELDS)
        };
    };
}

const fn microdegrees(key: &'static str) -> Field {
    Field::int(key, 4).scaled(Transform::MICRODEGREES)
}

/// Host to device command frames.
pub mod cmd {
    use super::*;

    define_frame! {
        /// Starts the app session; answered by `SelfInfo`.
        pub static APP_START = "AppStart", CMD_APP_START, [
            Field::uint("app_ver", 1),
            Field::reserved(6),
            Field::text("app_name"),
        ];
    }

    define_frame! {
        /// Direct text message; answered by `Sent`.
        pub static SEND_TXT_MSG = "SendTxtMsg", CMD_SEND_TXT_MSG, [
            Field::uint("txt_type", 1),
            Field::uint("attempt", 1),
            Field::uint("sender_timestamp", 4),
            Field::hex("pub_key_prefix", PUB_KEY_PREFIX_SIZE),
            Field::text("text"),
        ];
    }

    define_frame! {
        /// Channel text message; answered by `Ok`.
        pub static SEND_CHANNEL_TXT_MSG = "SendChannelTxtMsg", CMD_SEND_CHANNEL_TXT_MSG, [
            Field::uint("txt_type", 1),
            Field::uint("channel_idx", 1),
            Field::uint("sender_timestamp", 4),
            Field::text("text"),
        ];
    }

    define_frame! {
        /// Contact listing, optionally incremental from a watermark.
        pub static GET_CONTACTS = "GetContacts", CMD_GET_CONTACTS, [
            Field::uint("since", 4).optional(),
        ];
    }

    define_frame! {
        pub static GET_DEVICE_TIME = "GetDeviceTime", CMD_GET_DEVICE_TIME, [];
    }

    define_frame! {
        pub static SET_DEVICE_TIME = "SetDeviceTime", CMD_SET_DEVICE_TIME, [
            Field::uint("epoch_secs", 4),
        ];
    }

    define_frame! {
        /// Absent `advert_type` means zero-hop.
        pub static SEND_SELF_ADVERT = "SendSelfAdvert", CMD_SEND_SELF_ADVERT, [
            Field::uint("advert_type", 1).optional(),
        ];
    }

    define_frame! {
        pub static SET_ADVERT_NAME = "SetAdvertName", CMD_SET_ADVERT_NAME, [
            Field::text("name"),
        ];
    }

    define_frame! {
        pub static ADD_UPDATE_CONTACT = "AddUpdateContact", CMD_ADD_UPDATE_CONTACT, [
            Field::hex("public_key", PUB_KEY_SIZE),
            Field::uint("contact_type", 1),
            Field::uint("flags", 1),
            Field::int("out_path_len", 1),
            Field::bin("out_path", MAX_PATH_SIZE),
            Field::cstr("adv_name", MAX_NAME_SIZE),
            Field::uint("last_advert", 4),
            microdegrees("adv_lat").optional(),
            microdegrees("adv_lon").optional(),
        ];
    }

    define_frame! {
        /// Pops one message from the device's offline queue.
        pub static SYNC_NEXT_MESSAGE = "SyncNextMessage", CMD_SYNC_NEXT_MESSAGE, [];
    }

    define_frame! {
        pub static SET_RADIO_PARAMS = "SetRadioParams", CMD_SET_RADIO_PARAMS, [
            Field::uint("radio_freq", 4),
            Field::uint("radio_bw", 4),
            Field::uint("radio_sf", 1),
            Field::uint("radio_cr", 1),
        ];
    }

    define_frame! {
        pub static SET_TX_POWER = "SetTxPower", CMD_SET_RADIO_TX_POWER, [
            Field::uint("tx_power", 1),
        ];
    }
}

/// Device to host response frames.
pub mod resp {
    use super::*;

    define_frame! {
        pub static OK = "Ok", RESP_CODE_OK, [];
    }

    define_frame! {
        /// Older firmware sends no error code.
        pub static ERR = "Err", RESP_CODE_ERR, [
            Field::uint("err_code", 1).optional(),
        ];
    }

    define_frame! {
        pub static CONTACTS_START = "ContactsStart", RESP_CODE_CONTACTS_START, [
            Field::uint("count", 4),
        ];
    }

    define_frame! {
        pub static CONTACT = "Contact", RESP_CODE_CONTACT, [
            Field::hex("public_key", PUB_KEY_SIZE),
            Field::uint("contact_type", 1),
            Field::uint("flags", 1),
            Field::int("out_path_len", 1),
            Field::bin("out_path", MAX_PATH_SIZE),
            Field::cstr("adv_name", MAX_NAME_SIZE),
            Field::uint("last_advert", 4),
            microdegrees("adv_lat"),
            microdegrees("adv_lon"),
            Field::uint("last_mod", 4),
        ];
    }

    define_frame! {
        /// Carries the watermark for the next incremental listing.
        pub static END_OF_CONTACTS = "EndOfContacts", RESP_CODE_END_OF_CONTACTS, [
            Field::uint("most_recent_lastmod", 4),
        ];
    }

    define_frame! {
        pub static SELF_INFO = "SelfInfo", RESP_CODE_SELF_INFO, [
            Field::uint("advert_type", 1),
            Field::uint("tx_power", 1),
            Field::uint("max_tx_power", 1),
            Field::hex("public_key", PUB_KEY_SIZE),
            microdegrees("adv_lat"),
            microdegrees("adv_lon"),
            Field::uint("multi_acks", 1),
            Field::uint("advert_loc_policy", 1),
            Field::uint("telemetry_modes", 1),
            Field::uint("manual_add_contacts", 1),
            Field::uint("radio_freq", 4),
            Field::uint("radio_bw", 4),
            Field::uint("radio_sf", 1),
            Field::uint("radio_cr", 1),
            Field::text("name"),
        ];
    }

    define_frame! {
        pub static SENT = "Sent", RESP_CODE_SENT, [
            Field::uint("send_type", 1),
            Field::hex("expected_ack_code", ACK_CODE_SIZE),
            Field::uint("suggested_timeout", 4),
        ];
    }

    define_frame! {
        pub static CONTACT_MSG_RECV = "ContactMsgRecv", RESP_CODE_CONTACT_MSG_RECV, [
            Field::hex("pub_key_prefix", PUB_KEY_PREFIX_SIZE),
            Field::uint("path_len", 1),
            Field::uint("txt_type", 1),
            Field::uint("sender_timestamp", 4),
            Field::text("text"),
        ];
    }

    define_frame! {
        pub static CHANNEL_MSG_RECV = "ChannelMsgRecv", RESP_CODE_CHANNEL_MSG_RECV, [
            Field::uint("channel_idx", 1),
            Field::uint("path_len", 1),
            Field::uint("txt_type", 1),
            Field::uint("sender_timestamp", 4),
            Field::text("text"),
        ];
    }

    define_frame! {
        pub static CURR_TIME = "CurrTime", RESP_CODE_CURR_TIME, [
            Field::uint("epoch_secs", 4),
        ];
    }

    define_frame! {
        pub static NO_MORE_MESSAGES = "NoMoreMessages", RESP_CODE_NO_MORE_MESSAGES, [];
    }
}

/// Unsolicited device to host frames.
pub mod push {
    use super::*;

    define_frame! {
        pub static ADVERT = "Advert", PUSH_CODE_ADVERT, [
            Field::hex("public_key", PUB_KEY_SIZE),
        ];
    }

    define_frame! {
        pub static PATH_UPDATED = "PathUpdated", PUSH_CODE_PATH_UPDATED, [
            Field::hex("public_key", PUB_KEY_SIZE),
        ];
    }

    define_frame! {
        /// Delivery acknowledgement for a previously `Sent` message.
        pub static SEND_CONFIRMED = "SendConfirmed", PUSH_CODE_SEND_CONFIRMED, [
            Field::hex("ack_code", ACK_CODE_SIZE),
            Field::uint("round_trip", 4),
        ];
    }

    define_frame! {
        /// The device has queued messages; drain with `SyncNextMessage`.
        pub static MSG_WAITING = "MsgWaiting", PUSH_CODE_MSG_WAITING, [];
    }
}

/// Every frame a host may send.
pub static COMMANDS: [&FrameDef; 12] = [
    &cmd::APP_START,
    &cmd::SEND_TXT_MSG,
    &cmd::SEND_CHANNEL_TXT_MSG,
    &cmd::GET_CONTACTS,
    &cmd::GET_DEVICE_TIME,
    &cmd::SET_DEVICE_TIME,
    &cmd::SEND_SELF_ADVERT,
    &cmd::SET_ADVERT_NAME,
    &cmd::ADD_UPDATE_CONTACT,
    &cmd::SYNC_NEXT_MESSAGE,
    &cmd::SET_RADIO_PARAMS,
    &cmd::SET_TX_POWER,
];

/// Every frame a device may send: responses followed by pushes.
pub static REPLIES: [&FrameDef; 15] = [
    &resp::OK,
    &resp::ERR,
    &resp::CONTACTS_START,
    &resp::CONTACT,
    &resp::END_OF_CONTACTS,
    &resp::SELF_INFO,
    &resp::SENT,
    &resp::CONTACT_MSG_RECV,
    &resp::CHANNEL_MSG_RECV,
    &resp::CURR_TIME,
    &resp::NO_MORE_MESSAGES,
    &push::ADVERT,
    &push::PATH_UPDATED,
    &push::SEND_CONFIRMED,
    &push::MSG_WAITING,
];

/// Looks up a frame received as a command.
pub fn command_definition(code: u8) -> Option<&'static FrameDef> {
    COMMANDS.iter().copied().find(|def| def.code == code)
}

/// Looks up a frame received as a reply (response or push).
pub fn reply_definition(code: u8) -> Option<&'static FrameDef> {
    REPLIES.iter().copied().find(|def| def.code == code)
}

/// Decodes a payload, selecting the definition by its leading code byte.
///
/// Host to device payloads are looked up among commands, device to host
/// payloads among responses and pushes.
pub fn decode_frame(direction: Direction, payload: &[u8]) -> Result<DecodedFrame> {
    let code = *payload.first().ok_or(ProtocolError::EmptyFrame)?;
    let (def, table) = match direction {
        Direction::HostToDevice => (command_definition(code), "command"),
        Direction::DeviceToHost => (reply_definition(code), "reply"),
    };
    def.ok_or(ProtocolError::UnknownFrameCode { code, table })?
        .decode(payload)
}
