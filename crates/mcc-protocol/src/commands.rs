//! Commands that can be sent to the companion firmware.

use crate::codec::{DecodedFrame, FieldValues, FrameDef};
use crate::constants::*;
use crate::definitions::{cmd, decode_frame};
use crate::error::ProtocolError;
use crate::field::Result;
use crate::frame::Direction;
use crate::types::*;

/// Commands that can be sent to the companion firmware.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Start the app connection and get self info.
    AppStart {
        /// Protocol version the app understands.
        app_version: u8,
        /// App name string.
        app_name: String,
    },

    /// Send a text message to a contact.
    SendTextMessage {
        /// Message type (plain, CLI data, etc.).
        text_type: TextType,
        /// Retry attempt number.
        attempt: u8,
        /// Message timestamp.
        timestamp: u32,
        /// Recipient's public key prefix.
        recipient: PublicKeyPrefix,
        /// Message text.
        text: String,
    },

    /// Send a text message to a channel.
    SendChannelTextMessage {
        /// Message type (should be Plain).
        text_type: TextType,
        /// Channel index.
        channel_idx: u8,
        /// Message timestamp.
        timestamp: u32,
        /// Message text.
        text: String,
    },

    /// Get the list of contacts.
    GetContacts {
        /// Only return contacts modified after this watermark.
        since: Option<u32>,
    },

    /// Get the current device time.
    GetDeviceTime,

    /// Set the device time.
    SetDeviceTime {
        /// Unix timestamp in seconds.
        time_secs: u32,
    },

    /// Send a self-advertisement.
    SendSelfAdvert {
        /// Whether to flood (true) or zero-hop (false).
        flood: bool,
    },

    /// Set the advertisement name.
    SetAdvertName {
        /// New name.
        name: String,
    },

    /// Add or update a contact.
    AddUpdateContact {
        /// Contact information.
        contact: ContactInfo,
    },

    /// Get the next message from the offline queue.
    SyncNextMessage,

    /// Set radio parameters.
    SetRadioParams {
        /// Radio parameters.
        params: RadioParams,
    },

    /// Set TX power.
    SetTxPower {
        /// Power in dBm.
        power_dbm: u8,
    },
}

impl Command {
    /// Get the command code.
    pub fn code(&self) -> u8 {
        self.definition().code
    }

    /// Frame layout of this command.
    pub fn definition(&self) -> &'static FrameDef {
        match self {
            Command::AppStart { .. } => &cmd::APP_START,
            Command::SendTextMessage { .. } => &cmd::SEND_TXT_MSG,
            Command::SendChannelTextMessage { .. } => &cmd::SEND_CHANNEL_TXT_MSG,
            Command::GetContacts { .. } => &cmd::GET_CONTACTS,
            Command::GetDeviceTime => &cmd::GET_DEVICE_TIME,
            Command::SetDeviceTime { .. } => &cmd::SET_DEVICE_TIME,
            Command::SendSelfAdvert { .. } => &cmd::SEND_SELF_ADVERT,
            Command::SetAdvertName { .. } => &cmd::SET_ADVERT_NAME,
            Command::AddUpdateContact { .. } => &cmd::ADD_UPDATE_CONTACT,
            Command::SyncNextMessage => &cmd::SYNC_NEXT_MESSAGE,
            Command::SetRadioParams { .. } => &cmd::SET_RADIO_PARAMS,
            Command::SetTxPower { .. } => &cmd::SET_TX_POWER,
        }
    }

    /// Reply codes the firmware answers this command with.
    ///
    /// `Err` is accepted for every command. Listing and message sync replies
    /// are only the first frame of their exchange.
    pub fn reply_codes(&self) -> &'static [u8] {
        match self {
            Command::AppStart { .. } => &[RESP_CODE_SELF_INFO, RESP_CODE_ERR],
            Command::SendTextMessage { .. } => &[RESP_CODE_SENT, RESP_CODE_ERR],
            Command::GetContacts { .. } => &[RESP_CODE_CONTACTS_START, RESP_CODE_ERR],
            Command::GetDeviceTime => &[RESP_CODE_CURR_TIME, RESP_CODE_ERR],
            Command::SyncNextMessage => &[
                RESP_CODE_CONTACT_MSG_RECV,
                RESP_CODE_CHANNEL_MSG_RECV,
                RESP_CODE_NO_MORE_MESSAGES,
                RESP_CODE_ERR,
            ],
            Command::SendChannelTextMessage { .. }
            | Command::SetDeviceTime { .. }
            | Command::SendSelfAdvert { .. }
            | Command::SetAdvertName { .. }
            | Command::AddUpdateContact { .. }
            | Command::SetRadioParams { .. }
            | Command::SetTxPower { .. } => &[RESP_CODE_OK, RESP_CODE_ERR],
        }
    }

    /// Field values for the frame codec.
    pub fn values(&self) -> FieldValues {
        match self {
            Command::AppStart {
                app_version,
                app_name,
            } => FieldValues::new()
                .with("app_ver", *app_version)
                .with("app_name", app_name.as_str()),
            Command::SendTextMessage {
                text_type,
                attempt,
                timestamp,
                recipient,
                text,
            } => FieldValues::new()
                .with("txt_type", u8::from(*text_type))
                .with("attempt", *attempt)
                .with("sender_timestamp", *timestamp)
                .with("pub_key_prefix", recipient.to_hex())
                .with("text", text.as_str()),
            Command::SendChannelTextMessage {
                text_type,
                channel_idx,
                timestamp,
                text,
            } => FieldValues::new()
                .with("txt_type", u8::from(*text_type))
                .with("channel_idx", *channel_idx)
                .with("sender_timestamp", *timestamp)
                .with("text", text.as_str()),
            Command::GetContacts { since } => FieldValues::new().with_opt("since", *since),
            Command::SetDeviceTime { time_secs } => {
                FieldValues::new().with("epoch_secs", *time_secs)
            }
            Command::SendSelfAdvert { flood } => FieldValues::new().with(
                "advert_type",
                if *flood { SELF_ADVERT_FLOOD } else { SELF_ADVERT_ZERO_HOP },
            ),
            Command::SetAdvertName { name } => FieldValues::new().with("name", name.as_str()),
            Command::AddUpdateContact { contact } => contact.to_values(),
            Command::SetRadioParams { params } => params.extend_values(FieldValues::new()),
            Command::SetTxPower { power_dbm } => FieldValues::new().with("tx_power", *power_dbm),
            Command::GetDeviceTime | Command::SyncNextMessage => FieldValues::new(),
        }
    }

    /// Encode the command to a frame payload.
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.definition().encode(&self.values())
    }

    /// Rebuild a command from a frame decoded on the device side.
    pub fn from_frame(frame: &DecodedFrame) -> Result<Self> {
        let v = &frame.values;
        let command = match frame.code {
            CMD_APP_START => Command::AppStart {
                app_version: v.u8("app_ver")?,
                app_name: v.text("app_name")?.to_string(),
            },
            CMD_SEND_TXT_MSG => Command::SendTextMessage {
                text_type: v.u8("txt_type")?.into(),
                attempt: v.u8("attempt")?,
                timestamp: v.u32("sender_timestamp")?,
                recipient: PublicKeyPrefix(v.hex_array("pub_key_prefix")?),
                text: v.text("text")?.to_string(),
            },
            CMD_SEND_CHANNEL_TXT_MSG => Command::SendChannelTextMessage {
                text_type: v.u8("txt_type")?.into(),
                channel_idx: v.u8("channel_idx")?,
                timestamp: v.u32("sender_timestamp")?,
                text: v.text("text")?.to_string(),
            },
            CMD_GET_CONTACTS => Command::GetContacts {
                since: v.opt_u32("since")?,
            },
            CMD_GET_DEVICE_TIME => Command::GetDeviceTime,
            CMD_SET_DEVICE_TIME => Command::SetDeviceTime {
                time_secs: v.u32("epoch_secs")?,
            },
            CMD_SEND_SELF_ADVERT => Command::SendSelfAdvert {
                flood: v.opt_u8("advert_type")? == Some(SELF_ADVERT_FLOOD),
            },
            CMD_SET_ADVERT_NAME => Command::SetAdvertName {
                name: v.text("name")?.to_string(),
            },
            CMD_ADD_UPDATE_CONTACT => Command::AddUpdateContact {
                contact: ContactInfo::from_values(v)?,
            },
            CMD_SYNC_NEXT_MESSAGE => Command::SyncNextMessage,
            CMD_SET_RADIO_PARAMS => Command::SetRadioParams {
                params: RadioParams {
                    freq_khz: v.u32("radio_freq")?,
                    bandwidth_hz: v.u32("radio_bw")?,
                    spreading_factor: v.u8("radio_sf")?,
                    coding_rate: v.u8("radio_cr")?,
                },
            },
            CMD_SET_RADIO_TX_POWER => Command::SetTxPower {
                power_dbm: v.u8("tx_power")?,
            },
            code => {
                return Err(ProtocolError::UnexpectedFrame {
                    code,
                    name: frame.name,
                })
            }
        };
        Ok(command)
    }

    /// Decode a command payload.
    pub fn decode(data: &[u8]) -> Result<Self> {
        Self::from_frame(&decode_frame(Direction::HostToDevice, data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_start_layout() {
        let cmd = Command::AppStart {
            app_version: 1,
            app_name: "MCC".to_string(),
        };
        let encoded = cmd.encode().unwrap();
        assert_eq!(encoded[0], CMD_APP_START);
        assert_eq!(encoded[1], 1);
        assert_eq!(&encoded[2..8], &[0u8; 6]);
        assert_eq!(&encoded[8..], b"MCC");
    }

    #[test]
    fn test_get_contacts_since() {
        let cmd = Command::GetContacts { since: None };
        assert_eq!(cmd.encode().unwrap(), vec![CMD_GET_CONTACTS]);

        let cmd = Command::GetContacts { since: Some(1000) };
        let encoded = cmd.encode().unwrap();
        assert_eq!(encoded.len(), 5);
        assert_eq!(&encoded[1..], &1000u32.to_le_bytes());
    }

    #[test]
    fn test_self_advert_flood() {
        let encoded = Command::SendSelfAdvert { flood: false }.encode().unwrap();
        assert_eq!(encoded, vec![CMD_SEND_SELF_ADVERT, SELF_ADVERT_ZERO_HOP]);
        let encoded = Command::SendSelfAdvert { flood: true }.encode().unwrap();
        assert_eq!(encoded, vec![CMD_SEND_SELF_ADVERT, SELF_ADVERT_FLOOD]);

        // Older hosts omit the byte entirely.
        let bare = Command::decode(&[CMD_SEND_SELF_ADVERT]).unwrap();
        assert_eq!(bare, Command::SendSelfAdvert { flood: false });
    }

    #[test]
    fn test_send_text_message_layout() {
        let cmd = Command::SendTextMessage {
            text_type: TextType::Plain,
            attempt: 0,
            timestamp: 0x1234_5678,
            recipient: PublicKeyPrefix([1, 2, 3, 4, 5, 6]),
            text: "Hello".to_string(),
        };
        let encoded = cmd.encode().unwrap();
        assert_eq!(encoded[0], CMD_SEND_TXT_MSG);
        assert_eq!(encoded[1], TXT_TYPE_PLAIN);
        assert_eq!(encoded[2], 0);
        assert_eq!(&encoded[3..7], &0x1234_5678u32.to_le_bytes());
        assert_eq!(&encoded[7..13], &[1, 2, 3, 4, 5, 6]);
        assert_eq!(&encoded[13..], b"Hello");
    }

    #[test]
    fn test_contact_name_too_long() {
        let contact = ContactInfo {
            name: "x".repeat(MAX_NAME_SIZE),
            ..Default::default()
        };
        let err = Command::AddUpdateContact { contact }.encode().unwrap_err();
        assert!(matches!(err, ProtocolError::FieldTooLong { key: "adv_name", .. }));
    }

    #[test]
    fn test_decode_roundtrip() {
        let commands = [
            Command::SetRadioParams {
                params: RadioParams::default(),
            },
            Command::SetTxPower { power_dbm: 20 },
            Command::SyncNextMessage,
            Command::AddUpdateContact {
                contact: ContactInfo {
                    name: "relay".into(),
                    out_path_len: 1,
                    out_path: vec![0x42],
                    latitude: 12.5,
                    longitude: -3.25,
                    ..Default::default()
                },
            },
        ];
        for cmd in commands {
            let decoded = Command::decode(&cmd.encode().unwrap()).unwrap();
            assert_eq!(decoded, cmd);
        }
    }

    #[test]
    fn test_reply_codes_include_err() {
        assert!(Command::GetDeviceTime.reply_codes().contains(&RESP_CODE_ERR));
        assert_eq!(
            Command::SetTxPower { power_dbm: 1 }.reply_codes(),
            &[RESP_CODE_OK, RESP_CODE_ERR]
        );
    }
}
