//! Responses and push notifications from the companion firmware.

use crate::codec::{DecodedFrame, FieldValues, FrameDef};
use crate::constants::*;
use crate::definitions::{decode_frame, push, resp};
use crate::error::{FirmwareErrorCode, ProtocolError};
use crate::field::Result;
use crate::frame::Direction;
use crate::types::*;

#[cfg(feature = "serde")]
use serde::Serialize;

/// Responses to commands.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Generic success.
    Ok,
    /// Generic failure.
    Err(FirmwareErrorCode),
    /// Start of a contact listing.
    ContactsStart {
        /// Number of `Contact` frames that follow.
        count: u32,
    },
    /// One contact record.
    Contact(ContactInfo),
    /// End of a contact listing.
    EndOfContacts {
        /// Watermark for the next incremental listing.
        most_recent_lastmod: u32,
    },
    /// Self info (reply to `AppStart`).
    SelfInfo(SelfInfo),
    /// Direct message accepted for sending.
    Sent(SentInfo),
    /// Queued direct message.
    ContactMessage(ContactMessage),
    /// Queued channel message.
    ChannelMessage(ChannelMessage),
    /// Device time.
    CurrentTime {
        /// Unix timestamp in seconds.
        epoch_secs: u32,
    },
    /// Message queue drained.
    NoMoreMessages,
}

impl Response {
    /// Frame layout of this response.
    pub fn definition(&self) -> &'static FrameDef {
        match self {
            Response::Ok => &resp::OK,
            Response::Err(_) => &resp::ERR,
            Response::ContactsStart { .. } => &resp::CONTACTS_START,
            Response::Contact(_) => &resp::CONTACT,
            Response::EndOfContacts { .. } => &resp::END_OF_CONTACTS,
            Response::SelfInfo(_) => &resp::SELF_INFO,
            Response::Sent(_) => &resp::SENT,
            Response::ContactMessage(_) => &resp::CONTACT_MSG_RECV,
            Response::ChannelMessage(_) => &resp::CHANNEL_MSG_RECV,
            Response::CurrentTime { .. } => &resp::CURR_TIME,
            Response::NoMoreMessages => &resp::NO_MORE_MESSAGES,
        }
    }

    /// Get the response code.
    pub fn code(&self) -> u8 {
        self.definition().code
    }

    /// Build a typed response from a decoded frame.
    pub fn from_frame(frame: &DecodedFrame) -> Result<Self> {
        let v = &frame.values;
        let response = match frame.code {
            RESP_CODE_OK => Response::Ok,
            RESP_CODE_ERR => Response::Err(
                v.opt_u8("err_code")?
                    .map_or(FirmwareErrorCode::Unspecified, FirmwareErrorCode::from),
            ),
            RESP_CODE_CONTACTS_START => Response::ContactsStart {
                count: v.u32("count")?,
            },
            RESP_CODE_CONTACT => Response::Contact(ContactInfo::from_values(v)?),
            RESP_CODE_END_OF_CONTACTS => Response::EndOfContacts {
                most_recent_lastmod: v.u32("most_recent_lastmod")?,
            },
            RESP_CODE_SELF_INFO => Response::SelfInfo(SelfInfo::from_values(v)?),
            RESP_CODE_SENT => Response::Sent(SentInfo {
                send_type: v.u8("send_type")?,
                expected_ack: AckCode(v.hex_array("expected_ack_code")?),
                suggested_timeout_ms: v.u32("suggested_timeout")?,
            }),
            RESP_CODE_CONTACT_MSG_RECV => Response::ContactMessage(ContactMessage {
                sender_prefix: PublicKeyPrefix(v.hex_array("pub_key_prefix")?),
                path_len: v.u8("path_len")?,
                text_type: v.u8("txt_type")?.into(),
                timestamp: v.u32("sender_timestamp")?,
                text: v.text("text")?.to_string(),
            }),
            RESP_CODE_CHANNEL_MSG_RECV => Response::ChannelMessage(ChannelMessage {
                channel_idx: v.u8("channel_idx")?,
                path_len: v.u8("path_len")?,
                text_type: v.u8("txt_type")?.into(),
                timestamp: v.u32("sender_timestamp")?,
                text: v.text("text")?.to_string(),
            }),
            RESP_CODE_CURR_TIME => Response::CurrentTime {
                epoch_secs: v.u32("epoch_secs")?,
            },
            RESP_CODE_NO_MORE_MESSAGES => Response::NoMoreMessages,
            code => {
                return Err(ProtocolError::UnexpectedFrame {
                    code,
                    name: frame.name,
                })
            }
        };
        Ok(response)
    }

    /// Field values for the frame codec.
    pub fn values(&self) -> FieldValues {
        match self {
            Response::Ok | Response::NoMoreMessages => FieldValues::new(),
            Response::Err(code) => FieldValues::new().with_opt("err_code", err_code_byte(*code)),
            Response::ContactsStart { count } => FieldValues::new().with("count", *count),
            Response::Contact(contact) => contact.to_values().with("last_mod", contact.last_modified),
            Response::EndOfContacts {
                most_recent_lastmod,
            } => FieldValues::new().with("most_recent_lastmod", *most_recent_lastmod),
            Response::SelfInfo(info) => info.to_values(),
            Response::Sent(sent) => FieldValues::new()
                .with("send_type", sent.send_type)
                .with("expected_ack_code", sent.expected_ack.to_hex())
                .with("suggested_timeout", sent.suggested_timeout_ms),
            Response::ContactMessage(msg) => FieldValues::new()
                .with("pub_key_prefix", msg.sender_prefix.to_hex())
                .with("path_len", msg.path_len)
                .with("txt_type", u8::from(msg.text_type))
                .with("sender_timestamp", msg.timestamp)
                .with("text", msg.text.as_str()),
            Response::ChannelMessage(msg) => FieldValues::new()
                .with("channel_idx", msg.channel_idx)
                .with("path_len", msg.path_len)
                .with("txt_type", u8::from(msg.text_type))
                .with("sender_timestamp", msg.timestamp)
                .with("text", msg.text.as_str()),
            Response::CurrentTime { epoch_secs } => {
                FieldValues::new().with("epoch_secs", *epoch_secs)
            }
        }
    }

    /// Encode the response to a frame payload.
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.definition().encode(&self.values())
    }

    /// Decode a response payload.
    pub fn decode(data: &[u8]) -> Result<Self> {
        Self::from_frame(&decode_frame(Direction::DeviceToHost, data)?)
    }

    /// Converts a queued message response into a [`ReceivedMessage`].
    pub fn into_message(self) -> Option<ReceivedMessage> {
        match self {
            Response::ContactMessage(msg) => Some(ReceivedMessage::Contact(msg)),
            Response::ChannelMessage(msg) => Some(ReceivedMessage::Channel(msg)),
            _ => None,
        }
    }
}

fn err_code_byte(code: FirmwareErrorCode) -> Option<u8> {
    match code {
        FirmwareErrorCode::UnsupportedCommand => Some(ERR_CODE_UNSUPPORTED_CMD),
        FirmwareErrorCode::NotFound => Some(ERR_CODE_NOT_FOUND),
        FirmwareErrorCode::TableFull => Some(ERR_CODE_TABLE_FULL),
        FirmwareErrorCode::BadState => Some(ERR_CODE_BAD_STATE),
        FirmwareErrorCode::FileIoError => Some(ERR_CODE_FILE_IO_ERROR),
        FirmwareErrorCode::IllegalArg => Some(ERR_CODE_ILLEGAL_ARG),
        FirmwareErrorCode::Unknown(code) => Some(code),
        FirmwareErrorCode::Unspecified => None,
    }
}

/// Unsolicited notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum PushNotification {
    /// Advertisement received from a node.
    Advert {
        /// Advertiser's public key.
        public_key: PublicKey,
    },
    /// Path to a contact was updated.
    PathUpdated {
        /// Contact's public key.
        public_key: PublicKey,
    },
    /// A sent message was acknowledged.
    SendConfirmed(SendConfirmation),
    /// Messages are waiting in the device queue.
    MsgWaiting,
}

impl PushNotification {
    /// Frame layout of this push.
    pub fn definition(&self) -> &'static FrameDef {
        match self {
            PushNotification::Advert { .. } => &push::ADVERT,
            PushNotification::PathUpdated { .. } => &push::PATH_UPDATED,
            PushNotification::SendConfirmed(_) => &push::SEND_CONFIRMED,
            PushNotification::MsgWaiting => &push::MSG_WAITING,
        }
    }

    /// Get the push code.
    pub fn code(&self) -> u8 {
        self.definition().code
    }

    /// Build a typed push from a decoded frame.
    pub fn from_frame(frame: &DecodedFrame) -> Result<Self> {
        let v = &frame.values;
        let push = match frame.code {
            PUSH_CODE_ADVERT => PushNotification::Advert {
                public_key: PublicKey(v.hex_array("public_key")?),
            },
            PUSH_CODE_PATH_UPDATED => PushNotification::PathUpdated {
                public_key: PublicKey(v.hex_array("public_key")?),
            },
            PUSH_CODE_SEND_CONFIRMED => PushNotification::SendConfirmed(SendConfirmation {
                ack_code: AckCode(v.hex_array("ack_code")?),
                round_trip_ms: v.u32("round_trip")?,
            }),
            PUSH_CODE_MSG_WAITING => PushNotification::MsgWaiting,
            code => {
                return Err(ProtocolError::UnexpectedFrame {
                    code,
                    name: frame.name,
                })
            }
        };
        Ok(push)
    }

    /// Field values for the frame codec.
    pub fn values(&self) -> FieldValues {
        match self {
            PushNotification::Advert { public_key } | PushNotification::PathUpdated { public_key } => {
                FieldValues::new().with("public_key", public_key.to_hex())
            }
            PushNotification::SendConfirmed(confirm) => FieldValues::new()
                .with("ack_code", confirm.ack_code.to_hex())
                .with("round_trip", confirm.round_trip_ms),
            PushNotification::MsgWaiting => FieldValues::new(),
        }
    }

    /// Encode the push to a frame payload.
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.definition().encode(&self.values())
    }
}

/// A message received from the firmware (either response or push).
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A response to a command.
    Response(Response),
    /// A push notification.
    Push(PushNotification),
}

impl Message {
    /// Build from a decoded device frame.
    pub fn from_frame(frame: &DecodedFrame) -> Result<Self> {
        if frame.is_push() {
            PushNotification::from_frame(frame).map(Message::Push)
        } else {
            Response::from_frame(frame).map(Message::Response)
        }
    }

    /// Decode a device payload.
    pub fn decode(data: &[u8]) -> Result<Self> {
        Self::from_frame(&decode_frame(Direction::DeviceToHost, data)?)
    }

    /// Check if this is a push notification.
    pub fn is_push(&self) -> bool {
        matches!(self, Message::Push(_))
    }
}
