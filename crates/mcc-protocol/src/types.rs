//! Common types used in the protocol.

use crate::codec::FieldValues;
use crate::constants::*;
use crate::error::ProtocolError;
use crate::field::Result;

#[cfg(feature = "serde")]
use serde::Serialize;

macro_rules! hex_newtype {
    ($(#[$meta:meta])* $name:ident, $size:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(pub [u8; $size]);

        impl $name {
            /// Create from raw bytes.
            pub fn new(bytes: [u8; $size]) -> Self {
                $name(bytes)
            }

            /// Parse from a hex string of exactly twice the byte size.
            pub fn from_hex(text: &str) -> Result<Self> {
                let mut bytes = [0u8; $size];
                hex::decode_to_slice(text, &mut bytes).map_err(|e| ProtocolError::MalformedHex {
                    key: stringify!($name),
                    reason: e.to_string(),
                })?;
                Ok($name(bytes))
            }

            /// Get the underlying bytes.
            pub fn as_bytes(&self) -> &[u8; $size] {
                &self.0
            }

            /// Get the bytes as a lower-case hex string.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ProtocolError;

            fn from_str(s: &str) -> Result<Self> {
                Self::from_hex(s)
            }
        }

        #[cfg(feature = "serde")]
        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }
    };
}

hex_newtype!(
    /// A 32-byte public key.
    PublicKey,
    PUB_KEY_SIZE
);

hex_newtype!(
    /// A 6-byte public key prefix addressing a contact in message frames.
    PublicKeyPrefix,
    PUB_KEY_PREFIX_SIZE
);

hex_newtype!(
    /// Device-generated token tying a `SendConfirmed` push to a sent message.
    AckCode,
    ACK_CODE_SIZE
);

impl PublicKey {
    /// Get the 6-byte prefix used in message frames.
    pub fn prefix(&self) -> PublicKeyPrefix {
        PublicKeyPrefix::from(self)
    }
}

impl From<&PublicKey> for PublicKeyPrefix {
    fn from(key: &PublicKey) -> Self {
        let mut prefix = [0u8; PUB_KEY_PREFIX_SIZE];
        prefix.copy_from_slice(&key.0[..PUB_KEY_PREFIX_SIZE]);
        PublicKeyPrefix(prefix)
    }
}

/// Node type carried in adverts and contact records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum AdvertType {
    /// No type.
    None,
    /// Chat node.
    Chat,
    /// Repeater.
    Repeater,
    /// Room server.
    RoomServer,
    /// Unknown type.
    Unknown(u8),
}

impl From<u8> for AdvertType {
    fn from(value: u8) -> Self {
        match value {
            ADV_TYPE_NONE => AdvertType::None,
            ADV_TYPE_CHAT => AdvertType::Chat,
            ADV_TYPE_REPEATER => AdvertType::Repeater,
            ADV_TYPE_ROOM_SERVER => AdvertType::RoomServer,
            _ => AdvertType::Unknown(value),
        }
    }
}

impl From<AdvertType> for u8 {
    fn from(value: AdvertType) -> Self {
        match value {
            AdvertType::None => ADV_TYPE_NONE,
            AdvertType::Chat => ADV_TYPE_CHAT,
            AdvertType::Repeater => ADV_TYPE_REPEATER,
            AdvertType::RoomServer => ADV_TYPE_ROOM_SERVER,
            AdvertType::Unknown(v) => v,
        }
    }
}

/// Message type for text messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum TextType {
    /// Plain text message.
    Plain,
    /// CLI/command data.
    CliData,
    /// Signed plain text.
    SignedPlain,
    /// Unknown type.
    Unknown(u8),
}

impl From<u8> for TextType {
    fn from(value: u8) -> Self {
        match value {
            TXT_TYPE_PLAIN => TextType::Plain,
            TXT_TYPE_CLI_DATA => TextType::CliData,
            TXT_TYPE_SIGNED_PLAIN => TextType::SignedPlain,
            _ => TextType::Unknown(value),
        }
    }
}

impl From<TextType> for u8 {
    fn from(value: TextType) -> Self {
        match value {
            TextType::Plain => TXT_TYPE_PLAIN,
            TextType::CliData => TXT_TYPE_CLI_DATA,
            TextType::SignedPlain => TXT_TYPE_SIGNED_PLAIN,
            TextType::Unknown(v) => v,
        }
    }
}

/// Contact record stored on the device.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ContactInfo {
    /// Contact's public key.
    pub public_key: PublicKey,
    /// Contact type (Chat, Repeater, RoomServer).
    pub contact_type: AdvertType,
    /// Contact flags.
    pub flags: u8,
    /// Outbound path length (-1 if unknown/flood).
    pub out_path_len: i8,
    /// Outbound path data, at most [`MAX_PATH_SIZE`] bytes.
    pub out_path: Vec<u8>,
    /// Advertised name (up to 31 bytes).
    pub name: String,
    /// Timestamp of last advertisement.
    pub last_advert: u32,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Last modification timestamp, used as the listing watermark.
    pub last_modified: u32,
}

impl Default for ContactInfo {
    fn default() -> Self {
        ContactInfo {
            public_key: PublicKey::default(),
            contact_type: AdvertType::Chat,
            flags: 0,
            out_path_len: -1,
            out_path: Vec::new(),
            name: String::new(),
            last_advert: 0,
            latitude: 0.0,
            longitude: 0.0,
            last_modified: 0,
        }
    }
}

impl ContactInfo {
    /// Check if the contact has a known direct path.
    pub fn has_direct_path(&self) -> bool {
        self.out_path_len >= 0
    }

    /// Reads a `Contact` response or an `AddUpdateContact` command.
    pub fn from_values(values: &FieldValues) -> Result<Self> {
        let out_path_len = values.i8("out_path_len")?;
        let mut out_path = values.bytes("out_path")?.to_vec();
        out_path.truncate(out_path_len.max(0) as usize);
        Ok(ContactInfo {
            public_key: PublicKey(values.hex_array("public_key")?),
            contact_type: values.u8("contact_type")?.into(),
            flags: values.u8("flags")?,
            out_path_len,
            out_path,
            name: values.text("adv_name")?.to_string(),
            last_advert: values.u32("last_advert")?,
            latitude: values.opt_f64("adv_lat")?.unwrap_or(0.0),
            longitude: values.opt_f64("adv_lon")?.unwrap_or(0.0),
            last_modified: values.opt_u32("last_mod")?.unwrap_or(0),
        })
    }

    /// Field values shared by the `AddUpdateContact` command and the
    /// `Contact` response. `last_mod` is added by the caller where needed.
    pub fn to_values(&self) -> FieldValues {
        FieldValues::new()
            .with("public_key", self.public_key.to_hex())
            .with("contact_type", u8::from(self.contact_type))
            .with("flags", self.flags)
            .with("out_path_len", self.out_path_len)
            .with("out_path", self.out_path.clone())
            .with("adv_name", self.name.as_str())
            .with("last_advert", self.last_advert)
            .with("adv_lat", self.latitude)
            .with("adv_lon", self.longitude)
    }
}

/// Node information returned in reply to `AppStart`.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SelfInfo {
    /// Node advertisement type.
    pub advert_type: AdvertType,
    /// Current TX power in dBm.
    pub tx_power_dbm: u8,
    /// Maximum TX power supported.
    pub max_tx_power_dbm: u8,
    /// Node's public key.
    pub public_key: PublicKey,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Multi-ACK count.
    pub multi_acks: u8,
    /// Advertisement location policy.
    pub advert_loc_policy: u8,
    /// Telemetry modes packed byte.
    pub telemetry_modes: u8,
    /// Manual add contacts flag.
    pub manual_add_contacts: u8,
    /// Radio configuration.
    pub radio: RadioParams,
    /// Node name.
    pub name: String,
}

impl Default for AdvertType {
    fn default() -> Self {
        AdvertType::Chat
    }
}

impl SelfInfo {
    /// Reads a `SelfInfo` response.
    pub fn from_values(values: &FieldValues) -> Result<Self> {
        Ok(SelfInfo {
            advert_type: values.u8("advert_type")?.into(),
            tx_power_dbm: values.u8("tx_power")?,
            max_tx_power_dbm: values.u8("max_tx_power")?,
            public_key: PublicKey(values.hex_array("public_key")?),
            latitude: values.f64("adv_lat")?,
            longitude: values.f64("adv_lon")?,
            multi_acks: values.u8("multi_acks")?,
            advert_loc_policy: values.u8("advert_loc_policy")?,
            telemetry_modes: values.u8("telemetry_modes")?,
            manual_add_contacts: values.u8("manual_add_contacts")?,
            radio: RadioParams::from_values(values)?,
            name: values.text("name")?.to_string(),
        })
    }

    /// Field values of a `SelfInfo` response.
    pub fn to_values(&self) -> FieldValues {
        self.radio
            .extend_values(FieldValues::new())
            .with("advert_type", u8::from(self.advert_type))
            .with("tx_power", self.tx_power_dbm)
            .with("max_tx_power", self.max_tx_power_dbm)
            .with("public_key", self.public_key.to_hex())
            .with("adv_lat", self.latitude)
            .with("adv_lon", self.longitude)
            .with("multi_acks", self.multi_acks)
            .with("advert_loc_policy", self.advert_loc_policy)
            .with("telemetry_modes", self.telemetry_modes)
            .with("manual_add_contacts", self.manual_add_contacts)
            .with("name", self.name.as_str())
    }
}

/// Radio parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct RadioParams {
    /// Frequency in kHz.
    pub freq_khz: u32,
    /// Bandwidth in Hz.
    pub bandwidth_hz: u32,
    /// Spreading factor (5-12).
    pub spreading_factor: u8,
    /// Coding rate (5-8).
    pub coding_rate: u8,
}

impl Default for RadioParams {
    fn default() -> Self {
        RadioParams {
            freq_khz: 910_525,    // 910.525 MHz
            bandwidth_hz: 62_500, // 62.5 kHz
            spreading_factor: 7,
            coding_rate: 5,
        }
    }
}

impl RadioParams {
    /// Get frequency in MHz.
    pub fn frequency_mhz(&self) -> f64 {
        self.freq_khz as f64 / 1000.0
    }

    /// Get bandwidth in kHz.
    pub fn bandwidth_khz(&self) -> f64 {
        self.bandwidth_hz as f64 / 1000.0
    }

    fn from_values(values: &FieldValues) -> Result<Self> {
        Ok(RadioParams {
            freq_khz: values.u32("radio_freq")?,
            bandwidth_hz: values.u32("radio_bw")?,
            spreading_factor: values.u8("radio_sf")?,
            coding_rate: values.u8("radio_cr")?,
        })
    }

    pub(crate) fn extend_values(&self, values: FieldValues) -> FieldValues {
        values
            .with("radio_freq", self.freq_khz)
            .with("radio_bw", self.bandwidth_hz)
            .with("radio_sf", self.spreading_factor)
            .with("radio_cr", self.coding_rate)
    }
}

/// Reply to a direct text message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SentInfo {
    /// Non-zero when the message was sent in flood mode.
    pub send_type: u8,
    /// Ack code the matching `SendConfirmed` push will carry.
    pub expected_ack: AckCode,
    /// Suggested time to wait for the ack, in milliseconds.
    pub suggested_timeout_ms: u32,
}

impl SentInfo {
    /// Returns true if the message was flooded.
    pub fn is_flood(&self) -> bool {
        self.send_type != 0
    }
}

/// A direct message pulled from the device queue.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ContactMessage {
    /// Sender's public key prefix.
    pub sender_prefix: PublicKeyPrefix,
    /// Path length ([`PATH_LEN_DIRECT`] when sent direct).
    pub path_len: u8,
    /// Message type.
    pub text_type: TextType,
    /// Sender's timestamp.
    pub timestamp: u32,
    /// Message text.
    pub text: String,
}

/// A channel message pulled from the device queue.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ChannelMessage {
    /// Channel index.
    pub channel_idx: u8,
    /// Path length ([`PATH_LEN_DIRECT`] when sent direct).
    pub path_len: u8,
    /// Message type.
    pub text_type: TextType,
    /// Sender's timestamp.
    pub timestamp: u32,
    /// Message text.
    pub text: String,
}

/// Either kind of queued message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum ReceivedMessage {
    /// Direct message from a contact.
    Contact(ContactMessage),
    /// Message on a group channel.
    Channel(ChannelMessage),
}

impl ReceivedMessage {
    /// Message text.
    pub fn text(&self) -> &str {
        match self {
            ReceivedMessage::Contact(m) => &m.text,
            ReceivedMessage::Channel(m) => &m.text,
        }
    }

    /// Sender's timestamp.
    pub fn timestamp(&self) -> u32 {
        match self {
            ReceivedMessage::Contact(m) => m.timestamp,
            ReceivedMessage::Channel(m) => m.timestamp,
        }
    }

    /// Check if this message was delivered by direct routing.
    pub fn is_direct(&self) -> bool {
        let path_len = match self {
            ReceivedMessage::Contact(m) => m.path_len,
            ReceivedMessage::Channel(m) => m.path_len,
        };
        path_len == PATH_LEN_DIRECT
    }
}

/// Payload of a `SendConfirmed` push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SendConfirmation {
    /// Ack code matching an earlier [`SentInfo::expected_ack`].
    pub ack_code: AckCode,
    /// Round trip time in milliseconds.
    pub round_trip_ms: u32,
}

/// Result of a contact listing.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ContactList {
    /// Contacts in the order the device sent them.
    pub contacts: Vec<ContactInfo>,
    /// Watermark from the `EndOfContacts` frame.
    pub most_recent_lastmod: u32,
}

impl ContactList {
    /// `since` value for the next incremental listing.
    pub fn next_since(&self) -> u32 {
        self.most_recent_lastmod
    }

    /// Number of contacts.
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    /// Returns true if the listing was empty.
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_hex() {
        let mut bytes = [0u8; PUB_KEY_SIZE];
        bytes[0] = 0xAB;
        bytes[31] = 0x01;
        let key = PublicKey::new(bytes);
        let hex = key.to_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.starts_with("ab"));
        assert_eq!(PublicKey::from_hex(&hex).unwrap(), key);
        assert_eq!(key.prefix().0, [0xAB, 0, 0, 0, 0, 0]);

        let err = PublicKey::from_hex("abcd").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedHex { key: "PublicKey", .. }));
    }

    #[test]
    fn test_prefix_parse() {
        let prefix: PublicKeyPrefix = "010203040506".parse().unwrap();
        assert_eq!(prefix.0, [1, 2, 3, 4, 5, 6]);
        assert_eq!(prefix.to_string(), "010203040506");
    }

    #[test]
    fn test_type_conversions() {
        assert_eq!(TextType::from(2), TextType::SignedPlain);
        assert_eq!(u8::from(TextType::Unknown(9)), 9);
        assert_eq!(AdvertType::from(3), AdvertType::RoomServer);
        assert_eq!(u8::from(AdvertType::Repeater), ADV_TYPE_REPEATER);
    }

    #[test]
    fn test_contact_path_truncated_to_length() {
        let contact = ContactInfo {
            out_path_len: 2,
            out_path: vec![7, 8],
            name: "node".into(),
            ..Default::default()
        };
        let mut values = contact.to_values();
        values.insert("out_path", vec![7u8, 8, 0, 0]);
        let decoded = ContactInfo::from_values(&values).unwrap();
        assert_eq!(decoded.out_path, vec![7, 8]);
        assert!(decoded.has_direct_path());
    }
}
