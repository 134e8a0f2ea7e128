//! MeshCore Companion Protocol
//!
//! This crate provides the wire-level half of talking to MeshCore companion
//! firmware: a declarative frame codec, the stream envelope framing, and
//! typed views of every command, response and push. It does no I/O.
//!
//! # Protocol Overview
//!
//! Messages are either:
//!
//! - **Commands** (host → firmware): Start with a `CMD_*` byte
//! - **Responses** (firmware → host): Start with a `RESP_CODE_*` byte
//! - **Push notifications** (firmware → host): Start with a `PUSH_CODE_*` byte (0x80+)
//!
//! Frame layouts are static [`FrameDef`] tables in [`definitions`]; the typed
//! [`Command`], [`Response`] and [`PushNotification`] enums encode and decode
//! through them.
//!
//! # Example
//!
//! ```rust
//! use mcc_protocol::{parse_header, wrap, decode_body, Command};
//!
//! let cmd = Command::AppStart { app_version: 1, app_name: "MCC".into() };
//! let envelope = wrap(&cmd.encode()?)?;
//!
//! let header = parse_header(&envelope[..3])?;
//! assert_eq!(header.length, 8 + 3);
//! let frame = decode_body(&header, &envelope[3..])?;
//! assert_eq!(frame.values.text("app_name")?, "MCC");
//! # Ok::<(), mcc_protocol::ProtocolError>(())
//! ```

mod codec;
mod commands;
mod constants;
pub mod definitions;
mod error;
mod field;
mod frame;
mod responses;
mod types;

pub use codec::*;
pub use commands::*;
pub use constants::*;
pub use definitions::{command_definition, decode_frame, reply_definition};
pub use error::*;
pub use field::{Field, FieldSpec, FieldType, Transform, Value};
pub use frame::*;
pub use responses::*;
pub use types::*;
