//! # mcc-link
//!
//! Request/response correlation for MeshCore companion links.
//!
//! A [`Link`] runs a reader task over a byte stream (TCP, serial) or a
//! datagram transport (BLE characteristics) and separates the device's
//! traffic into two paths:
//!
//! - **Responses** resolve the single pending [`Link::await_response`] or are
//!   queued, oldest first, for the next caller that asks for their code.
//! - **Pushes** (codes 0x80 and above) go to handlers registered with
//!   [`Link::subscribe_push`] and to the [`LinkEvent`] channel. They never
//!   touch the response queue.
//!
//! [`Client`] wraps a link with one typed method per companion operation.
//!
//! ```rust,no_run
//! use mcc_link::{Client, Link, LinkConfig};
//!
//! # async fn run() -> mcc_link::Result<()> {
//! let stream = tokio::net::TcpStream::connect("127.0.0.1:5000").await.map_err(mcc_link::LinkError::Write)?;
//! let client = Client::new(Link::from_stream(stream, LinkConfig::default()));
//! let info = client.app_start().await?;
//! println!("connected to {}", info.name);
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod correlator;
mod error;
mod link;
pub mod metrics;
mod transport;

pub use client::Client;
pub use config::LinkConfig;
pub use correlator::{PushHandler, SubscriptionId};
pub use error::{LinkError, Result};
pub use link::{Link, LinkEvent, LinkStatus};
