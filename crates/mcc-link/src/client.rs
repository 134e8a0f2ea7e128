//! Typed companion operations over a [`Link`].
//!
//! Each method sends one command and waits for its reply codes. An `Err`
//! frame from the device becomes [`LinkError::Device`]. Exchanges are
//! serialised so that two operations on the same client never interleave
//! their waits.

use std::sync::Arc;

use mcc_protocol::{
    Command, ContactInfo, ContactList, DecodedFrame, FirmwareErrorCode, ProtocolError, PublicKey,
    PublicKeyPrefix, PushNotification, RadioParams, ReceivedMessage, Response, SelfInfo,
    SendConfirmation, SentInfo, TextType, PUSH_CODE_ADVERT, PUSH_CODE_MSG_WAITING,
    PUSH_CODE_PATH_UPDATED, PUSH_CODE_SEND_CONFIRMED, RESP_CODE_CONTACT,
    RESP_CODE_END_OF_CONTACTS, RESP_CODE_ERR,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::correlator::SubscriptionId;
use crate::error::{LinkError, Result};
use crate::link::Link;

const PUSH_CODES: [u8; 4] = [
    PUSH_CODE_ADVERT,
    PUSH_CODE_PATH_UPDATED,
    PUSH_CODE_SEND_CONFIRMED,
    PUSH_CODE_MSG_WAITING,
];

/// Typed protocol client.
pub struct Client {
    link: Link,
    exchange: Mutex<()>,
}

fn unexpected(frame: &DecodedFrame) -> LinkError {
    ProtocolError::UnexpectedFrame {
        code: frame.code,
        name: frame.name,
    }
    .into()
}

/// Turns an `Err` reply into [`LinkError::Device`].
fn device_result(frame: DecodedFrame) -> Result<DecodedFrame> {
    if frame.code != RESP_CODE_ERR {
        return Ok(frame);
    }
    let code = frame
        .values
        .opt_u8("err_code")?
        .map_or(FirmwareErrorCode::Unspecified, FirmwareErrorCode::from);
    Err(LinkError::Device(code))
}

impl Client {
    /// Wraps a running link.
    pub fn new(link: Link) -> Self {
        Client {
            link,
            exchange: Mutex::new(()),
        }
    }

    /// The underlying link, for events and push subscriptions.
    pub fn link(&self) -> &Link {
        &self.link
    }

    async fn request_locked(&self, command: &Command) -> Result<Response> {
        let timeout = self.link.config().response_timeout();
        self.link.send_command(command).await?;
        let frame = self.link.await_response(command.reply_codes(), timeout).await?;
        let frame = device_result(frame)?;
        debug!(command = command.definition().name, reply = frame.name, "exchange complete");
        Ok(Response::from_frame(&frame)?)
    }

    async fn exchange(&self, command: Command) -> Result<Response> {
        let _guard = self.exchange.lock().await;
        self.request_locked(&command).await
    }

    async fn expect_ok(&self, command: Command) -> Result<()> {
        match self.exchange(command).await? {
            Response::Ok => Ok(()),
            other => Err(unexpected_response(&other)),
        }
    }

    /// Opens the session and returns the device's self description.
    pub async fn app_start(&self) -> Result<SelfInfo> {
        let config = self.link.config();
        let command = Command::AppStart {
            app_version: config.app_version,
            app_name: config.app_name.clone(),
        };
        match self.exchange(command).await? {
            Response::SelfInfo(info) => {
                info!(name = %info.name, key = %info.public_key, "session started");
                Ok(info)
            }
            other => Err(unexpected_response(&other)),
        }
    }

    /// Fetches contacts modified after `since`, or all contacts.
    ///
    /// Fails with [`LinkError::ContactCountMismatch`] if the number of
    /// `Contact` frames differs from the count announced up front.
    pub async fn get_contacts(&self, since: Option<u32>) -> Result<ContactList> {
        let _guard = self.exchange.lock().await;
        let declared = match self.request_locked(&Command::GetContacts { since }).await? {
            Response::ContactsStart { count } => count,
            other => return Err(unexpected_response(&other)),
        };

        let timeout = self.link.config().response_timeout();
        let mut contacts = Vec::new();
        loop {
            let frame = self
                .link
                .await_response(&[RESP_CODE_CONTACT, RESP_CODE_END_OF_CONTACTS], timeout)
                .await?;
            match Response::from_frame(&frame)? {
                Response::Contact(contact) => contacts.push(contact),
                Response::EndOfContacts {
                    most_recent_lastmod,
                } => {
                    let received = u32::try_from(contacts.len()).unwrap_or(u32::MAX);
                    if received != declared {
                        return Err(LinkError::ContactCountMismatch { declared, received });
                    }
                    info!(count = received, most_recent_lastmod, "contacts fetched");
                    return Ok(ContactList {
                        contacts,
                        most_recent_lastmod,
                    });
                }
                _ => return Err(unexpected(&frame)),
            }
        }
    }

    /// Adds a contact or replaces the one with the same public key.
    pub async fn add_update_contact(&self, contact: &ContactInfo) -> Result<()> {
        self.expect_ok(Command::AddUpdateContact {
            contact: contact.clone(),
        })
        .await
    }

    /// Pulls one message from the device queue. `None` once it is empty.
    pub async fn sync_next_message(&self) -> Result<Option<ReceivedMessage>> {
        match self.exchange(Command::SyncNextMessage).await? {
            Response::NoMoreMessages => Ok(None),
            message @ (Response::ContactMessage(_) | Response::ChannelMessage(_)) => {
                Ok(message.into_message())
            }
            other => Err(unexpected_response(&other)),
        }
    }

    /// Drains the device queue, oldest message first.
    pub async fn sync_all_messages(&self) -> Result<Vec<ReceivedMessage>> {
        let mut messages = Vec::new();
        while let Some(message) = self.sync_next_message().await? {
            messages.push(message);
        }
        if !messages.is_empty() {
            info!(count = messages.len(), "messages synced");
        }
        Ok(messages)
    }

    /// Sends a plain direct message.
    pub async fn send_text_message(
        &self,
        recipient: PublicKeyPrefix,
        text: &str,
        timestamp: u32,
        attempt: u8,
    ) -> Result<SentInfo> {
        let command = Command::SendTextMessage {
            text_type: TextType::Plain,
            attempt,
            timestamp,
            recipient,
            text: text.to_string(),
        };
        match self.exchange(command).await? {
            Response::Sent(sent) => Ok(sent),
            other => Err(unexpected_response(&other)),
        }
    }

    /// Sends a plain message on a channel.
    pub async fn send_channel_message(&self, channel_idx: u8, text: &str, timestamp: u32) -> Result<()> {
        self.expect_ok(Command::SendChannelTextMessage {
            text_type: TextType::Plain,
            channel_idx,
            timestamp,
            text: text.to_string(),
        })
        .await
    }

    /// Reads the device clock.
    pub async fn get_device_time(&self) -> Result<u32> {
        match self.exchange(Command::GetDeviceTime).await? {
            Response::CurrentTime { epoch_secs } => Ok(epoch_secs),
            other => Err(unexpected_response(&other)),
        }
    }

    /// Sets the device clock.
    pub async fn set_device_time(&self, time_secs: u32) -> Result<()> {
        self.expect_ok(Command::SetDeviceTime { time_secs }).await
    }

    /// Broadcasts this node's advertisement.
    pub async fn send_self_advert(&self, flood: bool) -> Result<()> {
        self.expect_ok(Command::SendSelfAdvert { flood }).await
    }

    /// Renames this node.
    pub async fn set_advert_name(&self, name: &str) -> Result<()> {
        self.expect_ok(Command::SetAdvertName {
            name: name.to_string(),
        })
        .await
    }

    /// Changes radio parameters.
    pub async fn set_radio_params(&self, params: RadioParams) -> Result<()> {
        self.expect_ok(Command::SetRadioParams { params }).await
    }

    /// Sets transmit power in dBm. The device rejects values above its
    /// maximum with an `IllegalArg` error.
    pub async fn set_tx_power(&self, power_dbm: u8) -> Result<()> {
        self.expect_ok(Command::SetTxPower { power_dbm }).await
    }

    // ------------------------------------------------------------------------
    // Push subscriptions
    // ------------------------------------------------------------------------

    fn subscribe_decoded<F>(&self, code: u8, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(PushNotification) + Send + Sync + 'static,
    {
        self.link.subscribe_push(code, move |frame| {
            match PushNotification::from_frame(frame) {
                Ok(push) => handler(push),
                Err(e) => warn!(error = %e, frame = frame.name, "dropping undecodable push"),
            }
        })
    }

    /// Registers `handler` for every push kind, decoded.
    ///
    /// Returns one subscription per push code; pass each to
    /// [`Link::unsubscribe`] to remove it.
    pub fn on_push<F>(&self, handler: F) -> Result<Vec<SubscriptionId>>
    where
        F: Fn(PushNotification) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        PUSH_CODES
            .into_iter()
            .map(|code| {
                let handler = Arc::clone(&handler);
                self.subscribe_decoded(code, move |push| handler(push))
            })
            .collect()
    }

    /// Called with the advertiser's key for every received advert.
    pub fn on_advert<F>(&self, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(PublicKey) + Send + Sync + 'static,
    {
        self.subscribe_decoded(PUSH_CODE_ADVERT, move |push| {
            if let PushNotification::Advert { public_key } = push {
                handler(public_key);
            }
        })
    }

    pub fn on_path_updated<F>(&self, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(PublicKey) + Send + Sync + 'static,
    {
        self.subscribe_decoded(PUSH_CODE_PATH_UPDATED, move |push| {
            if let PushNotification::PathUpdated { public_key } = push {
                handler(public_key);
            }
        })
    }

    /// Called when the ack for an earlier [`SentInfo`] arrives.
    pub fn on_send_confirmed<F>(&self, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(SendConfirmation) + Send + Sync + 'static,
    {
        self.subscribe_decoded(PUSH_CODE_SEND_CONFIRMED, move |push| {
            if let PushNotification::SendConfirmed(confirmation) = push {
                handler(confirmation);
            }
        })
    }

    /// Called when new messages can be pulled with
    /// [`sync_next_message`](Self::sync_next_message). Handlers run on the
    /// reader task, so hand the sync off rather than awaiting it here.
    pub fn on_msg_waiting<F>(&self, handler: F) -> Result<SubscriptionId>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe_decoded(PUSH_CODE_MSG_WAITING, move |_| handler())
    }
}

fn unexpected_response(response: &Response) -> LinkError {
    ProtocolError::UnexpectedFrame {
        code: response.code(),
        name: response.definition().name,
    }
    .into()
}
