//! Human-readable and JSON rendering of command results.

use anyhow::Result;
use mcc_protocol::{ContactInfo, ContactList, PushNotification, ReceivedMessage, SelfInfo, SentInfo};
use serde::Serialize;

/// Prints `value` as pretty JSON, or as the text produced by `render`.
pub fn emit<T, F>(json: bool, value: &T, render: F) -> Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", render(value));
    }
    Ok(())
}

pub fn self_info(info: &SelfInfo) -> String {
    format!(
        "{}\n  key:      {}\n  position: {:.6}, {:.6}\n  radio:    {:.3} MHz, {} kHz, SF{}, CR{}\n  tx power: {} dBm (max {})",
        info.name,
        info.public_key,
        info.latitude,
        info.longitude,
        info.radio.frequency_mhz(),
        info.radio.bandwidth_khz(),
        info.radio.spreading_factor,
        info.radio.coding_rate,
        info.tx_power_dbm,
        info.max_tx_power_dbm,
    )
}

fn contact_line(contact: &ContactInfo) -> String {
    let route = if contact.has_direct_path() {
        format!("{} hop(s)", contact.out_path_len)
    } else {
        "flood".to_string()
    };
    format!(
        "{}  {:<32} {:?}  {}",
        contact.public_key.prefix(),
        contact.name,
        contact.contact_type,
        route
    )
}

pub fn contacts(list: &ContactList) -> String {
    let mut lines: Vec<String> = list.contacts.iter().map(contact_line).collect();
    lines.push(format!(
        "{} contact(s), next --since {}",
        list.len(),
        list.next_since()
    ));
    lines.join("\n")
}

pub fn message(message: &ReceivedMessage) -> String {
    match message {
        ReceivedMessage::Contact(m) => format!("[{}] {}: {}", m.timestamp, m.sender_prefix, m.text),
        ReceivedMessage::Channel(m) => format!("[{}] #{}: {}", m.timestamp, m.channel_idx, m.text),
    }
}

pub fn messages(messages: &[ReceivedMessage]) -> String {
    if messages.is_empty() {
        return "no messages".to_string();
    }
    messages.iter().map(message).collect::<Vec<_>>().join("\n")
}

pub fn sent(sent: &SentInfo) -> String {
    format!(
        "sent ({}), ack {} expected within {} ms",
        if sent.is_flood() { "flood" } else { "direct" },
        sent.expected_ack,
        sent.suggested_timeout_ms
    )
}

pub fn push(push: &PushNotification) -> String {
    match push {
        PushNotification::Advert { public_key } => format!("advert from {public_key}"),
        PushNotification::PathUpdated { public_key } => format!("path updated for {public_key}"),
        PushNotification::SendConfirmed(confirm) => format!(
            "ack {} confirmed after {} ms",
            confirm.ack_code, confirm.round_trip_ms
        ),
        PushNotification::MsgWaiting => "messages waiting".to_string(),
    }
}
