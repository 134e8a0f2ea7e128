//! Typed client operations against a scripted device.

mod common;

use common::{config, connect, FakeDevice};
use mcc_link::{Client, LinkConfig, LinkError};
use mcc_protocol::{
    AckCode, ChannelMessage, Command, ContactInfo, ContactMessage, FirmwareErrorCode, PublicKey,
    PublicKeyPrefix, PushNotification, ReceivedMessage, Response, SelfInfo, SendConfirmation,
    SentInfo, TextType, PUSH_CODE_ADVERT,
};
use tokio::sync::mpsc;

fn client(config: LinkConfig) -> (Client, FakeDevice) {
    let (link, device) = connect(config);
    (Client::new(link), device)
}

fn contact(name: &str, last_modified: u32) -> ContactInfo {
    ContactInfo {
        public_key: PublicKey::new([name.len() as u8; 32]),
        name: name.to_string(),
        last_modified,
        ..ContactInfo::default()
    }
}

#[tokio::test]
async fn app_start_sends_configured_identity() {
    let config = LinkConfig {
        app_name: "bench".to_string(),
        app_version: 3,
        ..config(1000)
    };
    let (client, mut device) = client(config);

    let device_task = tokio::spawn(async move {
        let command = device.recv_command().await;
        assert_eq!(
            command,
            Command::AppStart {
                app_version: 3,
                app_name: "bench".to_string(),
            }
        );
        device
            .send(Response::SelfInfo(SelfInfo {
                name: "base-station".to_string(),
                tx_power_dbm: 20,
                max_tx_power_dbm: 22,
                ..SelfInfo::default()
            }))
            .await;
        device
    });

    let info = client.app_start().await.unwrap();
    assert_eq!(info.name, "base-station");
    assert_eq!(info.tx_power_dbm, 20);
    device_task.await.unwrap();
}

#[tokio::test]
async fn get_contacts_collects_listing() {
    let (client, mut device) = client(config(1000));

    let device_task = tokio::spawn(async move {
        assert_eq!(
            device.recv_command().await,
            Command::GetContacts { since: Some(500) }
        );
        device.send(Response::ContactsStart { count: 2 }).await;
        device.send(Response::Contact(contact("alice", 600))).await;
        device.send(Response::Contact(contact("bob", 1000))).await;
        device
            .send(Response::EndOfContacts {
                most_recent_lastmod: 1000,
            })
            .await;
        device
    });

    let list = client.get_contacts(Some(500)).await.unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list.contacts[0].name, "alice");
    assert_eq!(list.contacts[1].name, "bob");
    assert_eq!(list.next_since(), 1000);
    device_task.await.unwrap();
}

#[tokio::test]
async fn get_contacts_detects_short_listing() {
    let (client, mut device) = client(config(1000));

    let device_task = tokio::spawn(async move {
        device.recv_command().await;
        device.send(Response::ContactsStart { count: 3 }).await;
        device.send(Response::Contact(contact("alice", 1))).await;
        device.send(Response::Contact(contact("bob", 2))).await;
        device
            .send(Response::EndOfContacts {
                most_recent_lastmod: 2,
            })
            .await;
        device
    });

    let err = client.get_contacts(None).await.unwrap_err();
    assert!(matches!(
        err,
        LinkError::ContactCountMismatch {
            declared: 3,
            received: 2
        }
    ));
    device_task.await.unwrap();
}

#[tokio::test]
async fn sync_all_messages_drains_queue() {
    let (client, mut device) = client(config(1000));
    let direct = ContactMessage {
        sender_prefix: PublicKeyPrefix::new([0xAA; 6]),
        path_len: 0xFF,
        text_type: TextType::Plain,
        timestamp: 100,
        text: "hello".to_string(),
    };
    let channel = ChannelMessage {
        channel_idx: 0,
        path_len: 2,
        text_type: TextType::Plain,
        timestamp: 101,
        text: "public".to_string(),
    };

    let replies = vec![
        Response::ContactMessage(direct.clone()),
        Response::ChannelMessage(channel.clone()),
        Response::NoMoreMessages,
    ];
    let device_task = tokio::spawn(async move {
        for reply in replies {
            assert_eq!(device.recv_command().await, Command::SyncNextMessage);
            device.send(reply).await;
        }
        device
    });

    let messages = client.sync_all_messages().await.unwrap();
    assert_eq!(
        messages,
        vec![
            ReceivedMessage::Contact(direct),
            ReceivedMessage::Channel(channel)
        ]
    );
    assert!(messages[0].is_direct());
    device_task.await.unwrap();
}

#[tokio::test]
async fn send_text_message_returns_sent_info() {
    let (client, mut device) = client(config(1000));
    let recipient = PublicKeyPrefix::new([1, 2, 3, 4, 5, 6]);
    let sent = SentInfo {
        send_type: 1,
        expected_ack: AckCode::new([9, 8, 7, 6]),
        suggested_timeout_ms: 12_000,
    };

    let reply = sent;
    let device_task = tokio::spawn(async move {
        match device.recv_command().await {
            Command::SendTextMessage {
                recipient: to,
                text,
                attempt,
                ..
            } => {
                assert_eq!(to, recipient);
                assert_eq!(text, "ping");
                assert_eq!(attempt, 0);
            }
            other => panic!("unexpected command {other:?}"),
        }
        device.send(Response::Sent(reply)).await;
        device
    });

    let info = client
        .send_text_message(recipient, "ping", 1_700_000_000, 0)
        .await
        .unwrap();
    assert_eq!(info, sent);
    assert!(info.is_flood());
    device_task.await.unwrap();
}

#[tokio::test]
async fn device_error_is_mapped() {
    let (client, mut device) = client(config(1000));

    let device_task = tokio::spawn(async move {
        assert_eq!(
            device.recv_command().await,
            Command::SetTxPower { power_dbm: 40 }
        );
        device
            .send(Response::Err(FirmwareErrorCode::IllegalArg))
            .await;
        device
    });

    let err = client.set_tx_power(40).await.unwrap_err();
    assert!(matches!(
        err,
        LinkError::Device(FirmwareErrorCode::IllegalArg)
    ));
    device_task.await.unwrap();
}

#[tokio::test]
async fn ok_commands_complete() {
    let (client, mut device) = client(config(1000));

    let device_task = tokio::spawn(async move {
        for _ in 0..3 {
            device.recv_command().await;
            device.send(Response::Ok).await;
        }
        assert_eq!(device.recv_command().await, Command::GetDeviceTime);
        device
            .send(Response::CurrentTime {
                epoch_secs: 1_700_000_123,
            })
            .await;
        device
    });

    client.set_device_time(1_700_000_000).await.unwrap();
    client.send_self_advert(true).await.unwrap();
    client.set_advert_name("relay-7").await.unwrap();
    assert_eq!(client.get_device_time().await.unwrap(), 1_700_000_123);
    device_task.await.unwrap();
}

#[tokio::test]
async fn unanswered_command_times_out() {
    let (client, mut device) = client(config(50));

    let device_task = tokio::spawn(async move {
        device.recv_command().await;
        device
    });

    let err = client.send_self_advert(false).await.unwrap_err();
    assert!(matches!(err, LinkError::Timeout { .. }));
    let _device = device_task.await.unwrap();
}

#[tokio::test]
async fn typed_push_subscriptions_receive_decoded_payloads() {
    let (client, mut device) = client(config(1000));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let confirmed = tx.clone();
    client
        .on_send_confirmed(move |c| {
            let _ = confirmed.send(format!("ack {} {}", c.ack_code, c.round_trip_ms));
        })
        .unwrap();
    let waiting = tx.clone();
    client
        .on_msg_waiting(move || {
            let _ = waiting.send("waiting".to_string());
        })
        .unwrap();
    let all = client
        .on_push(move |push| {
            let _ = tx.send(format!("any {}", push.definition().name));
        })
        .unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(client.link().push_handler_count(PUSH_CODE_ADVERT), 1);

    device
        .send_push(PushNotification::SendConfirmed(SendConfirmation {
            ack_code: AckCode::new([0xde, 0xad, 0xbe, 0xef]),
            round_trip_ms: 812,
        }))
        .await;
    device.send_push(PushNotification::MsgWaiting).await;

    let mut seen = Vec::new();
    for _ in 0..4 {
        seen.push(rx.recv().await.unwrap());
    }
    assert_eq!(seen[0], "ack deadbeef 812");
    assert!(seen[1].starts_with("any "));
    assert_eq!(seen[2], "waiting");
    assert!(seen[3].starts_with("any "));

    for sub in all {
        assert!(client.link().unsubscribe(sub));
    }
    assert_eq!(client.link().push_handler_count(PUSH_CODE_ADVERT), 0);
}
