//! End-to-end checks of the frame codec and envelope framing.

use mcc_protocol::definitions::{cmd, resp};
use mcc_protocol::*;

fn contact(name: &str, last_modified: u32) -> ContactInfo {
    let mut key = [0u8; PUB_KEY_SIZE];
    key[0] = name.len() as u8;
    key[31] = 0xEE;
    ContactInfo {
        public_key: PublicKey(key),
        contact_type: AdvertType::Repeater,
        flags: 1,
        out_path_len: 3,
        out_path: vec![0x10, 0x20, 0x30],
        name: name.to_string(),
        last_advert: 1_699_999_000,
        latitude: -33.868_82,
        longitude: 151.209_3,
        last_modified,
    }
}

#[test]
fn app_start_end_to_end() {
    let payload = Command::AppStart {
        app_version: 1,
        app_name: "MCC".into(),
    }
    .encode()
    .unwrap();
    let envelope = wrap(&payload).unwrap();

    let header = parse_header(&envelope[..ENVELOPE_HEADER_SIZE]).unwrap();
    assert_eq!(header.direction, Direction::HostToDevice);
    assert_eq!(header.length, 8 + "MCC".len());

    let frame = decode_body(&header, &envelope[ENVELOPE_HEADER_SIZE..]).unwrap();
    assert_eq!(frame.code, CMD_APP_START);
    assert_eq!(frame.values.u8("app_ver").unwrap(), 1);
    assert_eq!(frame.values.text("app_name").unwrap(), "MCC");
}

#[test]
fn envelope_length_bounds() {
    let max = vec![0xA5u8; 65_535];
    let wrapped = wrap(&max).unwrap();
    assert_eq!(&wrapped[1..3], &[0xFF, 0xFF]);
    assert_eq!(wrapped.len(), 65_538);

    let too_big = vec![0u8; 65_536];
    assert_eq!(
        wrap(&too_big).unwrap_err(),
        ProtocolError::FrameTooLarge {
            size: 65_536,
            max: 65_535
        }
    );
}

#[test]
fn cstring_width_boundary() {
    let at_capacity = contact(&"n".repeat(MAX_NAME_SIZE - 1), 0);
    let bytes = Command::AddUpdateContact {
        contact: at_capacity.clone(),
    }
    .encode()
    .unwrap();
    let decoded = Command::decode(&bytes).unwrap();
    assert_eq!(
        decoded,
        Command::AddUpdateContact {
            contact: at_capacity
        }
    );

    let over = contact(&"n".repeat(MAX_NAME_SIZE), 0);
    let err = Command::AddUpdateContact { contact: over }.encode().unwrap_err();
    assert_eq!(
        err,
        ProtocolError::FieldTooLong {
            key: "adv_name",
            max: MAX_NAME_SIZE - 1,
            actual: MAX_NAME_SIZE
        }
    );
}

#[test]
fn optional_field_omission() {
    let full = cmd::ADD_UPDATE_CONTACT
        .encode(&contact("alpha", 0).to_values())
        .unwrap();

    let mut partial_values = FieldValues::new();
    for (key, value) in contact("alpha", 0).to_values().iter() {
        if key != "adv_lat" && key != "adv_lon" {
            partial_values.insert(key, value.clone());
        }
    }
    let partial = cmd::ADD_UPDATE_CONTACT.encode(&partial_values).unwrap();
    assert!(partial.len() < full.len());
    assert_eq!(full.len() - partial.len(), 8);

    let frame = cmd::ADD_UPDATE_CONTACT.decode(&partial).unwrap();
    assert!(!frame.values.contains("adv_lat"));
    assert!(!frame.values.contains("adv_lon"));
    assert_eq!(frame.values.text("adv_name").unwrap(), "alpha");
}

#[test]
fn responses_roundtrip_through_definitions() {
    let responses = vec![
        Response::Ok,
        Response::Err(FirmwareErrorCode::NotFound),
        Response::ContactsStart { count: 2 },
        Response::Contact(contact("bravo", 900)),
        Response::EndOfContacts {
            most_recent_lastmod: 1000,
        },
        Response::Sent(SentInfo {
            send_type: 0,
            expected_ack: AckCode([9, 8, 7, 6]),
            suggested_timeout_ms: 3000,
        }),
        Response::ChannelMessage(ChannelMessage {
            channel_idx: 2,
            path_len: 4,
            text_type: TextType::Plain,
            timestamp: 1_700_000_123,
            text: "ping".into(),
        }),
        Response::CurrentTime {
            epoch_secs: 1_700_000_000,
        },
        Response::NoMoreMessages,
    ];

    for response in responses {
        let bytes = response.encode().unwrap();
        let frame = decode_frame(Direction::DeviceToHost, &bytes).unwrap();
        assert_eq!(frame.code, response.code());
        assert!(!frame.is_push());

        // Re-encoding the decoded values reproduces the wire bytes.
        let again = response.definition().encode(&frame.values).unwrap();
        assert_eq!(again, bytes, "{}", frame.name);

        let decoded = Response::from_frame(&frame).unwrap();
        match (&decoded, &response) {
            (Response::Contact(a), Response::Contact(b)) => {
                assert!((a.latitude - b.latitude).abs() < 1e-6);
                assert!((a.longitude - b.longitude).abs() < 1e-6);
                assert_eq!(a.name, b.name);
                assert_eq!(a.out_path, b.out_path);
                assert_eq!(a.last_modified, b.last_modified);
            }
            _ => assert_eq!(decoded, response),
        }
    }
}

#[test]
fn contact_listing_stream() {
    let mut stream = Vec::new();
    let frames = [
        Response::ContactsStart { count: 2 },
        Response::Contact(contact("one", 500)),
        Response::Contact(contact("two", 1000)),
        Response::EndOfContacts {
            most_recent_lastmod: 1000,
        },
    ];
    for frame in &frames {
        stream.extend(wrap_as(Direction::DeviceToHost, &frame.encode().unwrap()).unwrap());
    }

    // Feed in awkward chunk sizes.
    let mut decoder = FrameDecoder::new();
    let mut codes = Vec::new();
    for chunk in stream.chunks(7) {
        decoder.push(chunk);
        while let Some(envelope) = decoder.decode().unwrap() {
            codes.push(envelope.decode().unwrap().code);
        }
    }
    assert_eq!(
        codes,
        vec![
            RESP_CODE_CONTACTS_START,
            RESP_CODE_CONTACT,
            RESP_CODE_CONTACT,
            RESP_CODE_END_OF_CONTACTS
        ]
    );
}

#[test]
fn self_info_trailing_name() {
    let frame = resp::SELF_INFO
        .encode(
            &SelfInfo {
                name: "companion".into(),
                ..Default::default()
            }
            .to_values(),
        )
        .unwrap();
    let fixed = 3 + PUB_KEY_SIZE + 8 + 4 + 10;
    assert_eq!(frame.len(), 1 + fixed + "companion".len());
    match Response::decode(&frame).unwrap() {
        Response::SelfInfo(info) => assert_eq!(info.name, "companion"),
        other => panic!("unexpected {:?}", other),
    }
}
