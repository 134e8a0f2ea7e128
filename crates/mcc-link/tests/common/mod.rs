//! Scripted device end of an in-memory companion link.

#![allow(dead_code)]

use std::time::Duration;

use mcc_link::{Link, LinkConfig};
use mcc_protocol::{wrap_as, Command, Direction, FrameDecoder, PushNotification, Response};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

pub struct FakeDevice {
    stream: DuplexStream,
    decoder: FrameDecoder,
}

impl FakeDevice {
    /// Reads the next command the host sent.
    pub async fn recv_command(&mut self) -> Command {
        loop {
            if let Some(envelope) = self.decoder.decode().unwrap() {
                assert_eq!(envelope.direction, Direction::HostToDevice);
                return Command::decode(&envelope.payload).unwrap();
            }
            let mut buf = [0u8; 256];
            let n = self.stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "host closed the link");
            self.decoder.push(&buf[..n]);
        }
    }

    pub async fn send(&mut self, response: Response) {
        let payload = response.encode().unwrap();
        self.send_payload(&payload).await;
    }

    pub async fn send_push(&mut self, push: PushNotification) {
        let payload = push.encode().unwrap();
        self.send_payload(&payload).await;
    }

    pub async fn send_payload(&mut self, payload: &[u8]) {
        let bytes = wrap_as(Direction::DeviceToHost, payload).unwrap();
        self.send_raw(&bytes).await;
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
        self.stream.flush().await.unwrap();
    }
}

pub fn config(timeout_ms: u64) -> LinkConfig {
    LinkConfig {
        response_timeout_ms: timeout_ms,
        ..LinkConfig::default()
    }
}

pub fn connect(config: LinkConfig) -> (Link, FakeDevice) {
    let (host, device) = tokio::io::duplex(4096);
    let link = Link::from_stream(host, config);
    let device = FakeDevice {
        stream: device,
        decoder: FrameDecoder::new(),
    };
    (link, device)
}

/// Polls until `n` responses are queued.
pub async fn wait_for_queue(link: &Link, n: usize) {
    for _ in 0..500 {
        if link.queued_responses() == n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!(
        "expected {n} queued responses, found {}",
        link.queued_responses()
    );
}
