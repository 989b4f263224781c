//! Device link tests against an in-process fake encoder server

use encoding_rs::BIG5;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use recsched::device::protocol::LIST_COMMAND;
use recsched::device::{
    is_synthetic_error, parse_device_list, CommandTransport, Device, DeviceRegistry,
    EncoderController, LinkPool, LinkSettings,
};

struct FakeEncoder {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
}

impl FakeEncoder {
    fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

/// Serve Big5 text lines; with `drop_first` the first connection is closed
/// after reading one command, without answering
async fn spawn_encoder(drop_first: bool, reply: fn(&str) -> String) -> FakeEncoder {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));
    let connections = Arc::new(AtomicUsize::new(0));

    let (rx_log, conn_count) = (received.clone(), connections.clone());
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let index = conn_count.fetch_add(1, Ordering::SeqCst);
            let log = rx_log.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                let mut line = Vec::new();
                loop {
                    line.clear();
                    match reader.read_until(b'\n', &mut line).await {
                        Ok(0) | Err(_) => return,
                        Ok(_) => {}
                    }
                    let (text, _, _) = BIG5.decode(&line);
                    let command = text.trim().to_string();
                    log.lock().unwrap().push(command.clone());
                    if drop_first && index == 0 {
                        return;
                    }
                    let line = format!("{}\r\n", reply(&command));
                    let (bytes, _, _) = BIG5.encode(&line);
                    if reader.get_mut().write_all(&bytes).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    FakeEncoder {
        addr,
        received,
        connections,
    }
}

fn settings() -> LinkSettings {
    LinkSettings::new(Duration::from_secs(1), Duration::from_millis(100), "big5").unwrap()
}

fn pool_for(addr: SocketAddr) -> Arc<LinkPool> {
    let registry =
        DeviceRegistry::from_devices([Device::new("Enc1", addr.ip().to_string(), addr.port())]);
    Arc::new(LinkPool::new(registry, settings()))
}

fn ok(_: &str) -> String {
    "OK".to_string()
}

#[tokio::test]
async fn test_commands_reuse_one_connection() {
    let encoder = spawn_encoder(false, ok).await;
    let pool = pool_for(encoder.addr);

    assert_eq!(pool.execute("Enc1", "EncStatus \"Enc1\"").await, "OK");
    assert_eq!(pool.execute("Enc1", "EncStatus \"Enc1\"").await, "OK");
    assert_eq!(encoder.connections(), 1);
    assert_eq!(encoder.received().len(), 2);

    pool.close_all().await;
}

#[tokio::test]
async fn test_retry_once_after_peer_close() {
    let encoder = spawn_encoder(true, ok).await;
    let pool = pool_for(encoder.addr);

    let response = pool.execute("Enc1", "Stop \"Enc1\" 1").await;
    assert_eq!(response, "OK");
    assert_eq!(encoder.connections(), 2);
    assert_eq!(
        encoder.received(),
        vec!["Stop \"Enc1\" 1".to_string(), "Stop \"Enc1\" 1".to_string()]
    );
}

#[tokio::test]
async fn test_unreachable_device_gives_synthetic_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let pool = pool_for(addr);
    let response = pool.execute("Enc1", "EncStatus \"Enc1\"").await;
    assert!(is_synthetic_error(&response), "got {response}");

    let controller = EncoderController::new(pool);
    assert!(controller.stop_recording("Enc1").await.is_err());
}

#[tokio::test]
async fn test_setfile_falls_back_to_short_form() {
    fn reply(command: &str) -> String {
        // Only the two-argument Setfile is understood by this server
        if command.starts_with("Setfile") && command.contains(" 1 ") {
            "Invalid parameters".to_string()
        } else {
            "OK".to_string()
        }
    }
    let encoder = spawn_encoder(false, reply).await;
    let controller = EncoderController::new(pool_for(encoder.addr));

    controller
        .start_recording("Enc1", "03.04.2024/0304_News")
        .await
        .unwrap();

    assert_eq!(
        encoder.received(),
        vec![
            "Setfile \"Enc1\" 1 \"03.04.2024/0304_News\"".to_string(),
            "Setfile \"Enc1\" \"03.04.2024/0304_News\"".to_string(),
            "Start \"Enc1\" 1".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_big5_text_survives_the_wire() {
    fn reply(_: &str) -> String {
        "錄影中 Running".to_string()
    }
    let encoder = spawn_encoder(false, reply).await;
    let pool = pool_for(encoder.addr);

    let response = pool.execute("Enc1", "Setfile \"Enc1\" 1 \"新聞\"").await;
    assert_eq!(response, "錄影中 Running");
    assert_eq!(encoder.received(), vec!["Setfile \"Enc1\" 1 \"新聞\"".to_string()]);
}

#[tokio::test]
async fn test_discovery_by_address() {
    fn reply(command: &str) -> String {
        if command == LIST_COMMAND {
            "Enc1 Mode: Encoder\r\nEnc2 Mode: Encoder".to_string()
        } else {
            "OK".to_string()
        }
    }
    let encoder = spawn_encoder(false, reply).await;
    let pool = LinkPool::new(DeviceRegistry::new(), settings());

    let response = pool
        .query_address(&encoder.addr.ip().to_string(), encoder.addr.port(), LIST_COMMAND)
        .await
        .unwrap();
    assert_eq!(
        parse_device_list(&response),
        vec!["Enc1".to_string(), "Enc2".to_string()]
    );
}
