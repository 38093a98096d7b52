//! End-to-end tests against a loopback WebSocket "device".
//!
//! The fake device echoes every text frame and can be told to hang up on
//! all current clients while it keeps listening, which is how a device
//! reboot or Wi-Fi hiccup looks from the client side.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use device_link::{
    ConnectionManager, ConnectionStatus, EndpointConfig, EndpointOverride, Error, ReconnectPolicy,
};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(10);

// ============================================================================
// Fake Device
// ============================================================================

struct FakeDevice {
    port: u16,
    hang_up: broadcast::Sender<()>,
}

impl FakeDevice {
    async fn spawn() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let (hang_up, _) = broadcast::channel(4);
        let hang_up_tx = hang_up.clone();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let mut hang_up_rx = hang_up_tx.subscribe();
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    loop {
                        tokio::select! {
                            message = ws.next() => match message {
                                Some(Ok(message)) if message.is_text() => {
                                    if ws.send(message).await.is_err() {
                                        break;
                                    }
                                }
                                Some(Ok(_)) => {}
                                _ => break,
                            },
                            _ = hang_up_rx.recv() => {
                                let _ = ws.close(None).await;
                                break;
                            }
                        }
                    }
                });
            }
        });

        Ok(Self { port, hang_up })
    }

    fn hang_up(&self) {
        let _ = self.hang_up.send(());
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy {
        max_attempts: 10,
        base_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(200),
    }
}

async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) -> Result<()> {
    timeout(WAIT, async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .with_context(|| format!("timed out waiting for {what}"))
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_connect_echo_drop_and_recover() -> Result<()> {
    let device = FakeDevice::spawn().await?;

    let manager = ConnectionManager::builder()
        .endpoint(EndpointConfig::new("127.0.0.1", device.port).with_path("/"))
        .reconnect(fast_policy())
        .build()?;

    let statuses = Arc::new(Mutex::new(Vec::new()));
    let statuses_clone = Arc::clone(&statuses);
    let _status_sub = manager.on_status(move |status| statuses_clone.lock().push(status));

    let inbox_a = Arc::new(Mutex::new(Vec::<String>::new()));
    let inbox_b = Arc::new(Mutex::new(Vec::<String>::new()));
    let a = Arc::clone(&inbox_a);
    let b = Arc::clone(&inbox_b);
    let _sub_a = manager.on_message(move |text| a.lock().push(text.to_string()));
    let _sub_b = manager.on_message(move |text| b.lock().push(text.to_string()));

    manager.connect();
    wait_until("connected", || manager.is_connected()).await?;
    assert_eq!(
        statuses.lock()[..3],
        [
            ConnectionStatus::Idle,
            ConnectionStatus::Connecting,
            ConnectionStatus::Connected,
        ]
    );

    manager.send_command("  PING ")?;
    wait_until("echo", || !inbox_b.lock().is_empty()).await?;
    assert_eq!(*inbox_a.lock(), vec!["PING".to_string()]);
    assert_eq!(*inbox_b.lock(), vec!["PING".to_string()]);

    let before_drop = statuses.lock().len();
    device.hang_up();

    wait_until("reconnected", || {
        statuses.lock().len() > before_drop + 2 && manager.is_connected()
    })
    .await?;

    let after_drop: Vec<_> = statuses.lock()[before_drop..].to_vec();
    assert_eq!(after_drop.first(), Some(&ConnectionStatus::Disconnected));
    assert!(after_drop.contains(&ConnectionStatus::Reconnecting));
    assert_eq!(after_drop.last(), Some(&ConnectionStatus::Connected));
    assert_eq!(manager.reconnect_attempts(), 0);

    manager.send_command("PING")?;
    wait_until("second echo", || inbox_a.lock().len() == 2).await?;

    manager.disconnect();
    assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    assert!(matches!(
        manager.send_command("PING"),
        Err(Error::NotConnected)
    ));

    Ok(())
}

#[tokio::test]
async fn test_manual_disconnect_is_not_undone_by_device() -> Result<()> {
    let device = FakeDevice::spawn().await?;

    let manager = ConnectionManager::builder()
        .endpoint(EndpointConfig::new("127.0.0.1", device.port))
        .reconnect(fast_policy())
        .build()?;

    manager.connect();
    wait_until("connected", || manager.is_connected()).await?;

    manager.disconnect();
    device.hang_up();
    sleep(Duration::from_millis(300)).await;

    assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    assert!(!manager.has_pending_reconnect());
    Ok(())
}

#[tokio::test]
async fn test_unreachable_device_retries_then_gives_up() -> Result<()> {
    // Bind and drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);

    let manager = ConnectionManager::builder()
        .endpoint(EndpointConfig::new("127.0.0.1", 1))
        .reconnect(ReconnectPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
        })
        .build()?;

    let reconnecting = Arc::new(Mutex::new(0_u32));
    let counter = Arc::clone(&reconnecting);
    let _sub = manager.on_status(move |status| {
        if status == ConnectionStatus::Reconnecting {
            *counter.lock() += 1;
        }
    });

    manager.connect_with(&EndpointOverride::new().port(port));
    assert_eq!(manager.endpoint_config().port, port);

    wait_until("exhausted", || {
        manager.reconnect_attempts() == 3
            && manager.status() == ConnectionStatus::Error
            && !manager.has_pending_reconnect()
    })
    .await?;

    sleep(Duration::from_millis(100)).await;
    assert_eq!(*reconnecting.lock(), 3);
    assert_eq!(manager.status(), ConnectionStatus::Error);
    Ok(())
}
