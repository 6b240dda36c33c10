//! Connect to the Yellow Network feed and print status changes and messages.
//!
//! Run with:
//! ```bash
//! cargo run --example yellow_status
//! YELLOW_URL=ws://127.0.0.1:8000 cargo run --example yellow_status
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::StreamExt;

use clearnode_sdk::prelude::*;

/// Watch-only wallet: has an address but cannot sign.
struct WatchOnlyWallet {
    address: Option<String>,
}

impl Wallet for WatchOnlyWallet {
    fn status(&self) -> WalletStatus {
        match &self.address {
            Some(address) => WalletStatus::connected(address.clone()),
            None => WalletStatus::disconnected(),
        }
    }

    fn sign_message<'a>(&'a self, _message: &'a str) -> BoxFuture<'a, Result<String, AuthError>> {
        Box::pin(async { Err(AuthError::SigningFailed("watch-only wallet".to_string())) })
    }
}

#[tokio::main]
async fn main() -> Result<(), SdkError> {
    tracing_subscriber::fmt::init();

    let url = std::env::var("YELLOW_URL").unwrap_or_else(|_| YELLOW_NETWORK_URL.to_string());
    let wallet = Arc::new(WatchOnlyWallet {
        address: std::env::var("WALLET_ADDRESS").ok(),
    });

    let mut client = ClearNodeClient::builder()
        .config(ClientConfig::yellow_network().with_url(url))
        .wallet(wallet)
        .build()?;

    let _sub = client.on_status_change(|status| {
        println!(
            "status: {} (attempt {}){}",
            status.connection_state,
            status.reconnect_attempt,
            status
                .error
                .as_deref()
                .map(|e| format!(" error: {e}"))
                .unwrap_or_default()
        );
    });

    let mut events = client.events();
    client.connect().await?;

    let deadline = tokio::time::sleep(Duration::from_secs(30));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            () = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => break,
            event = events.next() => match event {
                Some(ClientEvent::Message(message)) => {
                    println!("message: {:?} {}", message.method(), message.payload());
                }
                Some(other) => println!("event: {other:?}"),
                None => break,
            },
        }
    }

    client.disconnect().await;
    Ok(())
}
