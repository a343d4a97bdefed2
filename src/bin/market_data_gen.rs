//! Companion market data generator: sends `SYMBOL,PRICE,QTY,SIDE`
//! datagrams to a running handler.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::net::UdpSocket;
use tokio::time::{self, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flash_feed::MarketDataGenerator;

const BURST_SPACING: Duration = Duration::from_micros(100);

#[derive(Debug, Parser)]
#[command(name = "market-data-gen", version, about = "Send synthetic market data over UDP")]
struct Args {
    /// Target host
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Target port
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Messages per second
    #[arg(short, long, default_value_t = 100)]
    rate: u32,

    /// Duration in seconds (0 = until Ctrl-C)
    #[arg(short, long, default_value_t = 60)]
    duration: u64,

    /// Send this many messages as fast as allowed and exit
    #[arg(short, long, default_value_t = 0)]
    burst: u64,

    /// Seed for a reproducible message sequence
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    if args.rate == 0 {
        bail!("--rate must be at least 1");
    }

    let target = format!("{}:{}", args.host, args.port);
    let socket = UdpSocket::bind("0.0.0.0:0").await.context("binding send socket")?;
    socket
        .connect(&target)
        .await
        .with_context(|| format!("resolving target {target}"))?;

    let mut generator = match args.seed {
        Some(seed) => MarketDataGenerator::seeded(seed),
        None => MarketDataGenerator::new(),
    };

    info!(%target, "market data generator started");

    let sent = if args.burst > 0 {
        info!(count = args.burst, "mode: burst");
        send_burst(&socket, &mut generator, args.burst).await
    } else {
        info!(rate = args.rate, duration = args.duration, "mode: continuous");
        send_continuous(&socket, &mut generator, args.rate, args.duration).await
    };

    info!(sent, "market data generation completed");
    Ok(())
}

async fn send_one(socket: &UdpSocket, generator: &mut MarketDataGenerator) -> bool {
    let Some(message) = generator.next_message() else {
        return false;
    };
    match socket.send(message.as_bytes()).await {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "send failed");
            false
        }
    }
}

async fn send_burst(socket: &UdpSocket, generator: &mut MarketDataGenerator, count: u64) -> u64 {
    let mut sent = 0;
    for i in 1..=count {
        if send_one(socket, generator).await {
            sent += 1;
        }
        if i % 1000 == 0 {
            info!(progress = i, total = count, "burst progress");
        }
        time::sleep(BURST_SPACING).await;
    }
    sent
}

async fn send_continuous(
    socket: &UdpSocket,
    generator: &mut MarketDataGenerator,
    rate: u32,
    duration_secs: u64,
) -> u64 {
    let mut ticker = time::interval(Duration::from_secs(1) / rate.min(1_000_000));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let deadline = async {
        if duration_secs > 0 {
            time::sleep(Duration::from_secs(duration_secs)).await;
        } else {
            std::future::pending::<()>().await;
        }
    };
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(deadline, interrupted);

    let mut sent = 0u64;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if send_one(socket, generator).await {
                    sent += 1;
                    if sent % 100 == 0 {
                        info!(sent, "progress");
                    }
                }
            }
            _ = &mut deadline => break,
            _ = &mut interrupted => {
                info!("interrupted");
                break;
            }
        }
    }
    sent
}
