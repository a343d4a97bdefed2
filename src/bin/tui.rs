use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;
use std::{io, time::Duration};

use clap::Parser;
use flash_feed::{
    channel, BookSnapshot, Engine, GaugeSink, HandlerConfig, LatencyProbe, MarketDataHandler,
    NoPlacement, Side, SyntheticConfig,
};

const DEPTH: usize = 15;

#[derive(Debug, Parser)]
#[command(name = "tui-demo", about = "Live view of the aggregated book")]
struct Args {
    /// UDP port to receive market data on
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Minimum spacing of synthetic orders
    #[arg(long, default_value_t = 1)]
    synthetic_interval_ms: u64,
}

struct SharedStats {
    processed: AtomicU64,
    book_snapshot: RwLock<BookSnapshot>,
}

// Helper to generate the ASCII Bar string
fn render_level_bars(levels: &[(f64, u64)], side: Side) -> String {
    let mut out = String::new();
    let max_qty = levels.iter().map(|(_, q)| *q).max().unwrap_or(1).max(1) as f64;

    for (price, qty) in levels.iter().take(DEPTH) {
        let bar_len = ((*qty as f64 / max_qty) * 20.0) as usize;
        let bar = "█".repeat(bar_len);
        let line = match side {
            // Bid: Qty | Bar | Price
            Side::Buy => format!("{:>8} {:>20} {:>8.2}\n", qty, bar, price),
            // Ask: Price | Bar | Qty
            Side::Sell => format!("{:<8.2} {:<20} {:<8}\n", price, bar, qty),
        };
        out.push_str(&line);
    }
    out
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Pipeline: handler -> queue -> engine thread publishing snapshots
    let (producer, mut consumer) = channel();
    let mut handler = MarketDataHandler::new(
        producer,
        HandlerConfig {
            bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: args.port,
            core: None,
            synthetic: SyntheticConfig {
                interval_ms: args.synthetic_interval_ms,
                ..SyntheticConfig::default()
            },
            ..HandlerConfig::default()
        },
    )
    .with_placement(Arc::new(NoPlacement));
    let mode = handler.start()?;
    let feed = handler.stats();

    let gauges = Arc::new(GaugeSink::new());
    let stats = Arc::new(SharedStats {
        processed: AtomicU64::new(0),
        book_snapshot: RwLock::new(BookSnapshot::default()),
    });
    let running = Arc::new(AtomicBool::new(true));

    let engine_thread = {
        let stats = Arc::clone(&stats);
        let running = Arc::clone(&running);
        let mut engine = Engine::new(LatencyProbe::new(gauges.clone()));
        thread::spawn(move || {
            while running.load(Ordering::Acquire) {
                let mut batch = 0u64;
                while let Some(order) = consumer.dequeue() {
                    engine.process(order);
                    batch += 1;
                }
                if batch > 0 {
                    stats.processed.fetch_add(batch, Ordering::Relaxed);
                    if let Ok(mut guard) = stats.book_snapshot.write() {
                        *guard = engine.book().snapshot(DEPTH);
                    }
                }
                thread::sleep(Duration::from_millis(1));
            }
        })
    };

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    loop {
        // Handle input
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.code == KeyCode::Char('q') {
                    break;
                }
            }
        }

        terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .margin(1)
                .constraints(
                    [
                        Constraint::Length(3),  // Header
                        Constraint::Min(10),    // Book
                        Constraint::Length(8), // Stats
                    ]
                    .as_ref(),
                )
                .split(f.size());

            // 1. Header
            let header = Block::default().borders(Borders::ALL).title("FLASH-FEED Aggregated Book");
            let title = Paragraph::new(format!("{mode:?} | Press 'q' to quit"))
                .block(header)
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::Cyan));
            f.render_widget(title, chunks[0]);

            // 2. Book
            let book_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(chunks[1]);

            let snapshot = stats
                .book_snapshot
                .read()
                .map(|s| s.clone())
                .unwrap_or_default();

            let bids_widget = Paragraph::new(render_level_bars(&snapshot.bids, Side::Buy))
                .block(Block::default().borders(Borders::ALL).title("BIDS").style(Style::default().fg(Color::Green)));
            let asks_widget = Paragraph::new(render_level_bars(&snapshot.asks, Side::Sell))
                .block(Block::default().borders(Borders::ALL).title("ASKS").style(Style::default().fg(Color::Red)));

            f.render_widget(bids_widget, book_chunks[0]);
            f.render_widget(asks_widget, book_chunks[1]);

            // 3. Stats
            let throughput = gauges.throughput_ops();
            let ops_fmt = if throughput > 1_000_000.0 {
                format!("{:.2} M", throughput / 1_000_000.0)
            } else {
                format!("{:.0} k", throughput / 1_000.0)
            };

            let stats_text = format!(
                "Throughput (last): {} ops/sec\nLatency (last): {:.3} us\nProcessed: {}\nFeed: {} packets / {} synthetic / {} errors",
                ops_fmt,
                gauges.latency_us(),
                stats.processed.load(Ordering::Relaxed),
                feed.packets(),
                feed.synthetic(),
                feed.recv_errors(),
            );

            let stats_block = Paragraph::new(stats_text)
                .block(Block::default().borders(Borders::ALL).title("Pipeline Telemetry"))
                .style(Style::default().fg(Color::Yellow));
            f.render_widget(stats_block, chunks[2]);
        })?;
    }

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    handler.stop();
    running.store(false, Ordering::Release);
    // The alternate screen is gone, so a worker panic surfaces as the exit error
    engine_thread
        .join()
        .map_err(|_| "processing thread panicked")?;
    Ok(())
}
