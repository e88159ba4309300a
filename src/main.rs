use lbwatch::config::Config;
use lbwatch::dashboard::{self, DashboardView};
use lbwatch::logging;
use lbwatch::monitor::Monitor;
use lbwatch::store::VoteLog;
use lbwatch::ws::client::{TransportEvent, TzktWsClient};
use lbwatch::ws::session::{Session, SessionEvent};
use std::io::{self, Write};
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{info, warn};

const CONFIG_FILE: &str = "lbwatch.toml";

fn redraw<W: Write>(out: &mut W, session: &Session, monitor: &Monitor) {
    let view = DashboardView::from_monitor(session.is_connected(), monitor);
    if let Err(e) = dashboard::draw(out, &view) {
        warn!(error = %e, "dashboard redraw failed");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = if Path::new(CONFIG_FILE).exists() {
        Config::load(Path::new(CONFIG_FILE))?
    } else {
        Config::from_env()?
    };

    let _log_guard = logging::init(&config.logging)?;

    info!("lbwatch v{} starting", env!("CARGO_PKG_VERSION"));
    info!(
        url = %config.tzkt.ws_url,
        mode = %config.display.mode,
        history = config.display.history_capacity,
        vote_log = config.vote_log.enabled,
        "configuration loaded"
    );

    // --- OFF vote log ---
    let vote_log = if config.vote_log.enabled {
        Some(VoteLog::open(
            config.vote_log.path.clone(),
            config.legacy_log_path(),
        ))
    } else {
        info!("vote log disabled");
        None
    };

    let mut monitor = Monitor::new(
        config.display.mode,
        config.display.history_capacity,
        vote_log,
    );
    let mut session = Session::new();
    let mut stdout = io::stdout();
    redraw(&mut stdout, &session, &monitor);

    // --- TzKT hub ---
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<TransportEvent>();
    let client = TzktWsClient::new(config.tzkt.ws_url.clone(), config.keepalive());
    let outbound = client.connect(event_tx);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    // Single writer: every state change happens in this loop.
    loop {
        let event = tokio::select! {
            event = event_rx.recv() => event.unwrap_or(TransportEvent::Closed {
                reason: Some("transport task ended".to_string()),
            }),
            _ = &mut ctrl_c => {
                info!("interrupted, shutting down");
                TransportEvent::Closed { reason: Some("interrupted".to_string()) }
            }
        };

        let was_connected = session.is_connected();
        let events = match event {
            TransportEvent::Opened => session.on_open()?,
            TransportEvent::Text(chunk) => session.on_text(&chunk),
            TransportEvent::Closed { reason } => session.on_close(reason),
        };

        let mut dirty = was_connected != session.is_connected();
        let mut closed = false;
        for ev in events {
            match ev {
                SessionEvent::Send(frame) => {
                    if outbound.send(frame).is_ok() {
                        session.on_sent();
                    } else {
                        warn!("transport gone, frame not sent");
                    }
                }
                SessionEvent::Block(raw) => {
                    dirty |= monitor.handle_block(&raw).reduced;
                }
                SessionEvent::Closed { reason } => {
                    warn!(reason = ?reason, "session ended");
                    dirty = true;
                    closed = true;
                }
            }
        }

        if dirty {
            redraw(&mut stdout, &session, &monitor);
        }
        if closed {
            break;
        }
    }

    let (frames, dropped) = session.frame_counts();
    info!(
        frames,
        dropped,
        blocks = monitor.blocks_seen(),
        "lbwatch stopped"
    );
    drop(outbound);

    Ok(())
}
