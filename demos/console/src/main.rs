//! Headless Broadside player.
//!
//! Connects, locks a fixed fleet, then fires at random untried cells
//! whenever it's our turn. Useful for exercising a server by hand.
//!
//! ```text
//! cargo run -p broadside-console -- [ws://host:port/game] [--ai]
//! ```
//!
//! `BROADSIDE_URL` is used when no URL is given. Log verbosity follows
//! `RUST_LOG` (default `info`).

use std::collections::HashSet;

use broadside::prelude::*;
use rand::Rng;
use tracing_subscriber::EnvFilter;

const IDENTITY_FILE: &str = "broadside-identity.json";

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

fn default_fleet() -> Positions {
    let ships = [
        (ShipKind::Carrier, 0, Coord(0, 0)),
        (ShipKind::Battleship, 1, Coord(0, 2)),
        (ShipKind::Destroyer, 2, Coord(0, 4)),
        (ShipKind::Submarine, 3, Coord(0, 6)),
    ];
    ships
        .into_iter()
        .map(|(kind, id, origin)| {
            let orientation = (kind != ShipKind::Submarine).then_some(Orientation::Horizontal);
            (kind, ShipPlacement { id, origin, orientation })
        })
        .collect()
}

/// A random cell we haven't fired at yet.
fn pick_target(session: &SessionStore) -> Option<Coord> {
    let grid = session.grid();
    let tried: HashSet<Coord> = session
        .player()
        .board
        .attacks
        .iter()
        .map(|a| a.origin)
        .collect();
    let open: Vec<Coord> = (0..grid.rows)
        .flat_map(|y| (0..grid.columns).map(move |x| Coord(x, y)))
        .filter(|c| !tried.contains(c))
        .collect();
    if open.is_empty() {
        return None;
    }
    Some(open[rand::rng().random_range(0..open.len())])
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let use_ai = args.iter().any(|a| a == "--ai");
    let url_arg = args.iter().find(|a| !a.starts_with("--")).cloned();
    let env_url = std::env::var("BROADSIDE_URL").ok();
    let url = resolve_server_url(None, url_arg.as_deref().or(env_url.as_deref()));

    tracing::info!(%url, use_ai, "starting console player");
    let config = ClientConfig::default()
        .with_server_url(url)
        .with_ai_opponent(use_ai);
    let ClientParts {
        handle,
        mut snapshots,
        mut events,
        task,
    } = GameClient::start(
        config,
        WebSocketConnector::new(),
        FileIdentityStore::new(IDENTITY_FILE),
    );

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ClientEvent::Notice(notice)) => println!("{notice:?}"),
                Some(ClientEvent::ConnectionLost) => {
                    eprintln!("connection lost, giving up");
                    break;
                }
                Some(event) => tracing::info!(?event, "client event"),
                None => break,
            },
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                let session = &snapshot.session;
                let view = &snapshot.presentation;

                if let Some(outcome) = view.outcome {
                    println!("game over: {outcome:?} (score {})", view.score);
                    break;
                }
                if session.identity().is_some()
                    && !session.player().board.is_locked()
                    && session.pending_positions().is_none()
                {
                    if let Err(e) = handle.lock_board(default_fleet()).await {
                        tracing::warn!(error = %e, "could not lock board");
                    }
                    continue;
                }
                if view.attacks_enabled {
                    let Some(target) = pick_target(session) else {
                        continue;
                    };
                    println!("firing at ({}, {})", target.x(), target.y());
                    if let Err(e) = handle.attack(target).await {
                        tracing::warn!(error = %e, "attack not sent");
                    }
                }
            }
        }
    }

    handle.shutdown().await.ok();
    task.await?;
    Ok(())
}
