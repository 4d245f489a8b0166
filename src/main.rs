//! Conduit host demo.
//!
//! Stands in for a game-server plugin host: the main thread is synchronous
//! and drives the bridge the way a plugin would. Lines read from stdin are
//! treated as game events and relayed to Discord; Discord messages on the
//! bridge channel are printed to stdout.
//!
//! stdin syntax: `join <player>`, `leave <player>`, `death <message>`,
//! anything else is chat from `console`.

use std::io::BufRead;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::signal;
use tracing::{debug, error, info, warn};

use conduit_bridge::config::{env::get_config_path, load_and_validate};
use conduit_bridge::discord::{ServerRoster, ServerStatus};
use conduit_bridge::game::{ChatRelay, GameEvent, GameSink};
use conduit_bridge::{Bridge, LifecycleState};

/// Command prefix of the host when the config sets none.
const HOST_PREFIX: &str = "!";

enum HostEvent {
    Game(GameEvent),
    Shutdown,
}

/// Prints relayed Discord lines as the server would show them in chat.
struct StdoutSink;

impl GameSink for StdoutSink {
    fn broadcast(&self, line: &str) {
        println!("{}", line);
    }
}

/// Players currently on the console server.
struct ConsoleRoster {
    name: String,
    players: Mutex<Vec<String>>,
}

impl ConsoleRoster {
    fn track(&self, event: &GameEvent) {
        let mut players = self.players.lock().unwrap_or_else(PoisonError::into_inner);
        match event {
            GameEvent::PlayerJoin { player } if !players.contains(player) => {
                players.push(player.clone())
            }
            GameEvent::PlayerLeft { player } => players.retain(|p| p != player),
            _ => {}
        }
    }
}

impl ServerRoster for ConsoleRoster {
    fn servers(&self) -> Vec<ServerStatus> {
        let players = self
            .players
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        vec![ServerStatus {
            name: self.name.clone(),
            players: Some(players),
        }]
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Conduit v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let config = load_and_validate(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Please ensure {} exists and is properly formatted.", config_path);
        e
    })?;

    info!("Configuration loaded successfully");

    let server_name = config
        .relay
        .as_ref()
        .map(|relay| relay.server_name.clone())
        .unwrap_or_else(|| "console".to_string());
    let roster = Arc::new(ConsoleRoster {
        name: server_name,
        players: Mutex::new(Vec::new()),
    });

    let bridge = Bridge::from_config(&config, HOST_PREFIX, Some(roster.clone()))?;
    bridge.start()?;

    info!("Waiting for Discord to connect...");
    let ready_timeout = Duration::from_secs(config.bridge.ready_timeout_secs);
    match bridge.ready().wait(ready_timeout) {
        Some(me) => info!("Discord ready as {}", me.name),
        None => {
            error!("Timed out waiting for Discord ({:?})", ready_timeout);
            bridge.stop(bridge.settings().stop_timeout);
            bail!("Discord did not become ready");
        }
    }

    let relay = match config.relay {
        Some(ref relay_config) => {
            let relay = ChatRelay::new(relay_config, Arc::new(StdoutSink));
            relay.attach(&bridge)?;
            Some(relay)
        }
        None => {
            warn!("No relay configured; stdin lines are not forwarded");
            None
        }
    };

    let (events_tx, events_rx) = mpsc::channel::<HostEvent>();
    spawn_stdin_reader(events_tx.clone())?;
    spawn_signal_watcher(events_tx)?;

    let publish = |event: &GameEvent| {
        roster.track(event);
        if let Some(ref relay) = relay {
            // Failures are logged by the relay.
            let _ = relay.on_game_event(&bridge, event);
        }
    };

    publish(&GameEvent::ServerStart);

    loop {
        match events_rx.recv_timeout(Duration::from_secs(1)) {
            Ok(HostEvent::Game(event)) => publish(&event),
            Ok(HostEvent::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                info!("Shutdown signal received - stopping bridge...");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                if bridge.state() != LifecycleState::Running {
                    error!("Bridge stopped unexpectedly ({})", bridge.state());
                    bail!("Discord connection lost");
                }
            }
        }
    }

    publish(&GameEvent::ServerStop);

    let outcome = bridge.stop(bridge.settings().stop_timeout);
    info!("Bridge stop: {:?}", outcome);
    info!("Exiting...");
    Ok(())
}

fn parse_line(line: &str) -> Option<GameEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let event = match word {
        "join" if !rest.is_empty() => GameEvent::PlayerJoin {
            player: rest.to_string(),
        },
        "leave" if !rest.is_empty() => GameEvent::PlayerLeft {
            player: rest.to_string(),
        },
        "death" if !rest.is_empty() => GameEvent::PlayerDeath {
            death_message: rest.to_string(),
        },
        _ => GameEvent::PlayerChat {
            player: "console".to_string(),
            message: line.to_string(),
        },
    };
    Some(event)
}

fn spawn_stdin_reader(events_tx: mpsc::Sender<HostEvent>) -> Result<()> {
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if let Some(event) = parse_line(&line) {
                    if events_tx.send(HostEvent::Game(event)).is_err() {
                        return;
                    }
                }
            }
            debug!("stdin closed");
            let _ = events_tx.send(HostEvent::Shutdown);
        })?;
    Ok(())
}

fn spawn_signal_watcher(events_tx: mpsc::Sender<HostEvent>) -> Result<()> {
    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("Failed to build signal runtime: {}", e);
                    return;
                }
            };
            runtime.block_on(shutdown_signal());
            let _ = events_tx.send(HostEvent::Shutdown);
        })?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        assert_eq!(
            parse_line("join alice"),
            Some(GameEvent::PlayerJoin {
                player: "alice".to_string()
            })
        );
        assert_eq!(
            parse_line("death alice was slain by a zombie"),
            Some(GameEvent::PlayerDeath {
                death_message: "alice was slain by a zombie".to_string()
            })
        );
        assert_eq!(
            parse_line("  hello there "),
            Some(GameEvent::PlayerChat {
                player: "console".to_string(),
                message: "hello there".to_string()
            })
        );
        assert_eq!(
            parse_line("join"),
            Some(GameEvent::PlayerChat {
                player: "console".to_string(),
                message: "join".to_string()
            })
        );
        assert_eq!(parse_line("   "), None);
    }

    #[test]
    fn test_roster_tracks_joins_and_leaves() {
        let roster = ConsoleRoster {
            name: "survival".to_string(),
            players: Mutex::new(Vec::new()),
        };
        roster.track(&GameEvent::PlayerJoin {
            player: "alice".to_string(),
        });
        roster.track(&GameEvent::PlayerJoin {
            player: "alice".to_string(),
        });
        roster.track(&GameEvent::PlayerJoin {
            player: "bob".to_string(),
        });
        roster.track(&GameEvent::PlayerLeft {
            player: "alice".to_string(),
        });

        assert_eq!(
            roster.servers(),
            vec![ServerStatus {
                name: "survival".to_string(),
                players: Some(vec!["bob".to_string()]),
            }]
        );
    }
}
