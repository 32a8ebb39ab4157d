//! Plays one all-bot game and prints every room event as JSON.
//!
//! Run with: `cargo run -p bot-match [config.json]`

use std::time::Duration;

use ludo::prelude::*;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

fn default_config() -> CoreConfig {
    CoreConfig {
        room: RoomConfig {
            capacity: 4,
            required_pieces: 2,
            bots_enabled: true,
            bot_join_delay: Duration::from_millis(200),
            bot_reaction: ReactionDelay {
                base: Duration::from_millis(20),
                jitter: Duration::from_millis(30),
            },
            ..RoomConfig::default()
        },
        sweep: SweepConfig {
            interval: IntervalConfig::every(Duration::from_millis(100)),
        },
        ..CoreConfig::default()
    }
}

fn load_config() -> Result<CoreConfig, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => Ok(CoreConfig::from_json(&std::fs::read_to_string(path)?)?),
        None => Ok(default_config()),
    }
}

// ---------------------------------------------------------------------------
// Event printing
// ---------------------------------------------------------------------------

/// Prints events until the room's game is over. Returns the winner.
async fn follow(
    room_id: RoomId,
    events: &mut mpsc::UnboundedReceiver<RoomEvent>,
    codec: &impl Codec,
) -> Result<Option<PlayerId>, LudoError> {
    while let Some(event) = events.recv().await {
        if event.room_id != room_id {
            continue;
        }
        println!("{}", String::from_utf8_lossy(&codec.encode(&event)?));
        if let GameEvent::GameOver { winner, .. } = event.event {
            return Ok(Some(winner));
        }
    }
    Ok(None)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = load_config()?;
    let (core, mut events) = LudoCore::builder().config(config).start().await?;

    // One bot sits down now; the sweeper fills the remaining seats once
    // the join delay has passed.
    let room_id = core.create_room().await?;
    core.add_bot(room_id).await?;
    tracing::info!(%room_id, "waiting for the sweeper to fill the room");

    match follow(room_id, &mut events, &JsonCodec).await? {
        Some(winner) => eprintln!("room {room_id}: {winner} wins"),
        None => eprintln!("room {room_id}: event stream closed before the game ended"),
    }

    core.shutdown().await;
    Ok(())
}
