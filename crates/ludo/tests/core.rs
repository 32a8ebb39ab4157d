//! Integration tests for the `LudoCore` facade: wiring, config and a full
//! bot-filled game driven by the background sweeper.

use std::time::Duration;

use ludo::prelude::*;
use ludo::room::BOT_ID_BASE;

fn quick_config() -> CoreConfig {
    CoreConfig {
        room: RoomConfig {
            capacity: 2,
            required_pieces: 1,
            bots_enabled: true,
            bot_join_delay: Duration::from_secs(1),
            bot_reaction: ReactionDelay::INSTANT,
            dice_seed: Some(11),
            ..RoomConfig::default()
        },
        sweep: SweepConfig {
            interval: IntervalConfig {
                initial_jitter: Duration::ZERO,
                ..IntervalConfig::every(Duration::from_millis(100))
            },
        },
        ..CoreConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_fills_room_and_bots_finish_game() {
    let (core, mut events) = LudoCore::builder().config(quick_config()).start().await.unwrap();
    let room_id = core.create_room().await.unwrap();
    core.add_bot(room_id).await.unwrap();

    let mut winner = None;
    while let Some(event) = events.recv().await {
        assert_eq!(event.room_id, room_id);
        if let GameEvent::GameOver { winner: w, losers, .. } = event.event {
            assert_eq!(losers.len(), 1);
            winner = Some(w);
            break;
        }
    }

    let winner = winner.unwrap();
    assert!(winner.0 >= BOT_ID_BASE);
    assert_eq!(core.info(room_id).await.unwrap().status, RoomStatus::Finished);
    core.shutdown().await;
}

#[tokio::test]
async fn test_facade_rejects_out_of_turn_roll() {
    let (core, _events) = LudoCore::builder()
        .config(quick_config())
        .without_sweeper()
        .start()
        .await
        .unwrap();
    let room_id = core.create_room().await.unwrap();
    core.join(room_id, PlayerId(1), "ana").await.unwrap();
    let second = core.join(room_id, PlayerId(2), "ben").await.unwrap();
    assert!(second.started);

    let err = core.roll(room_id, PlayerId(2)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(matches!(err, LudoError::Room(RoomError::NotYourTurn(_))));
    core.roll(room_id, PlayerId(1)).await.unwrap();
}

#[tokio::test]
async fn test_unknown_room_is_not_found() {
    let (core, _events) = LudoCore::builder().without_sweeper().start().await.unwrap();
    let err = core.info(RoomId(42)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_second_core_hydrates_room_from_shared_store() {
    let store = MemoryStore::new();
    let (first, _a) = LudoCore::builder()
        .store(store.clone())
        .without_sweeper()
        .start()
        .await
        .unwrap();
    let room_id = first.create_room().await.unwrap();

    let (second, _b) = LudoCore::builder()
        .store(store.clone())
        .without_sweeper()
        .start()
        .await
        .unwrap();
    let admission = second.join(room_id, PlayerId(7), "gus").await.unwrap();
    assert_eq!(admission.room_id, room_id);
    assert_eq!(second.info(room_id).await.unwrap().players, vec![PlayerId(7)]);
}

#[tokio::test]
async fn test_join_or_create_through_facade() {
    let (core, _events) = LudoCore::builder()
        .config(quick_config())
        .without_sweeper()
        .start()
        .await
        .unwrap();
    let a = core.join_or_create(PlayerId(1), "ana").await.unwrap();
    assert_eq!(core.list_open().await.len(), 1);
    let b = core.join_or_create(PlayerId(2), "ben").await.unwrap();
    assert_eq!(a.room_id, b.room_id);
    assert!(core.list_open().await.is_empty());
}

#[cfg(not(feature = "redis"))]
#[tokio::test]
async fn test_redis_lock_needs_feature() {
    let config = CoreConfig {
        lock: LockConfig::Redis {
            url: "redis://127.0.0.1/".into(),
        },
        ..CoreConfig::default()
    };
    let Err(err) = LudoCore::builder().config(config).start().await else {
        panic!("redis lock should be refused without the feature");
    };
    assert!(matches!(err, LudoError::Room(RoomError::External(_))));
}
