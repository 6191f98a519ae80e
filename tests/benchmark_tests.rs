//! Performance benchmarks for the scoring hot paths

use server::game::{Match, MatchSettings};
use server::publisher::Snapshot;
use server::roster::RosterBuilder;
use shared::{Event, Team};
use std::time::Instant;

fn full_match() -> Match {
    let mut builder = RosterBuilder::new();
    for i in 0..15u32 {
        builder
            .add_player(i + 1, &format!("Red{}", i), Team::Red, i + 1)
            .unwrap();
        builder
            .add_player(i + 101, &format!("Green{}", i), Team::Green, i + 101)
            .unwrap();
    }
    Match::new(builder.build().unwrap(), MatchSettings::default())
}

/// Benchmarks decoding of datagram payloads
#[test]
fn benchmark_decode() {
    let payloads: [&[u8]; 5] = [b"202", b"221", b"53", b"12:101", b"not an event"];

    let iterations = 100_000;
    let start = Instant::now();

    let mut decoded = 0;
    for i in 0..iterations {
        if shared::decode(payloads[i % payloads.len()]).is_ok() {
            decoded += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Decode: {} payloads in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(decoded, iterations / 5 * 4);
    // Generous bound, debug builds included
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks applying hits to a full 15 vs 15 match
#[test]
fn benchmark_apply_hits() {
    let mut game = full_match();
    let now = tokio::time::Instant::now();
    game.start(now);

    let iterations = 50_000u32;
    let start = Instant::now();

    for i in 0..iterations {
        let shooter_id = i % 15 + 1;
        let target_id = (i / 15) % 15 + 101;
        let event = Event::Hit {
            shooter_id,
            target_id,
        };
        game.apply(event, now).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Apply: {} hits in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(game.team_score(Team::Red), iterations as i32 * 10);
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks snapshot capture, which runs after every event and tick
#[test]
fn benchmark_snapshot_capture() {
    let mut game = full_match();
    let now = tokio::time::Instant::now();
    game.start(now);
    for i in 0..15u32 {
        game.register_hit(i + 101, i + 1).unwrap();
    }

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let snapshot = Snapshot::capture(&game, now);
        assert_eq!(snapshot.green_players.len(), 15);
    }

    let duration = start.elapsed();
    println!(
        "Snapshot: {} captures in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 5000);
}
