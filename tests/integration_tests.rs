//! Integration tests for the scoring station and the traffic generator
//!
//! These tests run the real UDP receiver, transmitter and match service
//! against each other on loopback.

use client::network::{TrafficGenerator, TrafficPlayer};
use server::clock::MatchClock;
use server::game::{Match, MatchPhase, MatchSettings, Winner};
use server::network::{NetworkConfig, NetworkReceiver, Transmitter};
use server::roster::{Roster, RosterBuilder};
use server::service::{MatchCommand, MatchService};
use shared::{Event, Team};
use tokio::net::UdpSocket;
use tokio::time::{timeout, Duration};

fn roster() -> Roster {
    let mut builder = RosterBuilder::new();
    builder.add_player(1, "Viper", Team::Red, 1).unwrap();
    builder.add_player(2, "Ghost", Team::Red, 2).unwrap();
    builder.add_player(3, "Raven", Team::Green, 3).unwrap();
    builder.add_player(4, "Blaze", Team::Green, 4).unwrap();
    builder.build().unwrap()
}

fn loopback(rx_port: u16, tx_port: u16) -> NetworkConfig {
    NetworkConfig {
        host: "127.0.0.1".to_string(),
        rx_port,
        tx_port,
        ..NetworkConfig::default()
    }
}

/// WIRE PROTOCOL TESTS
mod protocol_tests {
    use super::*;
    use client::command::Command;

    /// Console commands encode to exactly the literals the station decodes
    #[test]
    fn console_commands_reach_station_codec() {
        let cases = [
            ("start", "202"),
            ("end", "221"),
            ("base red", "53"),
            ("base green", "43"),
            ("hit 12 7", "12:7"),
        ];

        for (line, wire) in cases {
            let event = match line.parse::<Command>().unwrap() {
                Command::Send(event) => event,
                other => panic!("{} parsed to {:?}", line, other),
            };
            assert_eq!(shared::encode(&event), wire.as_bytes());
            assert_eq!(shared::decode(wire.as_bytes()).unwrap(), event);
        }
    }

    /// Tests real UDP delivery through the station receiver
    #[tokio::test]
    async fn generator_traffic_is_decoded_by_receiver() {
        let receiver = NetworkReceiver::bind(&loopback(0, 0)).unwrap();
        let addr = receiver.local_addr().unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
        let task = receiver.spawn(tx, stop_rx);

        let generator = TrafficGenerator::with_target(addr).await.unwrap();
        generator.send_raw("12:").await.unwrap();
        generator.send(&Event::GameEnd).await.unwrap();

        for _ in 0..3 {
            let command = timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(matches!(command, MatchCommand::Network(Event::GameEnd)));
        }

        stop_tx.send(true).unwrap();
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }
}

/// FULL MATCH TESTS
mod match_tests {
    use super::*;

    /// Plays a short match over the network: start, tags, base hits, end
    #[tokio::test]
    async fn full_match_over_udp() {
        let receiver = NetworkReceiver::bind(&loopback(0, 0)).unwrap();
        let addr = receiver.local_addr().unwrap();

        let service = MatchService::new(Match::new(roster(), MatchSettings::default()), 64);
        let handle = service.handle();
        let network = receiver.spawn(handle.sender(), service.stop_signal());
        let clock =
            MatchClock::default().spawn(handle.sender(), service.stop_signal());
        let consumer = tokio::spawn(service.run());

        let generator = TrafficGenerator::with_target(addr).await.unwrap();
        let script = [
            Event::GameStart,
            Event::Hit {
                shooter_id: 1,
                target_id: 3,
            },
            Event::Hit {
                shooter_id: 4,
                target_id: 3,
            },
            Event::Hit {
                shooter_id: 2,
                target_id: 2,
            },
            Event::BaseHit { team: Team::Red },
            Event::BaseHit { team: Team::Red },
            Event::BaseHit { team: Team::Green },
            Event::GameEnd,
        ];
        for event in &script {
            generator.send(event).await.unwrap();
        }

        timeout(Duration::from_secs(5), handle.wait_until_ended())
            .await
            .unwrap();
        let report = timeout(Duration::from_secs(5), consumer)
            .await
            .unwrap()
            .unwrap();
        timeout(Duration::from_secs(5), network).await.unwrap().unwrap();
        timeout(Duration::from_secs(5), clock).await.unwrap().unwrap();

        let snapshot = report.snapshot;
        assert_eq!(snapshot.phase, MatchPhase::Ended);
        // Red: 1 tags 3 (+10), captain base hit (+100)
        assert_eq!(snapshot.player(1).unwrap().score, 110);
        // Green: 4 tags a teammate (-10), captain 3 base hit (+100)
        assert_eq!(snapshot.player(4).unwrap().score, -10);
        assert_eq!(snapshot.player(3).unwrap().score, 100);
        assert_eq!(snapshot.red_score, 110);
        assert_eq!(snapshot.green_score, 90);
        assert!(snapshot.red_base_hit);
        assert!(snapshot.green_base_hit);
        assert_eq!(report.winner, Some(Winner::Red));
        assert_eq!(
            snapshot.recent_events.last().map(String::as_str),
            Some("Final Score - Red: 110 | Green: 90")
        );
    }

    /// Local start and end are announced to the equipment
    #[tokio::test]
    async fn station_announces_local_control() {
        let equipment = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = equipment.local_addr().unwrap().port();

        let mut service = MatchService::new(Match::new(roster(), MatchSettings::default()), 16);
        service.set_transmitter(Transmitter::bind(&loopback(0, port)).await.unwrap());
        let handle = service.handle();
        let consumer = tokio::spawn(service.run());

        handle.start().await.unwrap();
        handle.start().await.unwrap();
        handle.end().await.unwrap();
        let report = consumer.await.unwrap();
        assert_eq!(report.winner, Some(Winner::Tie));

        let mut buf = [0u8; 16];
        let mut received = Vec::new();
        for _ in 0..4 {
            let (len, _) = timeout(Duration::from_secs(2), equipment.recv_from(&mut buf))
                .await
                .unwrap()
                .unwrap();
            received.push(String::from_utf8_lossy(&buf[..len]).into_owned());
        }
        assert_eq!(received, ["202", "221", "221", "221"]);
    }

    /// Random traffic never breaks the team total invariant
    #[tokio::test]
    async fn random_traffic_keeps_totals_consistent() {
        let receiver = NetworkReceiver::bind(&loopback(0, 0)).unwrap();
        let addr = receiver.local_addr().unwrap();

        let service = MatchService::new(Match::new(roster(), MatchSettings::default()), 256);
        let handle = service.handle();
        let network = receiver.spawn(handle.sender(), service.stop_signal());
        let consumer = tokio::spawn(service.run());
        handle.start().await.unwrap();

        let players = (1..=4)
            .map(|id| TrafficPlayer::new(id, if id <= 2 { Team::Red } else { Team::Green }))
            .collect();
        let mut generator = TrafficGenerator::with_target(addr)
            .await
            .unwrap()
            .with_players(players)
            .with_seed(2024);
        generator
            .send_random(100, Duration::from_millis(1))
            .await
            .unwrap();

        // Give the receiver a moment before stopping
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.shutdown().await.unwrap();
        let report = consumer.await.unwrap();
        network.await.unwrap();

        let snapshot = report.snapshot;
        for team in Team::ALL {
            let rows = match team {
                Team::Red => &snapshot.red_players,
                Team::Green => &snapshot.green_players,
            };
            let sum: i32 = rows.iter().map(|row| row.score).sum();
            assert_eq!(sum, snapshot.team_score(team));
            assert!(rows.windows(2).all(|w| w[0].score >= w[1].score));
            assert!(rows.iter().filter(|row| row.base_hit).count() <= 1);
        }
    }
}

/// SHUTDOWN TESTS
mod shutdown_tests {
    use super::*;

    /// Everything queued before shutdown is applied, in order
    #[tokio::test]
    async fn shutdown_drains_the_queue() {
        let service = MatchService::new(Match::new(roster(), MatchSettings::default()), 512);
        let handle = service.handle();

        handle.start().await.unwrap();
        handle.shutdown().await.unwrap();
        for _ in 0..50 {
            handle
                .send(MatchCommand::Network(Event::Hit {
                    shooter_id: 3,
                    target_id: 1,
                }))
                .await
                .unwrap();
        }

        let report = service.run().await;
        assert_eq!(report.drained, 50);
        assert_eq!(report.snapshot.green_score, 500);
        assert_eq!(report.winner, Some(Winner::Green));
        assert!(handle.send(MatchCommand::Tick).await.is_err());
    }
}
