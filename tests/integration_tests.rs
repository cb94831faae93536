//! Integration tests for the round lifecycle server and its clients
//!
//! These tests validate cross-component interactions and real network behavior.

use bincode::{deserialize, serialize};
use client::state::{RoundView, ViewMode};
use client::sync::TimeSync;
use server::config::ServerConfig;
use server::game::{GameWorld, WorldEvent};
use shared::{
    fallback_phase, fallback_round_number, get_timestamp, Packet, RoundPhase, Segment,
    TowerLayout, SEGMENT_HEIGHT,
};
use std::net::UdpSocket;
use std::thread;
use std::time::{Duration, Instant};
use tokio::time::sleep;

const AUTHORITY: &str = "127.0.0.1:8080";

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Tests packet serialization round-trip for network protocol validation
    #[tokio::test]
    async fn packet_serialization_roundtrip() {
        let test_packets = vec![
            Packet::Join {
                identity: "0xabc".to_string(),
                display_name: "climber".to_string(),
            },
            Packet::PositionReport { height: 73.5 },
            Packet::Finish {
                elapsed_ms: 123_456,
            },
            Packet::TimeSyncRequest {
                request_id: (7u64 << 32) | 3,
            },
            Packet::Joined {
                identity: "0xabc".to_string(),
            },
            Packet::FinishBroadcast {
                display_name: "climber".to_string(),
                finish_order: 1,
                speed_multiplier: 2,
            },
        ];

        for packet in test_packets {
            let serialized = serialize(&packet).unwrap();
            let deserialized: Packet = deserialize(&serialized).unwrap();

            // Verify packet type matches (simplified check)
            match (&packet, &deserialized) {
                (Packet::Join { .. }, Packet::Join { .. }) => {}
                (Packet::PositionReport { .. }, Packet::PositionReport { .. }) => {}
                (Packet::Finish { .. }, Packet::Finish { .. }) => {}
                (Packet::TimeSyncRequest { .. }, Packet::TimeSyncRequest { .. }) => {}
                (Packet::Joined { .. }, Packet::Joined { .. }) => {}
                (Packet::FinishBroadcast { .. }, Packet::FinishBroadcast { .. }) => {}
                _ => panic!("Packet type mismatch after serialization"),
            }
        }
    }

    /// Tests real UDP socket communication
    #[tokio::test]
    async fn udp_socket_communication() {
        let server_socket = UdpSocket::bind("127.0.0.1:0").expect("Failed to bind server socket");
        let server_addr = server_socket.local_addr().unwrap();

        // Echo server
        let server_socket_clone = server_socket.try_clone().unwrap();
        thread::spawn(move || {
            let mut buf = [0; 1024];
            if let Ok((size, client_addr)) = server_socket_clone.recv_from(&mut buf) {
                let _ = server_socket_clone.send_to(&buf[..size], client_addr);
            }
        });

        sleep(Duration::from_millis(10)).await;

        let client_socket = UdpSocket::bind("127.0.0.1:0").expect("Failed to bind client socket");
        client_socket
            .set_read_timeout(Some(Duration::from_millis(100)))
            .unwrap();

        let test_packet = Packet::Join {
            identity: "0xabc".to_string(),
            display_name: "climber".to_string(),
        };
        let serialized = serialize(&test_packet).unwrap();

        client_socket.send_to(&serialized, server_addr).unwrap();

        let mut buf = [0; 1024];
        let (size, _) = client_socket.recv_from(&mut buf).unwrap();
        let received_packet: Packet = deserialize(&buf[..size]).unwrap();

        match received_packet {
            Packet::Join { identity, .. } => assert_eq!(identity, "0xabc"),
            _ => panic!("Wrong packet type received"),
        }
    }
}

/// TOWER GENERATION TESTS
mod generation_tests {
    use super::*;

    /// Tests that a client can rebuild the server's tower from the seed alone
    #[test]
    fn towers_regenerate_from_seed_alone() {
        let world = GameWorld::new(ServerConfig::default(), 1_700_000_000_000);
        let snapshot = world.snapshot();

        let regenerated = TowerLayout::from_seed(snapshot.seed);
        assert_eq!(regenerated.segments, snapshot.segments);
    }

    /// Tests tower determinism and shape invariants across seeds
    #[test]
    fn towers_are_deterministic_across_instances() {
        for seed in [1u64, 42, 12_345, 230_538_014, 1_700_000_000_000] {
            let a = TowerLayout::from_seed(seed);
            let b = TowerLayout::from_seed(seed);
            assert_eq!(a.segments, b.segments);

            assert_eq!(a.segments.first(), Some(&Segment::Base));
            assert_eq!(a.segments.last(), Some(&Segment::Summit));
            assert!((3..=8).contains(&a.middle_count()));
        }
    }

    /// Tests that fallback buckets and the fallback phase agree at boundaries
    #[test]
    fn fallback_buckets_roll_over_into_active_rounds() {
        let boundary = 433 * 3_925_867;

        assert_ne!(
            fallback_round_number(boundary - 1),
            fallback_round_number(boundary)
        );
        assert_eq!(fallback_phase(boundary - 1).0, RoundPhase::Break);
        assert_eq!(fallback_phase(boundary).0, RoundPhase::Active);
    }
}

/// ROUND LIFECYCLE TESTS
mod round_lifecycle_tests {
    use super::*;

    /// Tests that a client view renders the server countdown from the synced clock
    #[test]
    fn server_snapshot_drives_client_countdown() {
        let t0 = 1_000_000;
        let mut world = GameWorld::new(ServerConfig::default(), t0);
        world.handle_join("0xb", "bryn", t0);
        world.handle_finish("0xb", 0, t0 + 100_000);

        // The client's wall clock runs seven seconds fast.
        let mut view = RoundView::new(AUTHORITY);
        let local_now = t0 + 100_000 + 7_000;
        assert!(view.apply_round_state(world.snapshot(), AUTHORITY, local_now));
        view.update_mode(local_now, true);
        assert_eq!(view.mode(), ViewMode::Live);

        // Ten seconds after the finish on the server clock: 320 left at
        // the finish, decaying at x2 since.
        let server_now = t0 + 110_000;
        let round = view
            .effective_round(local_now, Some(server_now))
            .expect("live round");
        assert!((round.remaining - world.remaining(server_now)).abs() < 0.01);
        assert!((round.remaining - 300.0).abs() < 0.01);
        assert_eq!(round.speed_multiplier, 2);
        assert_eq!(
            round.total_height,
            world.snapshot().segments.len() as f32 * SEGMENT_HEIGHT
        );
    }

    /// Tests that a finish accelerates the countdown without a visible jump
    #[test]
    fn finish_acceleration_reaches_clients_without_a_jump() {
        let mut world = GameWorld::new(ServerConfig::default(), 0);
        world.handle_join("0xa", "ada", 0);

        let mut view = RoundView::new(AUTHORITY);
        view.apply_round_state(world.snapshot(), AUTHORITY, 100_000);
        view.update_mode(100_000, true);

        let before = view
            .effective_round(100_000, Some(100_000))
            .expect("live round");
        assert!((before.remaining - 320.0).abs() < 0.01);
        assert_eq!(before.speed_multiplier, 1);

        world.handle_finish("0xa", 0, 100_000);
        view.apply_round_state(world.snapshot(), AUTHORITY, 100_050);

        let at_change = view
            .effective_round(100_050, Some(100_000))
            .expect("live round");
        assert!((at_change.remaining - before.remaining).abs() < 0.01);
        assert_eq!(at_change.speed_multiplier, 2);

        let later = view
            .effective_round(101_000, Some(110_000))
            .expect("live round");
        assert!((later.remaining - (before.remaining - 20.0)).abs() < 0.01);
    }

    /// Tests that the next round reaches clients as a new round
    #[test]
    fn next_round_reaches_clients_as_new() {
        let t0 = 1_000_000;
        let mut world = GameWorld::new(ServerConfig::default(), t0);

        let mut view = RoundView::new(AUTHORITY);
        assert!(view.apply_round_state(world.snapshot(), AUTHORITY, t0));
        // Re-broadcasts of the same round are not new.
        assert!(!view.apply_round_state(world.snapshot(), AUTHORITY, t0 + 1_000));

        assert!(matches!(
            world.poll(t0 + 420_000),
            Some(WorldEvent::RoundOver { .. })
        ));
        assert!(matches!(
            world.poll(t0 + 423_000),
            Some(WorldEvent::BreakStarted)
        ));
        assert!(matches!(
            world.poll(t0 + 433_000),
            Some(WorldEvent::RoundStarted { .. })
        ));

        assert!(view.apply_round_state(world.snapshot(), AUTHORITY, t0 + 433_500));
        let round_id = view.round().map(|s| s.round_id.clone()).unwrap();
        assert_eq!(round_id, (t0 + 433_000).to_string());
    }
}

/// RANKING TESTS
mod ranking_tests {
    use super::*;

    /// Tests that finishers take the podium ahead of any climber
    #[test]
    fn podium_prefers_finishers_over_height() {
        let mut world = GameWorld::new(ServerConfig::default(), 0);
        for (identity, name) in [("0xa", "ada"), ("0xb", "bryn"), ("0xc", "cleo"), ("0xd", "dot")]
        {
            world.handle_join(identity, name, 0);
        }

        // dot climbs highest but never finishes.
        world.handle_height("0xd", 70.0, 10_000);
        world.handle_finish("0xa", 0, 100_000);
        world.handle_finish("0xb", 0, 120_000);
        world.handle_finish("0xc", 0, 140_000);

        // 220 left at the third finish, decaying at x4.
        let Some(WorldEvent::RoundOver { winners }) = world.poll(195_000) else {
            panic!("expected RoundOver");
        };

        assert_eq!(winners.len(), 3);
        assert_eq!(winners[0].identity, "0xa");
        assert_eq!(winners[0].rank, 1);
        assert!((winners[0].finish_time - 100.0).abs() < 0.01);
        assert_eq!(winners[1].identity, "0xb");
        assert_eq!(winners[2].identity, "0xc");
        assert!(winners.iter().all(|w| w.identity != "0xd"));
    }

    /// Tests that climbers back-fill the podium by height when finishers run out
    #[test]
    fn podium_backfills_with_climbers() {
        let mut world = GameWorld::new(ServerConfig::default(), 0);
        world.handle_join("0xa", "ada", 0);
        world.handle_join("0xb", "bryn", 0);
        world.handle_join("0xc", "cleo", 0);

        world.handle_height("0xb", 45.0, 10_000);
        world.handle_height("0xc", 30.0, 10_000);
        world.handle_finish("0xa", 0, 90_000);

        // 330 left at the finish, x2: expires at 255s.
        let Some(WorldEvent::RoundOver { winners }) = world.poll(255_000) else {
            panic!("expected RoundOver");
        };

        assert_eq!(winners.len(), 3);
        assert_eq!(winners[0].identity, "0xa");
        assert!(winners[0].finish_time > 0.0);
        assert_eq!(winners[1].identity, "0xb");
        assert_eq!(winners[1].finish_time, 0.0);
        assert!((winners[1].max_height - 45.0).abs() < 0.01);
        assert_eq!(winners[2].identity, "0xc");
    }

    /// Tests that all-time records only ever improve across rounds
    #[test]
    fn all_time_records_only_improve() {
        let mut world = GameWorld::new(ServerConfig::default(), 0);
        world.handle_join("0xa", "ada", 0);

        // Round 1: finish in 100s.
        world.handle_finish("0xa", 0, 100_000);
        let row = &world.leaderboard()[0];
        assert!((row.best_time - 100.0).abs() < 0.01);
        assert_eq!(row.finish_count, 1);

        // Cycle into round 2 (expiry at 260s with the x2 decay).
        assert!(world.poll(260_000).is_some());
        assert!(world.poll(263_000).is_some());
        assert!(world.poll(273_000).is_some());

        // Round 2: a slower finish changes nothing.
        world.handle_finish("0xa", 0, 273_000 + 200_000);
        let row = &world.leaderboard()[0];
        assert!((row.best_time - 100.0).abs() < 0.01);
        assert_eq!(row.finish_count, 1);

        // Cycle into round 3 (200s finish leaves 220 at x2: over at 310s).
        assert!(world.poll(273_000 + 310_000).is_some());
        assert!(world.poll(273_000 + 313_000).is_some());
        assert!(world.poll(273_000 + 323_000).is_some());

        // Round 3: a faster finish lands.
        let round3_start = 273_000 + 323_000;
        world.handle_finish("0xa", 0, round3_start + 50_000);
        let row = &world.leaderboard()[0];
        assert!((row.best_time - 50.0).abs() < 0.01);
        assert_eq!(row.finish_count, 2);
    }
}

/// CLOCK SYNC TESTS
mod sync_tests {
    use super::*;

    /// Tests clock sync convergence against a real UDP server with a skewed clock
    #[test]
    fn udp_time_sync_against_skewed_server() {
        const SERVER_AHEAD_MS: u64 = 5_000;

        let server_socket = UdpSocket::bind("127.0.0.1:0").expect("Failed to bind server socket");
        let server_addr = server_socket.local_addr().unwrap();

        // Answers probes with timestamps from a clock five seconds ahead.
        thread::spawn(move || {
            server_socket
                .set_read_timeout(Some(Duration::from_secs(2)))
                .unwrap();
            let mut buf = [0u8; 256];
            let mut answered = 0;
            while answered < 5 {
                let Ok((len, from)) = server_socket.recv_from(&mut buf) else {
                    break;
                };
                if let Ok(Packet::TimeSyncRequest { request_id }) = deserialize(&buf[..len]) {
                    let response = Packet::TimeSyncResponse {
                        request_id,
                        received_at: get_timestamp() + SERVER_AHEAD_MS,
                        sent_at: get_timestamp() + SERVER_AHEAD_MS,
                    };
                    let _ = server_socket.send_to(&serialize(&response).unwrap(), from);
                    answered += 1;
                }
            }
        });

        let client_socket = UdpSocket::bind("127.0.0.1:0").expect("Failed to bind client socket");
        client_socket
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();

        let mut sync = TimeSync::new(get_timestamp());
        let deadline = Instant::now() + Duration::from_secs(5);
        while !sync.is_ready() && Instant::now() < deadline {
            if let Some(probe) = sync.tick(get_timestamp()) {
                client_socket
                    .send_to(&serialize(&probe).unwrap(), server_addr)
                    .unwrap();
            }

            let mut buf = [0u8; 256];
            if let Ok((len, _)) = client_socket.recv_from(&mut buf) {
                if let Ok(Packet::TimeSyncResponse {
                    request_id,
                    received_at,
                    sent_at,
                }) = deserialize(&buf[..len])
                {
                    sync.on_response(request_id, received_at, sent_at, get_timestamp());
                }
            }
        }

        assert!(sync.is_ready(), "sync should converge on loopback");
        let error = (sync.offset_ms() - SERVER_AHEAD_MS as i64).abs();
        assert!(
            error < 250,
            "measured offset {}ms is {}ms off",
            sync.offset_ms(),
            error
        );

        // The synced clock reads ahead of the local one.
        let local = get_timestamp();
        assert!(sync.server_now(local) > local);
    }
}

/// AUTHORITY AND VALIDATION TESTS
mod authority_tests {
    use super::*;

    /// Tests that a forged round snapshot cannot overwrite the client view
    #[test]
    fn spoofed_round_state_cannot_overwrite_view() {
        let world = GameWorld::new(ServerConfig::default(), 5_000);

        let mut view = RoundView::new(AUTHORITY);
        assert!(view.apply_round_state(world.snapshot(), AUTHORITY, 10_000));

        let mut forged = world.snapshot();
        forged.round_id = "99999".to_string();
        forged.finisher_count = 42;
        assert!(!view.apply_round_state(forged, "198.51.100.7:4444", 11_000));

        let seen = view.round().expect("accepted snapshot");
        assert_eq!(seen.round_id, "5000");
        assert_eq!(seen.finisher_count, 0);
    }

    /// Tests that the winner feed only accepts the authoritative sender
    #[test]
    fn winner_feed_follows_authority() {
        let mut world = GameWorld::new(ServerConfig::default(), 0);
        world.handle_join("0xa", "ada", 0);
        world.handle_finish("0xa", 0, 60_000);

        // 360 left at the finish, x2: expires at 240s.
        let Some(WorldEvent::RoundOver { winners }) = world.poll(240_000) else {
            panic!("expected RoundOver");
        };

        let mut view = RoundView::new(AUTHORITY);
        assert!(!view.apply_winners(winners.clone(), "198.51.100.7:4444", 241_000));
        assert!(view.winners().is_none());

        assert!(view.apply_winners(winners, AUTHORITY, 241_000));
        let podium = view.winners().expect("accepted winners");
        assert_eq!(podium.len(), 1);
        assert_eq!(podium[0].identity, "0xa");
        assert_eq!(podium[0].rank, 1);
    }
}

/// STRESS AND ERROR HANDLING TESTS
mod stress_tests {
    use super::*;

    /// Tests malformed packet handling
    #[test]
    fn malformed_packet_handling() {
        let valid_packet = Packet::Join {
            identity: "0xabc".to_string(),
            display_name: "climber".to_string(),
        };
        let valid_data = serialize(&valid_packet).unwrap();

        // Test truncated packet
        let truncated_data = &valid_data[..valid_data.len() / 2];
        let result: Result<Packet, _> = deserialize(truncated_data);
        assert!(
            result.is_err(),
            "Should fail to deserialize truncated packet"
        );

        // Test corrupted packet
        let mut corrupted_data = valid_data.clone();
        if !corrupted_data.is_empty() {
            corrupted_data[0] = 0xFF; // Corrupt first byte
        }
        let result: Result<Packet, _> = deserialize(&corrupted_data);
        assert!(
            result.is_err(),
            "Should fail to deserialize corrupted packet"
        );

        // Test empty packet
        let empty_data = vec![];
        let result: Result<Packet, _> = deserialize(&empty_data);
        assert!(result.is_err(), "Should fail to deserialize empty packet");
    }

    /// Tests a crowded round end to end
    #[test]
    fn two_hundred_climbers_share_one_round() {
        let mut world = GameWorld::new(ServerConfig::default(), 0);

        for i in 0..200 {
            let identity = format!("0x{:03}", i);
            world.handle_join(&identity, &format!("climber{}", i), 0);
            world.handle_height(&identity, i as f32 * 0.5, 5_000);
        }
        assert_eq!(world.session_count(), 200);

        // The first five climbers finish a second apart.
        for i in 0..5u64 {
            let identity = format!("0x{:03}", i);
            let outcome = world
                .handle_finish(&identity, 0, (10 + i) * 1_000)
                .expect("finish accepted");
            assert_eq!(outcome.finish_order, i as u32 + 1);
        }

        // Five finishes drive the decay to x6; the round is long over by 100s.
        let Some(WorldEvent::RoundOver { winners }) = world.poll(100_000) else {
            panic!("expected RoundOver");
        };
        assert_eq!(winners.len(), 3);
        assert_eq!(winners[0].identity, "0x000");
        assert_eq!(winners[1].identity, "0x001");
        assert_eq!(winners[2].identity, "0x002");

        let leaderboard = world.leaderboard();
        assert_eq!(leaderboard.len(), 10);

        // Finishers rank ahead of every climber, fastest first.
        assert_eq!(leaderboard[0].identity, "0x000");
        for row in &leaderboard[..5] {
            assert!(row.best_time > 0.0);
        }

        // The tail is the highest non-finishers in height order.
        assert_eq!(leaderboard[5].identity, "0x199");
        for row in &leaderboard[5..] {
            assert_eq!(row.best_time, 0.0);
        }
        for pair in leaderboard[5..].windows(2) {
            assert!(pair[0].best_height >= pair[1].best_height);
        }
    }
}
