//! End-to-end streaming over loopback TCP with a real log file.

use disha_stream::core::Vec3;
use disha_stream::{Config, LinkError};
use disha_stream::link::{ConnectionManager, ConnectionState};
use disha_stream::pose::SimulatedTrackers;
use disha_stream::record::{RecordFormatter, header_line};
use disha_stream::sink::FileLogSink;
use disha_stream::stream::{ArmState, StreamController, TickLoop};
use std::io::Read;
use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const SETTLE: Duration = Duration::from_secs(5);

fn controller(path: &std::path::Path) -> StreamController<FileLogSink> {
    let sink = FileLogSink::open(path).unwrap();
    let link = ConnectionManager::new("StartRecording", Duration::from_secs(2), 64);
    StreamController::new(sink, link, RecordFormatter::default(), "session")
}

/// A port with nothing listening on it
fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn read_lines(path: &std::path::Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_refused_listener_keeps_logging() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tracker_log.txt");
    let mut ctl = controller(&path);

    ctl.start_session("127.0.0.1", closed_port()).unwrap();
    assert_eq!(ctl.link().wait_settled(SETTLE), ConnectionState::Failed);
    assert!(ctl.link().last_error().is_some());

    for i in 0..10 {
        let out = ctl.on_tick(Vec3::ZERO, Vec3::new(i as f32, 0.0, 0.0), 0.011);
        assert!(out.logged);
        assert!(!out.sent);
    }
    let stats = ctl.shutdown();

    assert_eq!(ctl.arm_state(), ArmState::Unarmed);
    assert_eq!(stats.records_logged, 10);
    assert_eq!(stats.records_sent, 0);

    let lines = read_lines(&path);
    assert_eq!(lines.len(), 11);
    assert_eq!(format!("{}\n", lines[0]), header_line());
}

#[test]
fn test_handshake_then_records_match_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tracker_log.txt");
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let mut ctl = controller(&path);

    ctl.start_session("127.0.0.1", port).unwrap();
    let (mut peer, _) = listener.accept().unwrap();
    peer.set_read_timeout(Some(SETTLE)).unwrap();
    assert_eq!(ctl.link().wait_settled(SETTLE), ConnectionState::Ready);

    for i in 0..5 {
        let out = ctl.on_tick(Vec3::ZERO, Vec3::new(0.0, i as f32 + 1.0, 0.0), 0.011);
        assert!(out.sent);
    }
    let stats = ctl.shutdown();
    assert_eq!(stats.records_sent, 5);

    let mut received = String::new();
    peer.read_to_string(&mut received).unwrap();

    let body = received
        .strip_prefix("StartRecording\n")
        .expect("handshake must come first");

    // Byte-identical to the file minus its header, in tick order
    let file = std::fs::read_to_string(&path).unwrap();
    let file_body = file.strip_prefix(header_line().as_str()).unwrap();
    assert_eq!(body, file_body);

    let directions: Vec<String> = body
        .lines()
        .map(|l| l.split('\t').nth(2).unwrap().to_string())
        .collect();
    assert_eq!(
        directions,
        [
            "(0.00, 1.00, 0.00)",
            "(0.00, 2.00, 0.00)",
            "(0.00, 3.00, 0.00)",
            "(0.00, 4.00, 0.00)",
            "(0.00, 5.00, 0.00)",
        ]
    );
}

#[test]
fn test_logging_survives_link_close() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tracker_log.txt");
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let mut ctl = controller(&path);

    ctl.start_session("127.0.0.1", port).unwrap();
    let (_peer, _) = listener.accept().unwrap();
    assert_eq!(ctl.link().wait_settled(SETTLE), ConnectionState::Ready);
    ctl.on_tick(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), 0.011);
    assert!(ctl.is_armed());

    ctl.link_mut().close();
    for n in 0..3 {
        let out = ctl.on_tick(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), 0.011);
        assert!(out.logged);
        assert!(!out.sent);
        assert_eq!(read_lines(&path).len(), 3 + n);
    }
    assert_eq!(ctl.stats().records_dropped, 3);
}

#[test]
fn test_peer_disconnect_after_arming_fails_link() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tracker_log.txt");
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let mut ctl = controller(&path);

    ctl.start_session("127.0.0.1", port).unwrap();
    let (peer, _) = listener.accept().unwrap();
    assert_eq!(ctl.link().wait_settled(SETTLE), ConnectionState::Ready);
    let out = ctl.on_tick(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), 0.011);
    assert!(out.sent);

    // Handshake left unread, so the close resets the connection
    drop(peer);

    let deadline = Instant::now() + SETTLE;
    let mut ticks = 1;
    while ctl.stats().link_errors == 0 && Instant::now() < deadline {
        ctl.on_tick(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), 0.011);
        ticks += 1;
        thread::sleep(Duration::from_millis(5));
    }
    // One more tick with the link known to be down
    let out = ctl.on_tick(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), 0.011);
    ticks += 1;

    assert_eq!(ctl.link().state(), ConnectionState::Failed);
    assert!(matches!(ctl.link().last_error(), Some(LinkError::Transport(_))));
    assert!(ctl.is_armed());
    assert!(out.logged);
    assert!(!out.sent);

    let stats = ctl.shutdown();
    assert_eq!(stats.link_errors, 1);
    assert_eq!(stats.records_logged, ticks);
    assert_eq!(stats.records_sent + stats.records_dropped, ticks);
    assert_eq!(read_lines(&path).len() as u64, ticks + 1);
}

#[test]
fn test_header_written_once_across_sessions() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("logs").join("tracker_log.txt");

    for _ in 0..2 {
        let mut ctl = controller(&path);
        ctl.on_tick(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0), 0.011);
        ctl.shutdown();
    }

    let lines = read_lines(&path);
    assert_eq!(lines.len(), 3);
    assert_eq!(lines.iter().filter(|l| l.starts_with("time\t")).count(), 1);
}

#[test]
fn test_simulated_session_from_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sim.txt");
    let config = Config::from_toml(
        r#"
        [record]
        label = "calibration"

        [simulation]
        tick_rate_hz = 200.0
        random_seed = 7

        [simulation.tracker_1]
        origin = [0.0, 1.0, 0.0]

        [simulation.tracker_2]
        origin = [0.0, 1.0, 0.0]
        radius = 0.5
        noise_stddev = 0.001
        "#,
    )
    .unwrap();

    let sink = FileLogSink::open(&path).unwrap();
    let mut ctl = StreamController::from_config(&config, sink);
    let mut trackers = SimulatedTrackers::from_config(&config).unwrap();
    let running = Arc::new(AtomicBool::new(true));

    let ticks = TickLoop::new(config.simulation.tick_rate_hz, running)
        .with_max_ticks(20)
        .run(&mut trackers, &mut ctl);
    let stats = ctl.shutdown();

    assert_eq!(ticks, 20);
    assert_eq!(stats.records_logged, 20);

    let lines = read_lines(&path);
    assert_eq!(lines.len(), 21);
    for line in &lines[1..] {
        let fields: Vec<&str> = line.split('\t').collect();
        assert_eq!(fields.len(), 6);
        assert_eq!(fields[1], "calibration");
    }
}
