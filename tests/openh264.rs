#![cfg(feature = "openh264")]

mod common;

use common::BouncingCircle;
use raw2mp4::{inspect, EncodingSession, SessionConfig};

fn encode(config: SessionConfig, frames: usize) -> inspect::FileSummary {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.mp4");
    let (width, height) = (config.encoder.width, config.encoder.height);

    let mut session = EncodingSession::open(&path, config).unwrap();
    let mut source = BouncingCircle::new(width, height);
    for _ in 0..frames {
        session.add_frame(&source.next_frame()).unwrap();
    }
    let summary = session.finish().unwrap();
    assert_eq!(summary.frames_written, frames as u64);
    drop(session);

    inspect::summarize(&std::fs::read(&path).unwrap()).unwrap()
}

#[test]
fn test_openh264_sixty_frames() {
    let file = encode(SessionConfig::new(640, 480), 60);
    assert_eq!(file.sample_count, 60);
    assert_eq!(file.sync_samples.first(), Some(&1));
    assert_eq!(file.profile.0, 66);
    assert_eq!((file.width, file.height), (640, 480));
    assert!((file.duration_secs() - 4.0).abs() <= 1.0 / 600.0);
}

#[test]
fn test_openh264_fragmented() {
    let config = SessionConfig::new(320, 240).fragmented(true).keyframe_interval(15);
    let file = encode(config, 45);
    assert_eq!(file.sample_count, 45);
    for forced in [1, 16, 31] {
        assert!(file.sync_samples.contains(&forced), "{:?}", file.sync_samples);
    }
    assert_eq!(file.fragment_count as usize, file.sync_samples.len());
}
