//! Music loading: sniffing, chiptune sessions and loop points

mod common;

use approx::assert_relative_eq;
use common::*;
use lumpsound::music::LoopUnit;
use lumpsound::{
    Capabilities, LoadedMusic, MixerConfig, MusicKind, MusicLoader, PurgeTag, SampleZone,
    SoundError,
};

fn loader(library: &FakeChiptuneLibrary) -> MusicLoader {
    MusicLoader::new(&MixerConfig::default()).with_library(library.shared())
}

fn ogg_with_tags(tags: &str) -> Vec<u8> {
    let mut data = b"OggS\x00\x02\x00\x00".to_vec();
    data.extend_from_slice(&[0u8; 32]);
    data.extend_from_slice(tags.as_bytes());
    data.extend_from_slice(&[0u8; 16]);
    data
}

#[test]
fn test_stream_with_looppoint() {
    let library = FakeChiptuneLibrary::new();
    let mut transport = FakeTransport::opened();
    let zone = SampleZone::new();
    let music = loader(&library)
        .load(&ogg_with_tags("LOOPPOINT=4410"), &mut transport, &zone)
        .unwrap();
    match music {
        LoadedMusic::Stream {
            kind, loop_point, ..
        } => {
            assert_eq!(kind, MusicKind::Ogg);
            assert_eq!(loop_point.unit, LoopUnit::Samples);
            assert_relative_eq!(loop_point.seconds, ((44.1 + 4410.0) / 44_100.0) as f32);
        }
        other => panic!("expected a stream, got {:?}", other),
    }
}

#[test]
fn test_stream_last_loop_marker_wins() {
    let library = FakeChiptuneLibrary::new();
    let mut transport = FakeTransport::opened();
    let zone = SampleZone::new();
    let data = ogg_with_tags("LOOPPOINT=4410\x00TITLE=x\x00LOOPMS=2000");
    let music = loader(&library).load(&data, &mut transport, &zone).unwrap();
    let LoadedMusic::Stream { loop_point, .. } = music else {
        panic!("expected a stream");
    };
    assert_eq!(loop_point.seconds, 2.0);
}

#[test]
fn test_stream_without_markers_loops_from_start() {
    let library = FakeChiptuneLibrary::new();
    let mut transport = FakeTransport::opened();
    let zone = SampleZone::new();
    let music = loader(&library)
        .load(b"MThd\x00\x00\x00\x06", &mut transport, &zone)
        .unwrap();
    assert_eq!(music.kind(), MusicKind::Midi);
    let LoadedMusic::Stream { loop_point, .. } = music else {
        panic!("expected a stream");
    };
    assert!(loop_point.is_zero());
}

#[test]
fn test_raw_chiptune_opens_session_at_track_zero() {
    let library = FakeChiptuneLibrary::new();
    let mut transport = FakeTransport::opened();
    let zone = SampleZone::new();
    let music = loader(&library)
        .load(&chip_container(4, 0), &mut transport, &zone)
        .unwrap();
    let LoadedMusic::Chiptune(session) = music else {
        panic!("expected a chiptune session");
    };
    assert_eq!(session.current_track(), Some(0));
    assert_eq!(session.track_count(), 4);
    // The transport never saw the bytes
    assert!(transport.calls.is_empty());
}

#[test]
fn test_gzip_chiptune_uses_music_zone() {
    let library = FakeChiptuneLibrary::new();
    let mut transport = FakeTransport::opened();
    let zone = SampleZone::new();
    let packed = gzip(&chip_container(2, 0));
    let music = loader(&library).load(&packed, &mut transport, &zone).unwrap();
    assert_eq!(music.kind(), MusicKind::Chiptune);
    assert_eq!(zone.bytes_in_use(PurgeTag::Music), 0);
    assert_eq!(zone.bytes_in_use(PurgeTag::Sound), 0);
}

#[test]
fn test_gzip_without_capability_fails() {
    let library = FakeChiptuneLibrary::new();
    let config = MixerConfig::default().with_capabilities(Capabilities::CHIPTUNE);
    let loader = MusicLoader::new(&config).with_library(library.shared());
    let mut transport = FakeTransport::opened();
    let zone = SampleZone::new();
    let result = loader.load(&gzip(&chip_container(2, 0)), &mut transport, &zone);
    assert!(matches!(result, Err(SoundError::FormatUnrecognized)));
}

#[test]
fn test_legacy_header_is_not_special_for_music() {
    let library = FakeChiptuneLibrary::new();
    let mut transport = FakeTransport::opened();
    let zone = SampleZone::new();
    let result = loader(&library).load(&legacy_lump(11_025, &[0x80; 8]), &mut transport, &zone);
    // Handed straight to the stream decoder, which rejects it
    assert!(matches!(result, Err(SoundError::TransportLoadFailed(_))));
    assert_eq!(transport.calls, vec!["load_stream"]);
}

#[test]
fn test_empty_input() {
    let library = FakeChiptuneLibrary::new();
    let mut transport = FakeTransport::opened();
    let zone = SampleZone::new();
    assert!(matches!(
        loader(&library).load(&[], &mut transport, &zone),
        Err(SoundError::FormatUnrecognized)
    ));
}
