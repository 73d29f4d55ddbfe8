//! Tests against the real ffmpeg/ffprobe binaries; skipped when they are not installed.

use packmaker::audio::{crossfade_sequence, CrossfadeOptions, StartEstimator, Track};
use packmaker::engine::{check_ffmpeg, check_ffprobe};
use packmaker::{Engine, FfmpegEngine, PackError};
use std::f32::consts::PI;
use std::path::Path;

fn tools_available() -> bool {
    if check_ffmpeg().is_err() || check_ffprobe().is_err() {
        eprintln!("ffmpeg not installed, skipping");
        return false;
    }
    true
}

/// Mono 44.1 kHz WAV: `silent` seconds of silence, then `tone` seconds of 440 Hz.
fn write_wav(path: &Path, silent: f32, tone: f32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 44_100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let silent_samples = (silent * 44_100.0) as usize;
    let tone_samples = (tone * 44_100.0) as usize;
    for _ in 0..silent_samples {
        writer.write_sample(0i16).unwrap();
    }
    for n in 0..tone_samples {
        let t = n as f32 / 44_100.0;
        let v = (2.0 * PI * 440.0 * t).sin() * 0.5;
        writer.write_sample((v * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

#[tokio::test]
async fn test_probe_duration() {
    if !tools_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("tone.wav");
    write_wav(&wav, 0.0, 3.0);

    let engine = FfmpegEngine::new();
    let secs = engine.probe_duration(&wav).await.unwrap();
    assert!((secs - 3.0).abs() < 0.05, "{secs}");

    let missing = engine.probe_duration(&dir.path().join("absent.wav")).await;
    assert!(matches!(missing, Err(PackError::FileNotFound(_))));
}

#[tokio::test]
async fn test_silence_estimate_skips_leading_silence() {
    if !tools_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("late.wav");
    write_wav(&wav, 6.0, 20.0);

    let engine = FfmpegEngine::new();
    let track = Track::probe(&engine, &wav).await.unwrap();
    let start = StartEstimator::silence_only()
        .estimate(&engine, &track, 10.0)
        .await
        .unwrap();
    assert!((5.5..7.0).contains(&start), "{start}");

    let start = StartEstimator::default()
        .estimate(&engine, &track, 10.0)
        .await
        .unwrap();
    assert!(start >= 0.0 && start + 10.0 <= track.duration, "{start}");
}

#[tokio::test]
async fn test_crossfade_shortens_by_overlap() {
    if !tools_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let clips: Vec<_> = (1..=3)
        .map(|i| {
            let p = dir.path().join(format!("clip_{i}.wav"));
            write_wav(&p, 0.0, 3.0);
            p
        })
        .collect();
    let out = dir.path().join("out.m4a");

    let engine = FfmpegEngine::new();
    crossfade_sequence(&engine, &clips, &out, &CrossfadeOptions::preview(1.0))
        .await
        .unwrap();

    // 3 * 3s - 2 * 1s
    let secs = engine.probe_duration(&out).await.unwrap();
    assert!((secs - 7.0).abs() < 0.2, "{secs}");
}
