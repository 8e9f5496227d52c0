//! Offline rendering to WAV.

use std::{fs, io::Cursor, path::Path};

use hound::{SampleFormat, WavSpec, WavWriter};
use log::info;

use crate::{
    config::EngineConfig,
    effects::{stages::validate_sample_rate, DefaultStageFactory, EffectsChain},
    engine::{
        renderer::{Renderer, RendererParts},
        visualizer::scope_channel,
    },
    error::ExportError,
    sequencing::{TrackId, TrackKind},
    snapshot::ProjectSnapshot,
    synth::{VoiceId, VoicePool, VoiceRef},
    transport::TransportClock,
    voices::VoiceSpec,
    MAX_BLOCK_SIZE,
};

/// Longest bounce accepted, in seconds.
pub const MAX_EXPORT_SECS: f32 = 600.0;

/// Render `seconds` of the snapshot with the transport running and encode it
/// as mono 16-bit WAV.
pub fn bounce(
    snapshot: &ProjectSnapshot,
    seconds: f32,
    sample_rate: u32,
    config: &EngineConfig,
) -> Result<Vec<u8>, ExportError> {
    if !(seconds > 0.0 && seconds <= MAX_EXPORT_SECS) {
        return Err(ExportError::Duration(seconds));
    }
    let config = config.clone().validated();
    let session = snapshot.restore()?;
    let rate = sample_rate as f32;
    validate_sample_rate(rate)?;

    let layout = session.sequencer.layout();
    let voice = VoiceRef {
        track: layout.find(TrackKind::Melodic).unwrap_or(TrackId(0)),
        id: VoiceId(0),
    };
    let pool = VoicePool::new(&layout, &VoiceSpec::default(), rate, &config)?;
    let chain = EffectsChain::build(voice, session.params, rate, &DefaultStageFactory)?;
    let (tap, _visualizer) = scope_channel(config.scope_window, rate, config.spectrum_bins);

    let mut clock = TransportClock::new(rate);
    clock.set_bpm(session.bpm);
    clock.start();

    let parts = RendererParts {
        clock,
        sequencer: Box::new(session.sequencer),
        pool: Box::new(pool),
        chain: Some(Box::new(chain)),
        tap,
        master_gain: config.master_gain,
    };
    let (mut renderer, mut handle) = Renderer::new(parts, &config);

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(&mut cursor, spec)?;

    let total_frames = (seconds as f64 * sample_rate as f64).round() as usize;
    let mut block = vec![0.0f32; MAX_BLOCK_SIZE];
    let mut frames_written = 0;
    while frames_written < total_frames {
        let frames = (total_frames - frames_written).min(MAX_BLOCK_SIZE);
        let block = &mut block[..frames];
        renderer.render_mono(block);
        // nobody listens offline
        while handle.events.pop().is_ok() {}

        for &sample in block.iter() {
            writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
        }
        frames_written += frames;
    }
    writer.finalize()?;

    info!("bounced {seconds} s at {sample_rate} Hz ({total_frames} frames)");
    Ok(cursor.into_inner())
}

pub fn bounce_to_file(
    path: impl AsRef<Path>,
    snapshot: &ProjectSnapshot,
    seconds: f32,
    sample_rate: u32,
    config: &EngineConfig,
) -> Result<(), ExportError> {
    let bytes = bounce(snapshot, seconds, sample_rate, config)?;
    fs::write(path.as_ref(), bytes)?;
    info!("wrote {}", path.as_ref().display());
    Ok(())
}
