use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex},
};

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    BuildStreamError, DefaultStreamConfigError, PlayStreamError, SampleFormat,
};
use log::{error, info};

use crate::{
    engine::renderer::Renderer,
    error::{DisposalError, InitializationError},
};

/// What an opened output reports about itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceInfo {
    pub sample_rate: f32,
    pub channels: usize,
}

/// An audio output the manager can drive.
///
/// `start` takes ownership of the renderer; from then on only the device's
/// callback touches it. `stop` must not return until the callback can no
/// longer run.
pub trait AudioDevice {
    fn open(&mut self) -> Result<DeviceInfo, InitializationError>;
    fn start(&mut self, renderer: Renderer) -> Result<(), InitializationError>;
    fn stop(&mut self) -> Result<(), DisposalError>;
    fn close(&mut self) -> Result<(), DisposalError>;
}

/// Default system output through cpal.
#[derive(Default)]
pub struct CpalDevice {
    device: Option<cpal::Device>,
    config: Option<cpal::SupportedStreamConfig>,
    stream: Option<cpal::Stream>,
}

impl CpalDevice {
    pub fn new() -> Self {
        Self::default()
    }
}

fn backend_error(message: String) -> InitializationError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") {
        InitializationError::PermissionDenied
    } else if lower.contains("busy") {
        InitializationError::DeviceBusy
    } else {
        InitializationError::StreamBuild(message)
    }
}

fn config_error(err: DefaultStreamConfigError) -> InitializationError {
    match err {
        DefaultStreamConfigError::DeviceNotAvailable => InitializationError::NoOutputDevice,
        DefaultStreamConfigError::StreamTypeNotSupported => {
            InitializationError::Unsupported("no output stream type".into())
        }
        other => InitializationError::DeviceConfig(other.to_string()),
    }
}

fn build_error(err: BuildStreamError) -> InitializationError {
    match err {
        BuildStreamError::DeviceNotAvailable => InitializationError::DeviceBusy,
        BuildStreamError::StreamConfigNotSupported => {
            InitializationError::Unsupported("stream config rejected".into())
        }
        other => backend_error(other.to_string()),
    }
}

fn play_error(err: PlayStreamError) -> InitializationError {
    match err {
        PlayStreamError::DeviceNotAvailable => InitializationError::DeviceBusy,
        other => match backend_error(other.to_string()) {
            InitializationError::StreamBuild(message) => InitializationError::StreamStart(message),
            mapped => mapped,
        },
    }
}

impl AudioDevice for CpalDevice {
    fn open(&mut self) -> Result<DeviceInfo, InitializationError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(InitializationError::NoOutputDevice)?;
        let config = device.default_output_config().map_err(config_error)?;

        if config.sample_format() != SampleFormat::F32 {
            return Err(InitializationError::Unsupported(format!(
                "sample format {:?}",
                config.sample_format()
            )));
        }

        let info = DeviceInfo {
            sample_rate: config.sample_rate().0 as f32,
            channels: config.channels() as usize,
        };
        info!(
            "opened output: {} Hz, {} channels",
            info.sample_rate, info.channels
        );

        self.device = Some(device);
        self.config = Some(config);
        Ok(info)
    }

    fn start(&mut self, mut renderer: Renderer) -> Result<(), InitializationError> {
        let (Some(device), Some(config)) = (self.device.as_ref(), self.config.as_ref()) else {
            return Err(InitializationError::NoOutputDevice);
        };
        let channels = config.channels() as usize;

        let stream = device
            .build_output_stream(
                &config.config(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let rendered = panic::catch_unwind(AssertUnwindSafe(|| {
                        renderer.render_interleaved(data, channels)
                    }));
                    if rendered.is_err() {
                        data.fill(0.0);
                        renderer.report_fault();
                    }
                },
                |err| error!("audio stream error: {err}"),
                None,
            )
            .map_err(build_error)?;
        stream.play().map_err(play_error)?;

        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DisposalError> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };
        let paused = stream.pause().map_err(|e| DisposalError(e.to_string()));
        // dropping the stream joins the callback and frees the renderer
        drop(stream);
        paused
    }

    fn close(&mut self) -> Result<(), DisposalError> {
        self.config = None;
        self.device = None;
        Ok(())
    }
}

/// A device with no hardware behind it: the caller pulls audio with [`OfflineDevice::render`].
///
/// Clones share the same renderer slot, so a test can keep one handle while
/// the manager owns another.
#[derive(Clone)]
pub struct OfflineDevice {
    sample_rate: f32,
    channels: usize,
    slot: Arc<Mutex<Option<Renderer>>>,
    fail_open: Option<fn() -> InitializationError>,
    fail_start: Option<fn() -> InitializationError>,
}

impl OfflineDevice {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            channels: 1,
            slot: Arc::new(Mutex::new(None)),
            fail_open: None,
            fail_start: None,
        }
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels.max(1);
        self
    }

    /// Make every `open` fail with the error `make` returns.
    pub fn failing_open(mut self, make: fn() -> InitializationError) -> Self {
        self.fail_open = Some(make);
        self
    }

    /// Make every `start` fail with the error `make` returns.
    pub fn failing_start(mut self, make: fn() -> InitializationError) -> Self {
        self.fail_start = Some(make);
        self
    }

    pub fn is_running(&self) -> bool {
        self.slot.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// Pull `frames` frames of interleaved output, as a device callback would.
    /// Returns silence when nothing is running.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; frames * self.channels];
        let Ok(mut slot) = self.slot.lock() else {
            return out;
        };
        if let Some(renderer) = slot.as_mut() {
            let channels = self.channels;
            let rendered = panic::catch_unwind(AssertUnwindSafe(|| {
                renderer.render_interleaved(&mut out, channels)
            }));
            if rendered.is_err() {
                out.fill(0.0);
                renderer.report_fault();
            }
        }
        out
    }

    /// Run `f` against the running renderer, if any.
    pub fn with_renderer<R>(&self, f: impl FnOnce(&mut Renderer) -> R) -> Option<R> {
        let mut slot = self.slot.lock().ok()?;
        slot.as_mut().map(f)
    }
}

impl AudioDevice for OfflineDevice {
    fn open(&mut self) -> Result<DeviceInfo, InitializationError> {
        if let Some(make) = self.fail_open {
            return Err(make());
        }
        Ok(DeviceInfo {
            sample_rate: self.sample_rate,
            channels: self.channels,
        })
    }

    fn start(&mut self, renderer: Renderer) -> Result<(), InitializationError> {
        if let Some(make) = self.fail_start {
            return Err(make());
        }
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| InitializationError::DeviceBusy)?;
        *slot = Some(renderer);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DisposalError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| DisposalError("renderer slot poisoned".into()))?;
        slot.take();
        Ok(())
    }

    fn close(&mut self) -> Result<(), DisposalError> {
        Ok(())
    }
}
