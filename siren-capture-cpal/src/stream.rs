//! Input stream capture via cpal.
//!
//! Opens the requested device at the supervisor's sample rate, converts
//! whatever sample format the host delivers to f32, and forwards blocks to
//! the monitor's callback. cpal reports stream problems through a separate
//! error callback; those messages are parked in a pending-status slot and
//! attached to the next data block, which is where the monitor expects
//! driver notices to arrive.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, StreamConfig};
use log::{debug, warn};
use parking_lot::Mutex;

use siren_capture_core::{
    BlockCallback, CaptureBackend, CaptureBlock, CaptureError, CaptureStream, DeviceSelector,
    ExclusiveMode, OpenRequest,
};

type PendingStatus = Arc<Mutex<Option<String>>>;

/// cpal capture entry point.
///
/// cpal only exposes the host's shared capture mode, so the exclusive-mode
/// probe reports no support and the monitor falls back silently.
#[derive(Debug, Default)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for CpalBackend {
    type Stream = CpalStream;

    fn exclusive_hint(&self) -> Option<ExclusiveMode> {
        None
    }

    fn open(
        &mut self,
        request: &OpenRequest,
        callback: BlockCallback,
    ) -> Result<CpalStream, CaptureError> {
        let device = resolve_device(&request.device)?;
        let default_config = device
            .default_input_config()
            .map_err(|e| CaptureError::StreamFailed(e.to_string()))?;
        let format = default_config.sample_format();

        // Capture at the device's native channel layout; the monitor's sink
        // downmixes. Forcing the requested mono layout on hosts that only
        // deliver the native one fails the open outright.
        let channels = default_config.channels().max(request.channels);

        // cpal has no latency knob or exclusive mode: the latency hint is
        // expressed through the fixed block size below, and `request.exclusive`
        // is always None here (see `exclusive_hint`).

        let mut config = StreamConfig {
            channels,
            sample_rate: SampleRate(request.sample_rate),
            buffer_size: BufferSize::Fixed(request.block_size),
        };

        let pending: PendingStatus = Arc::new(Mutex::new(None));
        let block_capacity = request.block_size as usize * usize::from(channels);

        let stream = match build_stream(&device, &config, format, block_capacity, &callback, &pending)
        {
            Ok(stream) => stream,
            Err(err) => {
                debug!("fixed block size rejected ({err}); retrying with the host default");
                config.buffer_size = BufferSize::Default;
                build_stream(&device, &config, format, block_capacity, &callback, &pending)
                    .map_err(|e| CaptureError::StreamFailed(e.to_string()))?
            }
        };

        Ok(CpalStream {
            stream: Some(stream),
        })
    }
}

/// An open cpal input stream.
///
/// `close` drops the underlying stream handle, which releases the device.
pub struct CpalStream {
    stream: Option<cpal::Stream>,
}

impl CaptureStream for CpalStream {
    fn start(&mut self) -> Result<(), CaptureError> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| CaptureError::StreamFailed("stream already closed".into()))?;
        stream
            .play()
            .map_err(|e| CaptureError::StreamFailed(e.to_string()))
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        if let Some(stream) = &self.stream {
            stream
                .pause()
                .map_err(|e| CaptureError::StreamFailed(e.to_string()))?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        self.stream.take();
        Ok(())
    }
}

fn resolve_device(selector: &DeviceSelector) -> Result<cpal::Device, CaptureError> {
    let host = cpal::default_host();
    match selector {
        DeviceSelector::Default => host
            .default_input_device()
            .ok_or(CaptureError::DeviceNotAvailable),
        DeviceSelector::Index(index) => host
            .devices()
            .map_err(|e| CaptureError::DeviceQueryFailed(e.to_string()))?
            .nth(*index)
            .ok_or(CaptureError::DeviceNotAvailable),
        DeviceSelector::Name(name) => host
            .input_devices()
            .map_err(|e| CaptureError::DeviceQueryFailed(e.to_string()))?
            .find(|d| d.name().map(|n| n == *name).unwrap_or(false))
            .ok_or(CaptureError::DeviceNotAvailable),
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    format: SampleFormat,
    block_capacity: usize,
    callback: &BlockCallback,
    pending: &PendingStatus,
) -> Result<cpal::Stream, CaptureError> {
    let channels = config.channels;
    match format {
        SampleFormat::F32 => {
            let callback = Arc::clone(callback);
            let status_slot = Arc::clone(pending);
            device
                .build_input_stream(
                    config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let status = status_slot.lock().take();
                        callback(CaptureBlock {
                            samples: data,
                            channels,
                            status: status.as_deref(),
                        });
                    },
                    status_err_fn(Arc::clone(pending)),
                    None,
                )
                .map_err(|e| CaptureError::StreamFailed(e.to_string()))
        }
        SampleFormat::I16 => build_converted_stream(
            device,
            config,
            block_capacity,
            callback,
            pending,
            |sample: i16| f32::from(sample) / 32_768.0,
        ),
        SampleFormat::U16 => build_converted_stream(
            device,
            config,
            block_capacity,
            callback,
            pending,
            |sample: u16| (f32::from(sample) - 32_768.0) / 32_768.0,
        ),
        other => Err(CaptureError::StreamFailed(format!(
            "unsupported sample format: {other:?}"
        ))),
    }
}

/// Build a stream for a non-f32 format, converting into a reused scratch
/// buffer sized for one block.
fn build_converted_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    block_capacity: usize,
    callback: &BlockCallback,
    pending: &PendingStatus,
    convert: impl Fn(T) -> f32 + Send + 'static,
) -> Result<cpal::Stream, CaptureError>
where
    T: cpal::SizedSample + Send + 'static,
{
    let channels = config.channels;
    let callback = Arc::clone(callback);
    let status_slot = Arc::clone(pending);
    let mut scratch: Vec<f32> = Vec::with_capacity(block_capacity.max(1));
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                scratch.clear();
                scratch.extend(data.iter().map(|&sample| convert(sample)));
                let status = status_slot.lock().take();
                callback(CaptureBlock {
                    samples: &scratch,
                    channels,
                    status: status.as_deref(),
                });
            },
            status_err_fn(Arc::clone(pending)),
            None,
        )
        .map_err(|e| CaptureError::StreamFailed(e.to_string()))
}

fn status_err_fn(pending: PendingStatus) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err| {
        warn!("input stream error: {err}");
        *pending.lock() = Some(err.to_string());
    }
}
