//! Audio endpoint enumeration via the default cpal host.

use cpal::traits::{DeviceTrait, HostTrait};

use siren_capture_core::{CaptureError, DeviceInfo, DeviceQuery, DeviceSelector};

/// [`DeviceQuery`] implementation over the default cpal host.
///
/// Enumeration order follows `Host::devices`, so a `DeviceSelector::Index`
/// resolved from `list` stays valid for the stream backend in this crate.
#[derive(Debug, Default)]
pub struct CpalDeviceQuery;

impl CpalDeviceQuery {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceQuery for CpalDeviceQuery {
    fn list(&self) -> Result<Vec<DeviceInfo>, CaptureError> {
        let host = cpal::default_host();
        let devices = host
            .devices()
            .map_err(|e| CaptureError::DeviceQueryFailed(e.to_string()))?;

        Ok(devices
            .enumerate()
            .map(|(index, device)| describe_device(index, &device))
            .collect())
    }

    fn describe(&self, selector: &DeviceSelector) -> Result<DeviceInfo, CaptureError> {
        let host = cpal::default_host();
        match selector {
            DeviceSelector::Default => {
                let device = host
                    .default_input_device()
                    .ok_or(CaptureError::DeviceNotAvailable)?;
                let name = device.name().unwrap_or_default();
                // Recover the enumeration index so the record matches `list`.
                let index = host
                    .devices()
                    .map_err(|e| CaptureError::DeviceQueryFailed(e.to_string()))?
                    .position(|d| d.name().map(|n| n == name).unwrap_or(false))
                    .unwrap_or(0);
                Ok(describe_device(index, &device))
            }
            DeviceSelector::Index(index) => {
                let device = host
                    .devices()
                    .map_err(|e| CaptureError::DeviceQueryFailed(e.to_string()))?
                    .nth(*index)
                    .ok_or(CaptureError::DeviceNotAvailable)?;
                Ok(describe_device(*index, &device))
            }
            DeviceSelector::Name(name) => {
                let devices = host
                    .devices()
                    .map_err(|e| CaptureError::DeviceQueryFailed(e.to_string()))?;
                for (index, device) in devices.enumerate() {
                    if device.name().map(|n| n == *name).unwrap_or(false) {
                        return Ok(describe_device(index, &device));
                    }
                }
                Err(CaptureError::DeviceNotAvailable)
            }
        }
    }
}

fn describe_device(index: usize, device: &cpal::Device) -> DeviceInfo {
    let name = device.name().unwrap_or_else(|_| format!("Device {index}"));

    let (max_input_channels, input_rate) = device
        .default_input_config()
        .map(|config| (config.channels(), config.sample_rate().0))
        .unwrap_or((0, 0));
    let (max_output_channels, output_rate) = device
        .default_output_config()
        .map(|config| (config.channels(), config.sample_rate().0))
        .unwrap_or((0, 0));

    DeviceInfo {
        index,
        name,
        max_input_channels,
        max_output_channels,
        default_sample_rate: if input_rate != 0 { input_rate } else { output_rate },
    }
}
