//! Output device discovery.

use crate::Result;
use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};

/// Fallback rate when a device cannot report its default config.
const FALLBACK_SAMPLE_RATE: u32 = 44100;

/// Extract device name via `description()` (cpal 0.17+).
pub(crate) fn device_name(device: &Device) -> std::result::Result<String, cpal::DeviceNameError> {
    device.description().map(|d| d.name().to_string())
}

/// Audio output device information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    /// Human-readable device name.
    pub name: String,
    /// Whether this is the host's default output.
    pub is_default: bool,
    /// Default sample rate in Hz.
    pub default_sample_rate: u32,
    /// Channel count of the default output config.
    pub channels: u16,
}

fn describe(device: &Device, default_name: Option<&str>) -> Option<AudioDevice> {
    let name = device_name(device).ok()?;
    let (default_sample_rate, channels) = device
        .default_output_config()
        .map(|c| (c.sample_rate(), c.channels()))
        .unwrap_or((FALLBACK_SAMPLE_RATE, 2));
    Some(AudioDevice {
        is_default: default_name == Some(name.as_str()),
        name,
        default_sample_rate,
        channels,
    })
}

/// List all output devices of the default host.
pub fn list_output_devices() -> Result<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let default_name = host
        .default_output_device()
        .and_then(|d| device_name(&d).ok());

    let mut devices = Vec::new();
    if let Ok(outputs) = host.output_devices() {
        for device in outputs {
            if let Some(info) = describe(&device, default_name.as_deref())
                && !devices.iter().any(|d: &AudioDevice| d.name == info.name)
            {
                devices.push(info);
            }
        }
    }

    tracing::debug!(count = devices.len(), host = host.id().name(), "enumerated output devices");
    Ok(devices)
}

/// Get the default output device info, if the host has one.
pub fn default_output_device() -> Result<Option<AudioDevice>> {
    let host = cpal::default_host();
    Ok(host.default_output_device().and_then(|d| {
        let name = device_name(&d).ok();
        describe(&d, name.as_deref())
    }))
}
