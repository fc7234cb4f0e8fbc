use crate::models::device::{DeviceInfo, DeviceSelector};
use crate::models::error::CaptureError;

/// Read-only audio endpoint enumeration.
///
/// The monitor itself only uses `describe` to resolve the capture sample
/// rate before each stream open; hosts may additionally surface `list` in
/// a device picker.
pub trait DeviceQuery: Send {
    /// List every endpoint known to the host, in stable enumeration order.
    fn list(&self) -> Result<Vec<DeviceInfo>, CaptureError>;

    /// Describe a single endpoint.
    fn describe(&self, device: &DeviceSelector) -> Result<DeviceInfo, CaptureError>;
}
