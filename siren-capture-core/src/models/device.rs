use serde::{Deserialize, Serialize};

/// An audio endpoint reported by a [`DeviceQuery`](crate::traits::device_query::DeviceQuery)
/// backend.
///
/// Serializable so hosts can forward the listing to a device picker UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Position in the backend's enumeration order.
    pub index: usize,
    pub name: String,
    pub max_input_channels: u16,
    pub max_output_channels: u16,
    /// The rate the device currently runs at, in Hz. 0 when unknown.
    pub default_sample_rate: u32,
}

/// How the monitor picks its capture device.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSelector {
    /// The host's default input device.
    #[default]
    Default,
    /// A device by enumeration index (its position in `DeviceQuery::list`).
    Index(usize),
    /// A device by exact name.
    Name(String),
}
