//! Comfort Cloud backend payloads
//!
//! Only the fields needed to find and describe devices are typed; device
//! parameters and status documents are kept as raw JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response of `GET /device/group`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupResponse {
    /// UI flag reported by the backend
    pub ui_flg: bool,
    /// Number of groups
    pub group_count: u32,
    /// Groups with their devices
    pub group_list: Vec<Group>,
}

/// A named group of devices
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Group {
    /// Group id
    pub group_id: i64,
    /// Display name
    pub group_name: String,
    /// Devices in the group
    pub device_list: Vec<Device>,
}

/// Device summary as listed in a group
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Device {
    /// Raw device GUID (may contain `/`)
    pub device_guid: String,
    /// Backend hash of the GUID
    pub device_hash_guid: String,
    /// Device type code
    pub device_type: String,
    /// Display name
    pub device_name: String,
    /// Module number
    pub device_module_number: String,
    /// Access level of the account
    pub permission: i64,
    /// Last known parameters
    pub parameters: Value,
}

impl Device {
    /// Stable id usable with `get_device`: the hash GUID when present,
    /// otherwise the MD5 hex of the raw GUID
    #[must_use]
    pub fn id(&self) -> String {
        if self.device_hash_guid.is_empty() {
            format!("{:x}", md5::compute(self.device_guid.as_bytes()))
        } else {
            self.device_hash_guid.clone()
        }
    }

    /// Whether `id` names this device
    #[must_use]
    pub fn matches(&self, id: &str) -> bool {
        (!self.device_hash_guid.is_empty() && self.device_hash_guid == id)
            || self.device_guid == id
            || format!("{:x}", md5::compute(self.device_guid.as_bytes())) == id
    }
}
