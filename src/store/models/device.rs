use serde_json::Value;
use std::collections::HashMap;
use std::net::IpAddr;
use super::parse_object;

/// Device-to-profile directory.
///
/// ```json
/// {
///   "devices": {
///     "192.168.1.20": {"profile": "Teen"},
///     "192.168.1.21": "Kids"
///   },
///   "default_profile": "Kids"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDirectory {
    pub devices: HashMap<IpAddr, String>,
    pub default_profile: Option<String>,
}

impl DeviceDirectory {
    pub fn from_json(text: &str) -> Self {
        let Some(root) = parse_object(text, "device directory") else {
            return Self::default();
        };

        let mut devices = HashMap::new();
        if let Some(entries) = root.get("devices").and_then(Value::as_object) {
            for (ip, entry) in entries {
                let Ok(ip) = ip.trim().parse::<IpAddr>() else {
                    tracing::debug!("Skipping device entry with invalid IP: {}", ip);
                    continue;
                };
                match device_profile(entry) {
                    Some(profile) => {
                        devices.insert(ip, profile);
                    }
                    None => tracing::debug!("Skipping device entry without profile: {}", ip),
                }
            }
        }

        Self {
            devices,
            default_profile: root.get("default_profile").and_then(profile_name),
        }
    }

    pub fn profile_for(&self, ip: IpAddr) -> Option<&str> {
        self.devices.get(&ip).map(String::as_str)
    }
}

fn device_profile(entry: &Value) -> Option<String> {
    match entry {
        Value::Object(record) => record.get("profile").and_then(profile_name),
        other => profile_name(other),
    }
}

/// Blank names count as absent.
fn profile_name(value: &Value) -> Option<String> {
    let name = value.as_str()?.trim();
    (!name.is_empty()).then(|| name.to_string())
}
