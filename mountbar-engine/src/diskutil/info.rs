// SPDX-License-Identifier: GPL-3.0-only

//! Parser for `diskutil info -plist <id>` output

use plist::Value;

/// Detail record for one root disk
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiskInfo {
    /// Built-in storage flag
    pub internal: bool,

    /// True for mounted disk images ("VirtualOrPhysical" == "Virtual")
    pub is_virtual: bool,

    /// Bus protocol (e.g. "USB", "Thunderbolt")
    pub bus_protocol: Option<String>,

    /// IORegistry display name
    pub registry_name: Option<String>,

    /// Media name fallback
    pub media_name: Option<String>,

    /// Persistent UUID of the disk
    pub disk_uuid: Option<String>,
}

impl DiskInfo {
    /// Display name preference: IORegistry name, then media name
    pub fn display_name(&self) -> Option<&str> {
        self.registry_name
            .as_deref()
            .or(self.media_name.as_deref())
    }
}

/// Parse the info record. Unparsable or empty output yields `None`; the
/// caller falls back to defaults rather than failing the refresh over one
/// disk's metadata.
pub fn parse_disk_info(xml: &str) -> Option<DiskInfo> {
    let root = Value::from_reader_xml(xml.as_bytes()).ok()?;
    let dict = root.as_dictionary()?;

    Some(DiskInfo {
        internal: dict
            .get("Internal")
            .and_then(Value::as_boolean)
            .unwrap_or(false),
        is_virtual: dict
            .get("VirtualOrPhysical")
            .and_then(Value::as_string)
            .map(|v| v == "Virtual")
            .unwrap_or(false),
        bus_protocol: dict
            .get("BusProtocol")
            .and_then(Value::as_string)
            .map(str::to_string),
        registry_name: dict
            .get("IORegistryEntryName")
            .and_then(Value::as_string)
            .map(str::to_string),
        media_name: dict
            .get("MediaName")
            .and_then(Value::as_string)
            .map(str::to_string),
        disk_uuid: dict
            .get("DiskUUID")
            .and_then(Value::as_string)
            .map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO_FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>BusProtocol</key><string>USB</string>
    <key>Internal</key><false/>
    <key>VirtualOrPhysical</key><string>Physical</string>
    <key>IORegistryEntryName</key><string>Samsung T7</string>
    <key>MediaName</key><string>Portable SSD</string>
    <key>DiskUUID</key><string>DISK-UUID-4</string>
</dict>
</plist>
"#;

    #[test]
    fn parses_info_record() {
        let info = parse_disk_info(INFO_FIXTURE).unwrap();
        assert!(!info.internal);
        assert!(!info.is_virtual);
        assert_eq!(info.bus_protocol.as_deref(), Some("USB"));
        assert_eq!(info.display_name(), Some("Samsung T7"));
        assert_eq!(info.disk_uuid.as_deref(), Some("DISK-UUID-4"));
    }

    #[test]
    fn unparsable_info_is_none() {
        assert!(parse_disk_info("").is_none());
        assert!(parse_disk_info("garbage").is_none());
    }
}
