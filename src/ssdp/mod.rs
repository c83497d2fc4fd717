/*!
This module implements the UPnP discovery protocol known as _Simple Service Discovery Protocol_
(SSDP), covering how devices advertise themselves and how control points search and devices
respond.

When a device is added to the network, it multicasts a number of discovery messages advertising
itself, its embedded devices, and its services. Any interested control point can listen to the
standard multicast address for notifications that new capabilities are available. Similarly, when
a new control point is added to the network, it multicasts a discovery message searching for
interesting devices; devices listening on the multicast address answer matching searches with a
unicast response. The fundamental exchange in both cases is a discovery message containing a few
essential specifics about a device: its unique service name, and a pointer (`LOCATION`) to more
detailed information.

The [`Device`](struct.Device.html) record is the in-memory form of one such advertisement, and
[`LocalDevice`](struct.LocalDevice.html) is the announcement-side description that expands into
the set of advertisements a device must emit.
*/

use crate::scpd;
use std::collections::HashMap;
use std::net::IpAddr;
use uuid::Uuid;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

///
/// A device sighted on, or advertised to, the network. The unique service name (USN) has the form
/// `uuid:<uuid>`, optionally followed by `::<target>` naming the advertised device or service
/// type.
///
#[derive(Clone, Debug)]
pub struct Device {
    /// The unique service name this record was advertised under.
    pub usn: String,
    /// Absolute URL of the root description, when the advertisement carried one.
    pub location: Option<String>,
    /// Vendor extension headers (`x-…`), keyed without the prefix.
    pub extra: HashMap<String, String>,
    /// Records advertised under this record's base USN with a `::<target>` suffix.
    pub subdevices: Vec<Device>,
}

///
/// The announcement-side description of the device this process offers: where its metadata server
/// lives, and the identity it advertises under.
///
#[derive(Clone, Debug)]
pub struct LocalDevice {
    pub host: IpAddr,
    pub port: u16,
    pub uuid: Uuid,
    /// Full device type URN, e.g. `urn:schemas-upnp-org:device:Basic:1`.
    pub device_type: String,
    pub friendly_name: String,
    /// PNG image served at the icon path, when configured.
    pub icon: Option<Vec<u8>>,
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl Device {
    pub fn new<S>(usn: S, location: Option<String>) -> Self
    where
        S: Into<String>,
    {
        Device {
            usn: usn.into(),
            location,
            extra: HashMap::new(),
            subdevices: Vec::new(),
        }
    }

    /// The portion of the USN between the first `:` and the first `::`, or the whole USN when
    /// neither is present.
    pub fn uuid(&self) -> &str {
        match self.usn.split_once(':') {
            Some((_, rest)) => match rest.find("::") {
                Some(index) => &rest[..index],
                None => rest,
            },
            None => &self.usn,
        }
    }

    /// The advertised target: the portion after `::`, or the whole USN when absent.
    pub fn target(&self) -> &str {
        match self.usn.split_once("::") {
            Some((_, target)) => target,
            None => &self.usn,
        }
    }

    /// The portion before `::`, shared by a parent and all of its subdevices.
    pub fn base_usn(&self) -> &str {
        match self.usn.split_once("::") {
            Some((base, _)) => base,
            None => &self.usn,
        }
    }

    /// Whether this device answers for the given search target.
    pub fn matches(&self, search_target: &str) -> bool {
        search_target == protocol::TARGET_ALL || search_target == self.target()
    }

    /// Append a subdevice unless one with the same full USN is already recorded. Returns whether
    /// the subdevice was added.
    pub fn add_subdevice(&mut self, device: Device) -> bool {
        if self.subdevices.iter().any(|sub| sub.usn == device.usn) {
            false
        } else {
            self.subdevices.push(device);
            true
        }
    }
}

// ------------------------------------------------------------------------------------------------

impl LocalDevice {
    /// Construct a local device with a freshly generated UUID and no icon.
    pub fn new<S1, S2>(host: IpAddr, port: u16, device_type: S1, friendly_name: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        LocalDevice {
            host,
            port,
            uuid: Uuid::new_v4(),
            device_type: device_type.into(),
            friendly_name: friendly_name.into(),
            icon: None,
        }
    }

    /// The URL at which this device serves its root description.
    pub fn location(&self) -> String {
        format!(
            "http://{}:{}{}",
            self.host,
            self.port,
            scpd::protocol::ROOT_DESC_PATH
        )
    }

    /// The three advertisements a root device emits: the root-device target, the bare UUID, and
    /// the device type, all sharing one location.
    pub fn advertisements(&self) -> Vec<Device> {
        let location = self.location();
        vec![
            format!("uuid:{}::{}", self.uuid, protocol::TARGET_ROOT_DEVICE),
            format!("uuid:{}", self.uuid),
            format!("uuid:{}::{}", self.uuid, self.device_type),
        ]
        .into_iter()
        .map(|usn| Device::new(usn, Some(location.clone())))
        .collect()
    }
}

// ------------------------------------------------------------------------------------------------
// Modules
// ------------------------------------------------------------------------------------------------

pub mod engine;

pub mod message;

pub mod protocol;

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::net::Ipv4Addr;

    #[test]
    fn test_usn_with_target_suffix() {
        let device = Device::new("uuid:abc-123::upnp:rootdevice", None);
        assert_eq!(device.uuid(), "abc-123");
        assert_eq!(device.target(), "upnp:rootdevice");
        assert_eq!(device.base_usn(), "uuid:abc-123");
    }

    #[test]
    fn test_usn_without_target_suffix() {
        let device = Device::new("uuid:abc-123", None);
        assert_eq!(device.uuid(), "abc-123");
        assert_eq!(device.target(), "uuid:abc-123");
        assert_eq!(device.base_usn(), "uuid:abc-123");
    }

    #[test]
    fn test_bare_usn_falls_back_to_whole_string() {
        let device = Device::new("not-a-usn", None);
        assert_eq!(device.uuid(), "not-a-usn");
        assert_eq!(device.target(), "not-a-usn");
    }

    #[test]
    fn test_matches_wildcard_but_not_arbitrary_targets() {
        let device = Device::new("uuid:abc-123", None);
        assert!(device.matches("ssdp:all"));
        assert!(device.matches("uuid:abc-123"));
        assert!(!device.matches("upnp:rootdevice"));

        let typed = Device::new("uuid:abc-123::urn:schemas-upnp-org:device:Basic:1", None);
        assert!(typed.matches("urn:schemas-upnp-org:device:Basic:1"));
        assert!(!typed.matches("urn:schemas-upnp-org:device:Other:1"));
    }

    #[test]
    fn test_duplicate_subdevices_are_refused() {
        let mut parent = Device::new("uuid:abc", None);
        assert!(parent.add_subdevice(Device::new("uuid:abc::upnp:rootdevice", None)));
        assert!(!parent.add_subdevice(Device::new("uuid:abc::upnp:rootdevice", None)));
        assert!(parent.add_subdevice(Device::new("uuid:abc::urn:x:device:Y:1", None)));
        assert_eq!(parent.subdevices.len(), 2);
    }

    #[test]
    fn test_local_device_expands_to_three_advertisements() {
        let device = LocalDevice::new(
            IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10)),
            1999,
            "urn:schemas-upnp-org:device:Basic:1",
            "Test Device",
        );
        let advertisements = device.advertisements();
        assert_eq!(advertisements.len(), 3);
        let expected = vec![
            format!("uuid:{}::upnp:rootdevice", device.uuid),
            format!("uuid:{}", device.uuid),
            format!("uuid:{}::urn:schemas-upnp-org:device:Basic:1", device.uuid),
        ];
        let actual: Vec<String> = advertisements.iter().map(|a| a.usn.clone()).collect();
        assert_eq!(actual, expected);
        for advertisement in &advertisements {
            assert_eq!(
                advertisement.location.as_deref(),
                Some("http://192.0.2.10:1999/root_desc.xml")
            );
        }
    }
}
