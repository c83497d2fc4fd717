/*!
This module implements the description half of discovery, reduced to what SSDP points at: the
root-description document a device serves over HTTP, the client that fetches and parses it (and
the device icon), and the mini HTTP server that answers those fetches in device mode.
*/

use std::collections::BTreeMap;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

///
/// The parsed form of a root description: the `device` element's leaf properties (`deviceType`,
/// `friendlyName`, `UDN`, `manufacturer`, `modelName`, …) plus the first advertised icon, when
/// one is listed.
///
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceMetadata {
    /// Leaf properties of the `device` element, keyed by local element name.
    pub properties: BTreeMap<String, String>,
    /// The first `icon` of the `iconList`, keyed by local element name
    /// (`mimetype`, `width`, `height`, `depth`, `url`).
    pub icon: Option<BTreeMap<String, String>>,
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl DeviceMetadata {
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// The URL of the advertised icon, when the description listed one.
    pub fn icon_url(&self) -> Option<&str> {
        self.icon
            .as_ref()
            .and_then(|icon| icon.get("url"))
            .map(String::as_str)
    }
}

// ------------------------------------------------------------------------------------------------
// Modules
// ------------------------------------------------------------------------------------------------

mod client;
pub use client::MetadataClient;

pub mod description;

pub mod protocol;

mod server;
pub use server::MetadataServer;
