/*!
Discovery and description for UPnP 1.0 devices over SSDP.

This crate implements the two symmetric halves of UPnP discovery. As a
*control point* it watches the SSDP multicast group for device
advertisements, searches on demand, fetches root descriptions and icons
over HTTP, and streams the resulting records to local subscribers. As a
*device* it announces itself on the multicast group, answers matching
searches, and serves its own root description and icon.

More Information:

* [UPnP Device Architecture 1.0](http://www.upnp.org/specs/arch/UPnP-arch-DeviceArchitecture-v1.0.pdf)

*/

#![warn(
    missing_debug_implementations,
    unused_extern_crates,
    rust_2018_idioms
)]

#[macro_use]
extern crate tracing;

#[macro_use]
extern crate lazy_static;

// ------------------------------------------------------------------------------------------------
// Public Values
// ------------------------------------------------------------------------------------------------

/// The UPnP architecture version implemented by this crate.
pub const UPNP_VERSION: &str = "1.0";

/// The domain used in standard device and service type URNs.
pub const UPNP_DOMAIN: &str = "schemas-upnp-org";

// ------------------------------------------------------------------------------------------------
// Modules
// ------------------------------------------------------------------------------------------------

pub mod control;

pub mod error;
pub use error::{Error, MessageFormatError};

pub mod scpd;

pub mod ssdp;

pub mod utils;
