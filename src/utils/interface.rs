/*!
Resolution of network-interface names to usable IPv4 addresses.
*/

use pnet::datalink;
use std::net::IpAddr;

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

/// The first IPv4 address of the named interface, if one was named and it has any.
pub fn ip_address_for_interface(network_interface: &Option<String>) -> Option<IpAddr> {
    match network_interface {
        None => None,
        Some(name) => ip_addresses_for_interface(name).first().copied(),
    }
}

pub fn ip_addresses_for_interface(interface_name: &str) -> Vec<IpAddr> {
    match datalink::interfaces()
        .into_iter()
        .find(|ni| ni.name == interface_name)
    {
        None => {
            warn!(
                "ip_addresses_for_interface - no interface named {}",
                interface_name
            );
            Vec::new()
        }
        Some(ni) => ni
            .ips
            .iter()
            .filter(|ip| ip.is_ipv4())
            .map(|ip| ip.ip())
            .collect(),
    }
}

/// The first IPv4 address of any interface that is up and not loopback; the address a device
/// announces when none was chosen explicitly.
pub fn default_local_address() -> Option<IpAddr> {
    datalink::interfaces()
        .into_iter()
        .filter(|ni| ni.is_up() && !ni.is_loopback())
        .flat_map(|ni| ni.ips.into_iter())
        .filter(|ip| ip.is_ipv4())
        .map(|ip| ip.ip())
        .next()
}
