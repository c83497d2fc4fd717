/*!
Control-point coordination. The [`ControlPoint`](struct.ControlPoint.html) owns everything a
discovery run accumulates: the deduplicated set of remote devices, the description and icon
caches, and the connected listeners. One mutex guards all of it; the per-location in-flight
marker plus a condvar ensure a given description URL is fetched at most once no matter how many
sightings race for it.
*/

use crate::scpd::{DeviceMetadata, MetadataClient};
use crate::ssdp::engine::{DeviceHandler, Engine, Options as EngineOptions};
use crate::ssdp::{protocol, Device};
use crate::Error;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::os::unix::net::UnixStream;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// How long a foreground discovery waits for search responses.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(6);

///
/// The discovery coordinator. Shared behind an `Arc`; every entry point that fans work out to
/// background threads takes `self: Arc<Self>`.
///
pub struct ControlPoint {
    state: Mutex<State>,
    desc_ready: Condvar,
    next_listener_id: AtomicU64,
    filter: Option<String>,
    wait: Duration,
    network_interface: Option<String>,
}

// ------------------------------------------------------------------------------------------------
// Private Types
// ------------------------------------------------------------------------------------------------

/// The lifecycle of one description URL in the cache. `InFlight` is the marker concurrent
/// callers wait on; `Failed` poisons the location without affecting other devices.
#[derive(Clone, Debug)]
enum DescEntry {
    InFlight,
    Ready(DeviceMetadata),
    Failed,
}

#[derive(Debug)]
struct Listener {
    id: u64,
    stream: UnixStream,
}

#[derive(Debug, Default)]
struct State {
    remote_devices: HashMap<String, Device>,
    desc_cache: HashMap<String, DescEntry>,
    icon_cache: HashMap<String, Vec<u8>>,
    listeners: Vec<Listener>,
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl ControlPoint {
    pub fn new(
        filter: Option<String>,
        wait: Duration,
        network_interface: Option<String>,
    ) -> Arc<Self> {
        Arc::new(ControlPoint {
            state: Mutex::new(State::default()),
            desc_ready: Condvar::new(),
            next_listener_id: AtomicU64::new(0),
            filter,
            wait,
            network_interface,
        })
    }

    /// A snapshot of the known remote devices, ordered by USN.
    pub fn remote_devices(&self) -> Vec<Device> {
        let state = self.state.lock();
        let mut devices: Vec<Device> = state.remote_devices.values().cloned().collect();
        devices.sort_by(|a, b| a.usn.cmp(&b.usn));
        devices
    }

    ///
    /// Record one sighting. Unique sightings kick off a background fetch of the device's
    /// description followed by publication to every connected listener; duplicates are dropped
    /// here.
    ///
    pub fn on_new_device(self: Arc<Self>, device: Device) {
        if device.usn.is_empty() {
            return;
        }
        if !self.add_remote_device(&device) {
            info!("on_new_device - duplicate advertisement for {}", device.usn);
            return;
        }
        info!("on_new_device - found new device {}", device.usn);
        let base_usn = device.base_usn().to_string();
        let coordinator = Arc::clone(&self);
        thread::spawn(move || coordinator.publish_device(&base_usn));
    }

    ///
    /// Deduplicate by base USN. A sighting with a `::<target>` suffix is recorded as a subdevice
    /// of its parent, synthesising the parent record first when the child arrived before it.
    /// Returns whether the base USN was new.
    ///
    fn add_remote_device(&self, device: &Device) -> bool {
        let mut state = self.state.lock();
        let base_usn = device.base_usn().to_string();
        let mut unique = false;
        if !state.remote_devices.contains_key(&base_usn) {
            state.remote_devices.insert(
                base_usn.clone(),
                Device::new(base_usn.clone(), device.location.clone()),
            );
            unique = true;
        }
        if device.usn != base_usn {
            if let Some(parent) = state.remote_devices.get_mut(&base_usn) {
                parent.add_subdevice(device.clone());
            }
        }
        unique
    }

    ///
    /// The coalescing cache lookup: fetch the description (and chained icon) for a location at
    /// most once, blocking concurrent callers until the first fetch resolves. Returns the cached
    /// metadata and icon; a failed location yields `(None, None)` forever after.
    ///
    pub fn describe(&self, location: &str) -> (Option<DeviceMetadata>, Option<Vec<u8>>) {
        let mut state = self.state.lock();
        loop {
            match state.desc_cache.get(location).cloned() {
                None => {
                    state
                        .desc_cache
                        .insert(location.to_string(), DescEntry::InFlight);
                    break;
                }
                Some(DescEntry::InFlight) => {
                    self.desc_ready.wait(&mut state);
                }
                Some(DescEntry::Ready(metadata)) => {
                    return (Some(metadata), state.icon_cache.get(location).cloned());
                }
                Some(DescEntry::Failed) => return (None, None),
            }
        }
        drop(state);

        // we own the in-flight slot; fetch with no lock held
        let metadata = fetch_metadata(location);
        let icon = metadata
            .as_ref()
            .and_then(DeviceMetadata::icon_url)
            .and_then(fetch_icon);

        let mut state = self.state.lock();
        state.desc_cache.insert(
            location.to_string(),
            match &metadata {
                Some(metadata) => DescEntry::Ready(metadata.clone()),
                None => DescEntry::Failed,
            },
        );
        if let Some(icon) = &icon {
            state.icon_cache.insert(location.to_string(), icon.clone());
        }
        drop(state);
        self.desc_ready.notify_all();

        (metadata, icon)
    }

    /// Warm the description cache for a device and stream its record to every listener.
    fn publish_device(&self, base_usn: &str) {
        let location = {
            let state = self.state.lock();
            match state.remote_devices.get(base_usn) {
                Some(device) => device.location.clone(),
                None => return,
            }
        };
        if let Some(location) = &location {
            let (metadata, icon) = self.describe(location);
            if metadata.is_some() {
                info!("publish_device - found metadata for {}", base_usn);
            }
            if icon.is_some() {
                info!("publish_device - found icon for {}", base_usn);
            }
        }

        let (device, listeners) = {
            let state = self.state.lock();
            let device = match state.remote_devices.get(base_usn) {
                Some(device) => device.clone(),
                None => return,
            };
            let listeners: Vec<(u64, UnixStream)> = state
                .listeners
                .iter()
                .filter_map(|listener| {
                    listener
                        .stream
                        .try_clone()
                        .ok()
                        .map(|stream| (listener.id, stream))
                })
                .collect();
            (device, listeners)
        };
        for (id, stream) in listeners {
            self.notify_listener(id, &stream, &device);
        }
    }

    ///
    /// One foreground search: a transient endpoint (ephemeral port, no group membership) emits a
    /// single M-SEARCH, pumps responses for the configured wait period, and closes.
    ///
    pub fn discover(self: Arc<Self>) -> Result<(), Error> {
        let options = EngineOptions {
            network_interface: self.network_interface.clone(),
            join_multicast_group: false,
            ..EngineOptions::default()
        };
        let mut engine = Engine::new(&options)?;
        engine.set_filter(self.filter.clone());
        let search_target = self
            .filter
            .clone()
            .unwrap_or_else(|| protocol::TARGET_ALL.to_string());
        let wait = self.wait;
        engine.set_device_handler(Box::new(Arc::clone(&self)));
        engine.search(&search_target, protocol::DEFAULT_MAX_WAIT)?;
        engine.run_for(wait)
    }

    ///
    /// The long-lived half of discovery: an endpoint co-bound to the SSDP port and joined to the
    /// multicast group, feeding unsolicited NOTIFY traffic into the coordinator until a fatal
    /// socket error.
    ///
    pub fn run_ssdp_daemon(self: Arc<Self>) -> Result<(), Error> {
        let options = EngineOptions {
            network_interface: self.network_interface.clone(),
            local_port: protocol::MULTICAST_PORT,
            ..EngineOptions::default()
        };
        let mut engine = Engine::new(&options)?;
        engine.set_filter(self.filter.clone());
        engine.set_device_handler(Box::new(Arc::clone(&self)));
        engine.run()
    }
}

impl DeviceHandler for Arc<ControlPoint> {
    fn on_device(&self, device: Device) {
        Arc::clone(self).on_new_device(device);
    }
}

impl Debug for ControlPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlPoint")
            .field("filter", &self.filter)
            .field("wait", &self.wait)
            .field("network_interface", &self.network_interface)
            .finish()
    }
}

// ------------------------------------------------------------------------------------------------
// Private Functions
// ------------------------------------------------------------------------------------------------

fn fetch_metadata(location: &str) -> Option<DeviceMetadata> {
    match MetadataClient::new(location) {
        Ok(client) => client.fetch_metadata(),
        Err(error) => {
            warn!("fetch_metadata - unusable location {}: {}", location, error);
            None
        }
    }
}

fn fetch_icon(url: &str) -> Option<Vec<u8>> {
    match MetadataClient::new(url) {
        Ok(client) => client.fetch_icon(),
        Err(error) => {
            warn!("fetch_icon - unusable icon url {}: {}", url, error);
            None
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Modules
// ------------------------------------------------------------------------------------------------

pub mod listen;

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::net::{SocketAddr, TcpListener};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn stub_description_server(
        friendly_name: &'static str,
        delay: Duration,
    ) -> (SocketAddr, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&connections);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(delay);
                let mut stream = stream;
                let body = format!(
                    "<?xml version=\"1.0\"?>\
                     <root xmlns=\"urn:schemas-upnp-org:device-1-0\">\
                     <device><friendlyName>{}</friendlyName><UDN>uuid:abc</UDN></device>\
                     </root>",
                    friendly_name
                );
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/xml; charset=utf8\r\nContent-Length: {}\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });
        (address, connections)
    }

    #[test]
    fn test_sightings_are_deduplicated_by_base_usn() {
        let coordinator = ControlPoint::new(None, DEFAULT_WAIT, None);
        let parent = Device::new(
            "uuid:abc",
            Some("http://192.0.2.1:1999/root_desc.xml".to_string()),
        );
        assert!(coordinator.add_remote_device(&parent));
        assert!(!coordinator.add_remote_device(&parent));

        let child = Device::new(
            "uuid:abc::urn:schemas-upnp-org:device:MediaServer:1",
            parent.location.clone(),
        );
        assert!(!coordinator.add_remote_device(&child));
        assert!(!coordinator.add_remote_device(&child));

        let state = coordinator.state.lock();
        let recorded = state.remote_devices.get("uuid:abc").unwrap();
        assert_eq!(recorded.subdevices.len(), 1);
        assert_eq!(recorded.subdevices[0].usn, child.usn);
    }

    #[test]
    fn test_child_first_sighting_synthesises_parent_and_keeps_child() {
        let coordinator = ControlPoint::new(None, DEFAULT_WAIT, None);
        let child = Device::new(
            "uuid:xyz::upnp:rootdevice",
            Some("http://192.0.2.2:1999/root_desc.xml".to_string()),
        );
        assert!(coordinator.add_remote_device(&child));

        let state = coordinator.state.lock();
        let parent = state.remote_devices.get("uuid:xyz").unwrap();
        assert_eq!(parent.usn, "uuid:xyz");
        assert_eq!(parent.location, child.location);
        assert_eq!(parent.subdevices.len(), 1);
        assert_eq!(parent.subdevices[0].usn, "uuid:xyz::upnp:rootdevice");
    }

    #[test]
    fn test_describe_coalesces_concurrent_fetches() {
        let (address, connections) =
            stub_description_server("Coalesced", Duration::from_millis(150));
        let location = format!("http://127.0.0.1:{}/root_desc.xml", address.port());
        let coordinator = ControlPoint::new(None, DEFAULT_WAIT, None);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let coordinator = Arc::clone(&coordinator);
            let location = location.clone();
            handles.push(thread::spawn(move || coordinator.describe(&location)));
        }
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(connections.load(Ordering::SeqCst), 1);
        for (metadata, icon) in results {
            let metadata = metadata.unwrap();
            assert_eq!(metadata.property("friendlyName"), Some("Coalesced"));
            assert!(icon.is_none());
        }
    }

    #[test]
    fn test_duplicate_sightings_fetch_once() {
        let (address, connections) = stub_description_server("Dup", Duration::from_millis(10));
        let location = format!("http://127.0.0.1:{}/root_desc.xml", address.port());
        let coordinator = ControlPoint::new(None, DEFAULT_WAIT, None);

        for _ in 0..2 {
            let device = Device::new("uuid:abc::upnp:rootdevice", Some(location.clone()));
            Arc::clone(&coordinator).on_new_device(device);
        }

        let deadline = Instant::now() + Duration::from_secs(2);
        while connections.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        thread::sleep(Duration::from_millis(150));
        assert_eq!(connections.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unreachable_location_is_cached_as_failed() {
        let coordinator = ControlPoint::new(None, DEFAULT_WAIT, None);
        let location = "http://127.0.0.1:1/root_desc.xml";
        assert_eq!(coordinator.describe(location), (None, None));
        {
            let state = coordinator.state.lock();
            assert!(matches!(
                state.desc_cache.get(location),
                Some(DescEntry::Failed)
            ));
        }
        assert_eq!(coordinator.describe(location), (None, None));
    }

    #[test]
    fn test_malformed_location_is_cached_as_failed() {
        let coordinator = ControlPoint::new(None, DEFAULT_WAIT, None);
        assert_eq!(coordinator.describe("not a url"), (None, None));
        let state = coordinator.state.lock();
        assert!(matches!(
            state.desc_cache.get("not a url"),
            Some(DescEntry::Failed)
        ));
    }
}
