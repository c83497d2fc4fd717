/*!
The SSDP message engine. An [`Engine`](struct.Engine.html) owns one UDP socket, normally joined to
the multicast group, classifies every inbound datagram into one of the three recognised message
families, and produces the outbound NOTIFY/M-SEARCH/search-response traffic with correct
addressing.

The group is joined with `IP_MULTICAST_LOOP` enabled so a single host can act as device and
control point at the same time, and the socket is opened with `SO_REUSEADDR` (and `SO_REUSEPORT`
on unix) so several consumers on one host may co-bind to port 1900.
*/

use crate::ssdp::message::{self, Message, MessageKind};
use crate::ssdp::protocol;
use crate::ssdp::Device;
use crate::utils::{interface, user_agent};
use crate::Error;
use socket2::{Domain, Protocol as TransportProtocol, Socket, Type};
use std::fmt::{self, Debug, Formatter};
use std::io::ErrorKind as IOErrorKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::{Duration, Instant};

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

///
/// The seam between the engine and whoever consumes device sightings. Called for every
/// advertisement or search response that passes the engine's filter.
///
pub trait DeviceHandler: Send + Sync {
    fn on_device(&self, device: Device);
}

///
/// Socket construction options. `Options::default()` suits a transient search endpoint; daemons
/// co-binding to the SSDP port set `local_port` and leave `join_multicast_group` on.
///
#[derive(Clone, Debug)]
pub struct Options {
    /// A specific network interface to use for group membership; if unset the membership applies
    /// to the default interface.
    pub network_interface: Option<String>,
    /// The local UDP port to bind, `0` for an ephemeral port.
    pub local_port: u16,
    /// Whether to join the SSDP multicast group. Transient search endpoints receive their
    /// responses unicast and can skip membership.
    pub join_multicast_group: bool,
    /// The IP packet TTL for multicast sends.
    pub packet_ttl: u32,
    /// Whether our own multicast traffic is looped back to this host.
    pub loop_back_also: bool,
}

///
/// One SSDP endpoint: the socket, the set of locally announced devices, and the dispatch state.
///
pub struct Engine {
    socket: UdpSocket,
    local_devices: Vec<Device>,
    filter: Option<String>,
    ignore_search_target: bool,
    handler: Option<Box<dyn DeviceHandler>>,
    server_ident: String,
}

lazy_static! {
    static ref MULTICAST_SOCKET_ADDRESS: SocketAddrV4 =
        protocol::MULTICAST_ADDRESS.parse().unwrap();
}

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

pub fn create_multicast_socket(options: &Options) -> Result<UdpSocket, Error> {
    debug!("create_multicast_socket - options: {:?}", options);
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(TransportProtocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;

    let local_address = SocketAddr::V4(SocketAddrV4::new(
        Ipv4Addr::UNSPECIFIED,
        options.local_port,
    ));
    trace!(
        "create_multicast_socket - binding to local_address: {:?}",
        local_address
    );
    socket.bind(&local_address.into())?;
    let socket: UdpSocket = socket.into();

    if options.join_multicast_group {
        let membership_address = match interface::ip_address_for_interface(&options.network_interface)
        {
            Some(IpAddr::V4(address)) => address,
            _ => Ipv4Addr::UNSPECIFIED,
        };
        socket.join_multicast_v4(MULTICAST_SOCKET_ADDRESS.ip(), &membership_address)?;
    }
    socket.set_multicast_ttl_v4(options.packet_ttl)?;
    socket.set_multicast_loop_v4(options.loop_back_also)?;

    trace!(
        "create_multicast_socket - socket: {:?}, multicast_ttl: {}",
        socket,
        socket.multicast_ttl_v4()?
    );

    Ok(socket)
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl Default for Options {
    fn default() -> Self {
        Options {
            network_interface: None,
            local_port: 0,
            join_multicast_group: true,
            packet_ttl: 2,
            loop_back_also: true,
        }
    }
}

// ------------------------------------------------------------------------------------------------

impl Engine {
    pub fn new(options: &Options) -> Result<Self, Error> {
        Ok(Engine {
            socket: create_multicast_socket(options)?,
            local_devices: Vec::new(),
            filter: None,
            ignore_search_target: false,
            handler: None,
            server_ident: user_agent::ident(),
        })
    }

    pub fn set_device_handler(&mut self, handler: Box<dyn DeviceHandler>) {
        self.handler = Some(handler);
    }

    /// Restrict sightings and search replies to devices whose target matches `filter`.
    pub fn set_filter(&mut self, filter: Option<String>) {
        self.filter = filter;
    }

    /// Reply to every search regardless of its `ST` header.
    pub fn set_ignore_search_target(&mut self, ignore: bool) {
        self.ignore_search_target = ignore;
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.socket.local_addr()?)
    }

    ///
    /// Add a device to the locally announced set and immediately advertise it on the multicast
    /// group. There is no re-announcement timer; callers wanting periodic NOTIFY traffic call
    /// this again.
    ///
    pub fn announce(&mut self, device: Device) -> Result<(), Error> {
        info!("announce - {}", device.usn);
        let data = message::notify(&device, &self.server_ident);
        self.local_devices.push(device);
        self.send_multicast(&data)
    }

    /// Emit one `M-SEARCH` to the multicast group.
    pub fn search(&self, search_target: &str, max_wait: u8) -> Result<(), Error> {
        info!("search - st: {}", search_target);
        self.send_multicast(&message::search(search_target, max_wait))
    }

    ///
    /// Receive and dispatch datagrams until a fatal socket error occurs. Transient read errors
    /// are logged and ignored.
    ///
    pub fn run(&mut self) -> Result<(), Error> {
        self.socket.set_read_timeout(None)?;
        loop {
            self.poll_once()?;
        }
    }

    /// Receive and dispatch datagrams for the given window, then return.
    pub fn run_for(&mut self, wait: Duration) -> Result<(), Error> {
        let deadline = Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(());
            }
            self.socket.set_read_timeout(Some(remaining))?;
            self.poll_once()?;
        }
    }

    ///
    /// Classify one inbound datagram and dispatch it: advertisements and search responses flow to
    /// the device handler, searches are answered, anything else is dropped.
    ///
    pub fn on_datagram(&mut self, data: &[u8], from: SocketAddr) -> Result<(), Error> {
        let text = String::from_utf8_lossy(data);
        trace!("on_datagram - {} > {:?}", from, text);
        let message = match Message::parse(&text) {
            Some(message) => message,
            None => {
                debug!("on_datagram - dropping unrecognized datagram from {}", from);
                return Ok(());
            }
        };
        match message.kind() {
            MessageKind::Notify | MessageKind::SearchResponse => {
                self.handle_device_message(&message);
                Ok(())
            }
            MessageKind::Search => self.handle_search(&message, from),
        }
    }

    fn poll_once(&mut self) -> Result<(), Error> {
        let mut buffer = [0u8; protocol::BUFFER_SIZE];
        match self.socket.recv_from(&mut buffer) {
            Ok((received, from)) => self.on_datagram(&buffer[..received], from),
            Err(error)
                if error.kind() == IOErrorKind::WouldBlock
                    || error.kind() == IOErrorKind::TimedOut =>
            {
                trace!("poll_once - socket timed out, no data");
                Ok(())
            }
            Err(error) => {
                error!("poll_once - socket read returned error: {:?}", error);
                Err(Error::NetworkTransport(error))
            }
        }
    }

    fn handle_device_message(&self, message: &Message) {
        let usn = match message.header(protocol::HEAD_USN) {
            Some(usn) if !usn.is_empty() => usn.to_string(),
            _ => {
                debug!("handle_device_message - advertisement without USN dropped");
                return;
            }
        };
        let mut device = Device::new(
            usn,
            message.header(protocol::HEAD_LOCATION).map(String::from),
        );
        device.extra = message.extension_headers();
        if self
            .filter
            .as_ref()
            .map_or(true, |filter| device.matches(filter))
        {
            if let Some(handler) = &self.handler {
                handler.on_device(device);
            }
        } else {
            trace!(
                "handle_device_message - {} does not match the filter",
                device.usn
            );
        }
    }

    fn handle_search(&self, message: &Message, from: SocketAddr) -> Result<(), Error> {
        let search_target = message.header(protocol::HEAD_ST);
        for device in &self.local_devices {
            let wanted = self.ignore_search_target
                || search_target.map_or(true, |target| device.matches(target));
            let passes_filter = self
                .filter
                .as_ref()
                .map_or(true, |filter| device.matches(filter));
            if wanted && passes_filter {
                let response = message::search_response(
                    device,
                    search_target.unwrap_or(protocol::TARGET_ALL),
                    &self.server_ident,
                );
                self.send_to(&response, from)?;
            }
        }
        Ok(())
    }

    fn send_multicast(&self, data: &str) -> Result<(), Error> {
        self.send_to(data, SocketAddr::V4(*MULTICAST_SOCKET_ADDRESS))
    }

    fn send_to(&self, data: &str, address: SocketAddr) -> Result<(), Error> {
        trace!("send_to - {} < {:?}", address, data);
        self.socket.send_to(data.as_bytes(), address)?;
        Ok(())
    }
}

impl Debug for Engine {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("socket", &self.socket)
            .field("local_devices", &self.local_devices)
            .field("filter", &self.filter)
            .field("ignore_search_target", &self.ignore_search_target)
            .finish()
    }
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[derive(Debug, Default)]
    struct Recorder {
        devices: Mutex<Vec<Device>>,
    }

    impl DeviceHandler for Arc<Recorder> {
        fn on_device(&self, device: Device) {
            self.devices.lock().push(device);
        }
    }

    fn transient_engine() -> Engine {
        let options = Options {
            join_multicast_group: false,
            ..Default::default()
        };
        Engine::new(&options).unwrap()
    }

    fn observer_socket() -> (UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_millis(250)))
            .unwrap();
        let address = socket.local_addr().unwrap();
        (socket, address)
    }

    #[test]
    fn test_search_responses_honor_filter() {
        let mut engine = transient_engine();
        engine.set_filter(Some(protocol::TARGET_ROOT_DEVICE.to_string()));
        let location = "http://192.0.2.1:1999/root_desc.xml".to_string();
        for usn in &[
            "uuid:x::upnp:rootdevice",
            "uuid:x",
            "uuid:x::urn:schemas-upnp-org:device:Basic:1",
        ] {
            engine
                .local_devices
                .push(Device::new(*usn, Some(location.clone())));
        }

        let (observer, address) = observer_socket();
        let query = "M-SEARCH * HTTP/1.1\r\n\
                     HOST: 239.255.255.250:1900\r\n\
                     MAN: \"ssdp:discover\"\r\n\
                     ST: ssdp:all\r\n\
                     MX: 2\r\n\
                     \r\n";
        engine.on_datagram(query.as_bytes(), address).unwrap();

        let mut buffer = [0u8; protocol::BUFFER_SIZE];
        let (received, _) = observer.recv_from(&mut buffer).unwrap();
        let response = Message::parse(&String::from_utf8_lossy(&buffer[..received])).unwrap();
        assert_eq!(response.kind(), MessageKind::SearchResponse);
        assert_eq!(
            response.header(protocol::HEAD_USN),
            Some("uuid:x::upnp:rootdevice")
        );
        assert_eq!(response.header(protocol::HEAD_ST), Some("ssdp:all"));

        // the other two USNs fail the filter, so exactly one reply goes out
        assert!(observer.recv_from(&mut buffer).is_err());
    }

    #[test]
    fn test_search_matches_query_target() {
        let mut engine = transient_engine();
        engine
            .local_devices
            .push(Device::new("uuid:x::upnp:rootdevice", None));
        engine.local_devices.push(Device::new("uuid:x", None));

        let (observer, address) = observer_socket();
        let query = "M-SEARCH * HTTP/1.1\r\n\
                     HOST: 239.255.255.250:1900\r\n\
                     MAN: \"ssdp:discover\"\r\n\
                     ST: upnp:rootdevice\r\n\
                     MX: 2\r\n\
                     \r\n";
        engine.on_datagram(query.as_bytes(), address).unwrap();

        let mut buffer = [0u8; protocol::BUFFER_SIZE];
        let (received, _) = observer.recv_from(&mut buffer).unwrap();
        let response = Message::parse(&String::from_utf8_lossy(&buffer[..received])).unwrap();
        assert_eq!(response.header(protocol::HEAD_ST), Some("upnp:rootdevice"));
        assert!(observer.recv_from(&mut buffer).is_err());
    }

    #[test]
    fn test_malformed_datagram_is_ignored() {
        let mut engine = transient_engine();
        let recorder = Arc::new(Recorder::default());
        engine.set_device_handler(Box::new(Arc::clone(&recorder)));
        engine.local_devices.push(Device::new("uuid:x", None));

        let (observer, address) = observer_socket();
        engine
            .on_datagram(b"FOO * HTTP/1.1\r\n\r\n", address)
            .unwrap();

        assert!(recorder.devices.lock().is_empty());
        let mut buffer = [0u8; protocol::BUFFER_SIZE];
        assert!(observer.recv_from(&mut buffer).is_err());
    }

    #[test]
    fn test_notify_reaches_handler() {
        let mut engine = transient_engine();
        let recorder = Arc::new(Recorder::default());
        engine.set_device_handler(Box::new(Arc::clone(&recorder)));

        let (_, address) = observer_socket();
        let datagram = "NOTIFY * HTTP/1.1\r\n\
                        HOST: 239.255.255.250:1900\r\n\
                        LOCATION: http://192.0.2.1:1999/root_desc.xml\r\n\
                        USN: uuid:abc::upnp:rootdevice\r\n\
                        X-Extra: value\r\n\
                        \r\n";
        engine.on_datagram(datagram.as_bytes(), address).unwrap();

        let devices = recorder.devices.lock();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].usn, "uuid:abc::upnp:rootdevice");
        assert_eq!(
            devices[0].location.as_deref(),
            Some("http://192.0.2.1:1999/root_desc.xml")
        );
        assert_eq!(
            devices[0].extra.get("extra").map(String::as_str),
            Some("value")
        );
    }

    #[test]
    fn test_filter_suppresses_mismatched_notify() {
        let mut engine = transient_engine();
        engine.set_filter(Some("urn:schemas-upnp-org:device:Media:1".to_string()));
        let recorder = Arc::new(Recorder::default());
        engine.set_device_handler(Box::new(Arc::clone(&recorder)));

        let (_, address) = observer_socket();
        let datagram = "NOTIFY * HTTP/1.1\r\n\
                        USN: uuid:abc::upnp:rootdevice\r\n\
                        \r\n";
        engine.on_datagram(datagram.as_bytes(), address).unwrap();
        assert!(recorder.devices.lock().is_empty());

        let matching = "NOTIFY * HTTP/1.1\r\n\
                        USN: uuid:abc::urn:schemas-upnp-org:device:Media:1\r\n\
                        \r\n";
        engine.on_datagram(matching.as_bytes(), address).unwrap();
        assert_eq!(recorder.devices.lock().len(), 1);
    }
}
