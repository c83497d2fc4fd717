/*!
Parsing and formatting for the three SSDP message shapes carried in UDP datagrams: `NOTIFY`
advertisements, `M-SEARCH` queries, and search responses.

A message is a CRLF-delimited text block: one start line, then `Name: Value` header lines up to an
empty line. Start lines are matched byte-exact; header names are lowercased on the way in and
malformed header lines are skipped. Anything with an unrecognised start line is dropped by
returning `None` from [`Message::parse`](struct.Message.html#method.parse).
*/

use crate::ssdp::protocol;
use crate::ssdp::Device;
use std::collections::HashMap;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

///
/// The three message families the engine dispatches on.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    /// `NOTIFY * HTTP/1.1` — unsolicited advertisement from a remote device.
    Notify,
    /// `M-SEARCH * HTTP/1.1` — search query.
    Search,
    /// `HTTP/1.1 200 OK` — response to one of our own searches.
    SearchResponse,
}

///
/// A decoded inbound datagram: its kind, and its headers keyed by lowercased name.
///
#[derive(Clone, Debug)]
pub struct Message {
    kind: MessageKind,
    headers: HashMap<String, String>,
}

///
/// Assembles an outbound message, preserving header order.
///
#[derive(Debug)]
pub struct MessageBuilder {
    start_line: String,
    headers: Vec<(String, String)>,
}

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

///
/// Format a `NOTIFY` advertisement for the given device.
///
pub fn notify(device: &Device, server_ident: &str) -> String {
    let mut builder = MessageBuilder::request(protocol::METHOD_NOTIFY);
    builder
        .add_header(protocol::HEAD_HOST, protocol::MULTICAST_ADDRESS)
        .add_header(protocol::HEAD_CACHE_CONTROL, &max_age_directive())
        .add_header(
            protocol::HEAD_LOCATION,
            device.location.as_deref().unwrap_or_default(),
        )
        .add_header(protocol::HEAD_NT, device.target())
        .add_header(protocol::HEAD_NTS, protocol::NTS_ALIVE)
        .add_header(protocol::HEAD_SERVER, server_ident)
        .add_header(protocol::HEAD_USN, &device.usn);
    builder.build()
}

///
/// Format an `M-SEARCH` query for the given search target.
///
pub fn search(search_target: &str, max_wait: u8) -> String {
    let mut builder = MessageBuilder::request(protocol::METHOD_SEARCH);
    builder
        .add_header(protocol::HEAD_HOST, protocol::MULTICAST_ADDRESS)
        .add_header(protocol::HEAD_MAN, protocol::HTTP_EXTENSION)
        .add_header(protocol::HEAD_ST, search_target)
        .add_header(protocol::HEAD_MX, &max_wait.to_string());
    builder.build()
}

///
/// Format the unicast response a device sends back for a matching search.
///
pub fn search_response(device: &Device, search_target: &str, server_ident: &str) -> String {
    let mut builder = MessageBuilder::response_ok();
    builder
        .add_header(protocol::HEAD_CACHE_CONTROL, &max_age_directive())
        .add_header(
            protocol::HEAD_LOCATION,
            device.location.as_deref().unwrap_or_default(),
        )
        .add_header(protocol::HEAD_SERVER, server_ident)
        .add_header(protocol::HEAD_ST, search_target)
        .add_header(protocol::HEAD_USN, &device.usn);
    builder.build()
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl Message {
    ///
    /// Decode one datagram. Returns `None` for anything but the three recognised start lines;
    /// header lines without a `:` are skipped.
    ///
    pub fn parse(data: &str) -> Option<Message> {
        let mut lines = data.lines();
        let kind = match lines.next()?.trim_end() {
            protocol::START_LINE_NOTIFY => MessageKind::Notify,
            protocol::START_LINE_SEARCH => MessageKind::Search,
            protocol::START_LINE_OK => MessageKind::SearchResponse,
            _ => return None,
        };
        let mut headers = HashMap::new();
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }
        Some(Message { kind, headers })
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Look up a header by name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The vendor extension headers, with the `x-` prefix stripped.
    pub fn extension_headers(&self) -> HashMap<String, String> {
        self.headers
            .iter()
            .filter_map(|(name, value)| {
                name.strip_prefix(protocol::EXTENSION_HEADER_PREFIX)
                    .map(|stripped| (stripped.to_string(), value.clone()))
            })
            .collect()
    }
}

// ------------------------------------------------------------------------------------------------

impl MessageBuilder {
    pub fn request(method: &str) -> Self {
        MessageBuilder {
            start_line: format!(
                "{} {} {}",
                method,
                protocol::ANY_RESOURCE,
                protocol::HTTP_VERSION
            ),
            headers: Vec::new(),
        }
    }

    pub fn response_ok() -> Self {
        MessageBuilder {
            start_line: protocol::START_LINE_OK.to_string(),
            headers: Vec::new(),
        }
    }

    pub fn add_header(&mut self, name: &str, value: &str) -> &mut Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn build(&self) -> String {
        let mut message = String::new();
        message.push_str(&self.start_line);
        message.push_str(protocol::LINE_SEP);
        for (name, value) in &self.headers {
            message.push_str(name);
            message.push_str(": ");
            message.push_str(value);
            message.push_str(protocol::LINE_SEP);
        }
        message.push_str(protocol::LINE_SEP);
        message
    }
}

// ------------------------------------------------------------------------------------------------
// Private Functions
// ------------------------------------------------------------------------------------------------

fn max_age_directive() -> String {
    format!("max-age={}", protocol::MAX_AGE)
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_notify() {
        let datagram = "NOTIFY * HTTP/1.1\r\n\
                        HOST: 239.255.255.250:1900\r\n\
                        CACHE-CONTROL: max-age=3600\r\n\
                        LOCATION: http://192.0.2.1:1999/root_desc.xml\r\n\
                        NT: upnp:rootdevice\r\n\
                        NTS: ssdp:alive\r\n\
                        SERVER: Linux/1.0 UPnP/1.0 test/0.1\r\n\
                        USN: uuid:abc::upnp:rootdevice\r\n\
                        X-Vendor: acme\r\n\
                        \r\n";
        let message = Message::parse(datagram).unwrap();
        assert_eq!(message.kind(), MessageKind::Notify);
        assert_eq!(message.header("USN"), Some("uuid:abc::upnp:rootdevice"));
        assert_eq!(
            message.header("location"),
            Some("http://192.0.2.1:1999/root_desc.xml")
        );
        let extensions = message.extension_headers();
        assert_eq!(extensions.get("vendor").map(String::as_str), Some("acme"));
    }

    #[test]
    fn test_unknown_start_line_is_dropped() {
        assert!(Message::parse("FOO * HTTP/1.1\r\n\r\n").is_none());
        assert!(Message::parse("").is_none());
    }

    #[test]
    fn test_start_line_match_is_case_sensitive() {
        assert!(Message::parse("notify * http/1.1\r\nUSN: uuid:abc\r\n\r\n").is_none());
        assert!(Message::parse("HTTP/1.1 200 ok\r\n\r\n").is_none());
    }

    #[test]
    fn test_malformed_header_lines_are_skipped() {
        let datagram = "NOTIFY * HTTP/1.1\r\n\
                        this line has no separator\r\n\
                        USN: uuid:abc\r\n\
                        \r\n";
        let message = Message::parse(datagram).unwrap();
        assert_eq!(message.header("usn"), Some("uuid:abc"));
        assert_eq!(message.headers.len(), 1);
    }

    #[test]
    fn test_search_contains_required_headers() {
        let message = search("ssdp:all", 2);
        assert!(message.starts_with("M-SEARCH * HTTP/1.1\r\n"));
        assert!(message.contains("HOST: 239.255.255.250:1900\r\n"));
        assert!(message.contains("MAN: \"ssdp:discover\"\r\n"));
        assert!(message.contains("ST: ssdp:all\r\n"));
        assert!(message.contains("MX: 2\r\n"));
        assert!(message.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_notify_round_trip() {
        let device = Device::new(
            "uuid:abc::upnp:rootdevice",
            Some("http://192.0.2.1:1999/root_desc.xml".to_string()),
        );
        let encoded = notify(&device, "Linux/1.0 UPnP/1.0 test/0.1");
        let message = Message::parse(&encoded).unwrap();
        assert_eq!(message.kind(), MessageKind::Notify);

        let round_tripped = Device::new(
            message.header(protocol::HEAD_USN).unwrap(),
            message.header(protocol::HEAD_LOCATION).map(String::from),
        );
        assert_eq!(round_tripped.usn, device.usn);
        assert_eq!(round_tripped.location, device.location);
        assert_eq!(round_tripped.target(), device.target());
    }
}
