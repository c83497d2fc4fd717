/*!
Protocol constants for the SSDP discovery exchange.
*/

/**
Multicast channel and port reserved for SSDP by _Internet Assigned Numbers Authority_ (IANA). Must
be `239.255.255.250:1900`. If the port number (":1900") is omitted, the receiver should assume the
default SSDP port number of `1900`.
*/
pub const MULTICAST_ADDRESS: &str = "239.255.255.250:1900";

/**
The port component of `MULTICAST_ADDRESS`, for endpoints that co-bind to it.
*/
pub const MULTICAST_PORT: u16 = 1900;

// ------------------------------------------------------------------------------------------------

/**
Required by HTTP Extension Framework. Unlike the NTS and ST headers, the value of the MAN header is
enclosed in double quotes; it defines the scope (namespace) of the extension. Must be
"ssdp:discover".
*/
pub const HTTP_EXTENSION: &str = "\"ssdp:discover\"";

pub const HTTP_VERSION: &str = "HTTP/1.1";

pub const ANY_RESOURCE: &str = "*";

pub const LINE_SEP: &str = "\r\n";

// ------------------------------------------------------------------------------------------------

/**
From § 1.1 Discovery: Advertisement
*/
pub const METHOD_NOTIFY: &str = "NOTIFY";

/**
From § 1.2 Discovery: Search
*/
pub const METHOD_SEARCH: &str = "M-SEARCH";

/**
The three start lines the engine recognises; anything else is dropped. Comparison is byte-exact
after stripping trailing whitespace.
*/
pub const START_LINE_NOTIFY: &str = "NOTIFY * HTTP/1.1";

pub const START_LINE_SEARCH: &str = "M-SEARCH * HTTP/1.1";

pub const START_LINE_OK: &str = "HTTP/1.1 200 OK";

// ------------------------------------------------------------------------------------------------

/**
Field value MUST have the max-age directive ("max-age=") followed by an integer that specifies the
number of seconds the advertisement is valid. After this duration, control points SHOULD assume
the device (or service) is no longer available.
*/
pub const HEAD_CACHE_CONTROL: &str = "CACHE-CONTROL";

/**
Field value contains the multicast address and port reserved for SSDP.
*/
pub const HEAD_HOST: &str = "HOST";

/**
Field value contains a URL to the UPnP description of the root device. Normally the host portion
contains a literal IP address rather than a domain name in unmanaged networks. Single absolute URL.
*/
pub const HEAD_LOCATION: &str = "LOCATION";

/**
Required by HTTP Extension Framework; must be the quoted string "ssdp:discover".
*/
pub const HEAD_MAN: &str = "MAN";

/**
Maximum wait time in seconds, between 1 and 120 inclusive. Device responses should be delayed a
random duration between 0 and this many seconds to balance load for the control point when it
processes responses.
*/
pub const HEAD_MX: &str = "MX";

/**
Field value contains the Notification Type. Single URI.
*/
pub const HEAD_NT: &str = "NT";

/**
Field value contains the Notification Sub Type. Single URI.
*/
pub const HEAD_NTS: &str = "NTS";

/**
OS and product tokens identifying the sender, in the form
`OS/version UPnP/1.0 product/version`.
*/
pub const HEAD_SERVER: &str = "SERVER";

/**
Field value contains the Search Target. Same grammar as `HEAD_NT`.
*/
pub const HEAD_ST: &str = "ST";

/**
Field value contains the Unique Service Name, identifying a unique instance of a device or
service. The prefix (before the double colon) matches the value of the UDN element in the device
description. Single URI.
*/
pub const HEAD_USN: &str = "USN";

// ------------------------------------------------------------------------------------------------

pub const NTS_ALIVE: &str = "ssdp:alive";

/**
The wildcard search target matched by every device.
*/
pub const TARGET_ALL: &str = "ssdp:all";

pub const TARGET_ROOT_DEVICE: &str = "upnp:rootdevice";

/**
Vendor extension headers carry this prefix; the remainder of the name is preserved on the device
record with the prefix stripped.
*/
pub const EXTENSION_HEADER_PREFIX: &str = "x-";

// ------------------------------------------------------------------------------------------------

/**
Advertisement validity emitted on NOTIFY and search-response messages, in seconds.
*/
pub const MAX_AGE: u64 = 3600;

/**
Default `MX` value for emitted searches.
*/
pub const DEFAULT_MAX_WAIT: u8 = 2;

pub const BUFFER_SIZE: usize = 2048;
