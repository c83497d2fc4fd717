/*!
Constants for the description exchange: the two served paths, the handful of HTTP literals the
hand-rolled client and server agree on, and the device XML namespace.
*/

pub const ROOT_DESC_PATH: &str = "/root_desc.xml";

pub const ICON_PATH: &str = "/icon.png";

// ------------------------------------------------------------------------------------------------

pub const STATUS_LINE_OK: &str = "HTTP/1.1 200 OK";

/**
Sent for any request line other than the two recognised forms.
*/
pub const STATUS_LINE_BAD_REQUEST: &str = "HTTP/1.1 400 Not Found";

pub const HEAD_CONTENT_TYPE: &str = "Content-Type";

pub const HEAD_CONTENT_LENGTH: &str = "Content-Length";

pub const CONTENT_TYPE_XML: &str = "application/xml; charset=utf8";

pub const CONTENT_TYPE_PNG: &str = "image/png";

pub const CONTENT_TYPE_HTML: &str = "text/html; charset=utf8";

pub const LINE_SEP: &str = "\r\n";

pub const NOT_FOUND_BODY: &[u8] = b"<html><body>Not found.</body></html>";

// ------------------------------------------------------------------------------------------------

/**
The namespace of the device description document.
*/
pub const XML_NS_DEVICE: &str = "urn:schemas-upnp-org:device-1-0";

/**
Description bodies are read up to and including this closing tag rather than trusting a
`Content-Length` header.
*/
pub const ROOT_CLOSE_TAG: &[u8] = b"</root>";
