/*!
Rendering and parsing of the root-description document.

The rendered document is the fixed shape a basic device serves: spec version, `URLBase`, and one
`device` element with an icon list and an empty service list. Parsing goes the other way for any
remote device's description and extracts the flat property map the discovery pipeline works with;
it deliberately ignores everything it does not understand rather than failing.
*/

use crate::error::{invalid_field_value, missing_required_field, MessageFormatError};
use crate::scpd::{protocol, DeviceMetadata};
use crate::ssdp::LocalDevice;
use crate::utils::xml;
use crate::Error;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;

// ------------------------------------------------------------------------------------------------
// Private Values
// ------------------------------------------------------------------------------------------------

const X_ELEM_ROOT: &[u8] = b"root";
const X_ELEM_SPEC_VERSION: &[u8] = b"specVersion";
const X_ELEM_MAJOR: &[u8] = b"major";
const X_ELEM_MINOR: &[u8] = b"minor";
const X_ELEM_URL_BASE: &[u8] = b"URLBase";
const X_ELEM_DEVICE: &[u8] = b"device";
const X_ELEM_DEVICE_TYPE: &[u8] = b"deviceType";
const X_ELEM_FRIENDLY_NAME: &[u8] = b"friendlyName";
const X_ELEM_UDN: &[u8] = b"UDN";
const X_ELEM_UPC: &[u8] = b"UPC";
const X_ELEM_ICON_LIST: &[u8] = b"iconList";
const X_ELEM_ICON: &[u8] = b"icon";
const X_ELEM_ICON_MIME_TYPE: &[u8] = b"mimetype";
const X_ELEM_ICON_WIDTH: &[u8] = b"width";
const X_ELEM_ICON_HEIGHT: &[u8] = b"height";
const X_ELEM_ICON_DEPTH: &[u8] = b"depth";
const X_ELEM_ICON_URL: &[u8] = b"url";
const X_ELEM_SERVICE_LIST: &[u8] = b"serviceList";

const SPEC_VERSION_MAJOR: &[u8] = b"1";
const SPEC_VERSION_MINOR: &[u8] = b"0";

const ICON_WIDTH: &[u8] = b"32";
const ICON_HEIGHT: &[u8] = b"32";
const ICON_DEPTH: &[u8] = b"24";

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

///
/// Render the root description served for the given local device.
///
pub fn root_description(device: &LocalDevice) -> Result<String, Error> {
    let mut writer = Writer::new(Vec::new());
    write_root_description(&mut writer, device).map_err(MessageFormatError::XmlFormat)?;
    let body = writer.into_inner();
    String::from_utf8(body).map_err(|e| MessageFormatError::SourceEncoding(e.utf8_error()).into())
}

fn write_root_description(
    writer: &mut Writer<Vec<u8>>,
    device: &LocalDevice,
) -> Result<(), quick_xml::Error> {
    xml::decl(writer)?;
    let root = xml::start_ns_element(writer, X_ELEM_ROOT, protocol::XML_NS_DEVICE, None)?;

    let spec_version = xml::start_element(writer, X_ELEM_SPEC_VERSION)?;
    xml::text_element(writer, X_ELEM_MAJOR, SPEC_VERSION_MAJOR)?;
    xml::text_element(writer, X_ELEM_MINOR, SPEC_VERSION_MINOR)?;
    spec_version.end(writer)?;

    xml::text_element(
        writer,
        X_ELEM_URL_BASE,
        format!("http://{}:{}", device.host, device.port).as_bytes(),
    )?;

    let top = xml::start_element(writer, X_ELEM_DEVICE)?;
    xml::text_element(writer, X_ELEM_DEVICE_TYPE, device.device_type.as_bytes())?;
    xml::text_element(
        writer,
        X_ELEM_FRIENDLY_NAME,
        device.friendly_name.as_bytes(),
    )?;
    xml::text_element(
        writer,
        X_ELEM_UDN,
        format!("uuid:{}", device.uuid).as_bytes(),
    )?;
    xml::empty_element(writer, X_ELEM_UPC)?;

    let icon_list = xml::start_element(writer, X_ELEM_ICON_LIST)?;
    let icon = xml::start_element(writer, X_ELEM_ICON)?;
    xml::text_element(
        writer,
        X_ELEM_ICON_MIME_TYPE,
        protocol::CONTENT_TYPE_PNG.as_bytes(),
    )?;
    xml::text_element(writer, X_ELEM_ICON_WIDTH, ICON_WIDTH)?;
    xml::text_element(writer, X_ELEM_ICON_HEIGHT, ICON_HEIGHT)?;
    xml::text_element(writer, X_ELEM_ICON_DEPTH, ICON_DEPTH)?;
    xml::text_element(
        writer,
        X_ELEM_ICON_URL,
        format!(
            "http://{}:{}{}",
            device.host,
            device.port,
            protocol::ICON_PATH
        )
        .as_bytes(),
    )?;
    icon.end(writer)?;
    icon_list.end(writer)?;

    xml::empty_element(writer, X_ELEM_SERVICE_LIST)?;
    top.end(writer)?;
    root.end(writer)?;

    Ok(())
}

///
/// Parse a root description: require a `root` document element in the device namespace with a
/// `device` child; that element's text-bearing leaves become the property map, and the first
/// `icon` under `iconList` becomes the icon map. Empty leaves produce no entry.
///
pub fn read_root_description(description: &str) -> Result<DeviceMetadata, Error> {
    let mut reader = Reader::from_str(description);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut path: Vec<String> = Vec::new();
    let mut properties = BTreeMap::new();
    let mut icon = BTreeMap::new();
    let mut pending_text: Option<String> = None;
    let mut in_icon = false;
    let mut icon_seen = false;
    let mut seen_device = false;

    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref event)) => {
                let name = local_name(event.name());
                if path.is_empty() {
                    if name != "root" || !has_device_namespace(event) {
                        return Err(invalid_field_value("root", name).into());
                    }
                } else if name == "device" && path_is(&path, &["root"]) {
                    seen_device = true;
                } else if name == "icon"
                    && path_is(&path, &["root", "device", "iconList"])
                    && !icon_seen
                {
                    in_icon = true;
                }
                path.push(name);
                pending_text = None;
            }
            Ok(Event::Text(event)) => {
                pending_text = Some(
                    event
                        .unescape_and_decode(&reader)
                        .map_err(MessageFormatError::XmlFormat)?,
                );
            }
            Ok(Event::End(_)) => {
                let name = match path.pop() {
                    Some(name) => name,
                    None => return Err(invalid_field_value("root", description).into()),
                };
                if let Some(text) = pending_text.take() {
                    if in_icon && path_is(&path, &["root", "device", "iconList", "icon"]) {
                        icon.insert(name.clone(), text);
                    } else if path_is(&path, &["root", "device"]) {
                        properties.insert(name.clone(), text);
                    }
                }
                if in_icon && name == "icon" {
                    in_icon = false;
                    icon_seen = true;
                }
                if path.is_empty() {
                    break;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(error) => {
                debug!(
                    "read_root_description - error at position {}: {:?}",
                    reader.buffer_position(),
                    error
                );
                return Err(MessageFormatError::XmlFormat(error).into());
            }
        }
        buf.clear();
    }

    if !path.is_empty() {
        return Err(invalid_field_value("root", "truncated document").into());
    }
    if !seen_device {
        return Err(missing_required_field("device").into());
    }

    Ok(DeviceMetadata {
        properties,
        icon: if icon.is_empty() { None } else { Some(icon) },
    })
}

// ------------------------------------------------------------------------------------------------
// Private Functions
// ------------------------------------------------------------------------------------------------

fn local_name(name: &[u8]) -> String {
    let name = String::from_utf8_lossy(name);
    match name.rfind(':') {
        Some(index) => name[index + 1..].to_string(),
        None => name.to_string(),
    }
}

fn path_is(path: &[String], expected: &[&str]) -> bool {
    path.len() == expected.len() && path.iter().zip(expected.iter()).all(|(a, b)| a == b)
}

fn has_device_namespace(event: &BytesStart<'_>) -> bool {
    event
        .attributes()
        .filter_map(|attribute| attribute.ok())
        .any(|attribute| {
            (attribute.key == &b"xmlns"[..] || attribute.key.starts_with(b"xmlns:"))
                && attribute.value.as_ref() == protocol::XML_NS_DEVICE.as_bytes()
        })
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::net::{IpAddr, Ipv4Addr};

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
    <specVersion>
        <major>1</major>
        <minor>0</minor>
    </specVersion>
    <URLBase>http://192.0.2.1:1999</URLBase>
    <device>
        <deviceType>urn:schemas-upnp-org:device:Basic:1</deviceType>
        <friendlyName>X</friendlyName>
        <UDN>uuid:abc</UDN>
        <UPC/>
        <iconList>
            <icon>
                <mimetype>image/png</mimetype>
                <width>32</width>
                <height>32</height>
                <depth>24</depth>
                <url>http://192.0.2.1:1999/icon.png</url>
            </icon>
        </iconList>
        <serviceList>
        </serviceList>
    </device>
</root>
"#;

    fn local_device() -> LocalDevice {
        LocalDevice::new(
            IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)),
            1999,
            "urn:schemas-upnp-org:device:Basic:1",
            "Test Device",
        )
    }

    #[test]
    fn test_read_sample_description() {
        let metadata = read_root_description(SAMPLE).unwrap();
        assert_eq!(metadata.property("friendlyName"), Some("X"));
        assert_eq!(
            metadata.property("deviceType"),
            Some("urn:schemas-upnp-org:device:Basic:1")
        );
        assert_eq!(metadata.property("UDN"), Some("uuid:abc"));
        // the empty UPC leaf produces no entry
        assert_eq!(metadata.property("UPC"), None);
        assert_eq!(metadata.icon_url(), Some("http://192.0.2.1:1999/icon.png"));
        let icon = metadata.icon.unwrap();
        assert_eq!(icon.get("mimetype").map(String::as_str), Some("image/png"));
        assert_eq!(icon.get("width").map(String::as_str), Some("32"));
    }

    #[test]
    fn test_only_first_icon_is_kept() {
        let description = SAMPLE.replace(
            "</iconList>",
            "<icon><mimetype>image/jpeg</mimetype><url>http://192.0.2.1:1999/other.jpg</url></icon></iconList>",
        );
        let metadata = read_root_description(&description).unwrap();
        assert_eq!(metadata.icon_url(), Some("http://192.0.2.1:1999/icon.png"));
    }

    #[test]
    fn test_wrong_namespace_is_rejected() {
        let description = SAMPLE.replace(
            "urn:schemas-upnp-org:device-1-0",
            "urn:example-com:other-1-0",
        );
        assert!(read_root_description(&description).is_err());
    }

    #[test]
    fn test_missing_device_element_is_rejected() {
        let description = r#"<root xmlns="urn:schemas-upnp-org:device-1-0"><URLBase>http://192.0.2.1:1999</URLBase></root>"#;
        assert!(read_root_description(description).is_err());
    }

    #[test]
    fn test_unparseable_document_is_rejected() {
        assert!(read_root_description("this is not xml").is_err());
        assert!(read_root_description("<root xmlns=\"urn:schemas-upnp-org:device-1-0\"><device>").is_err());
    }

    #[test]
    fn test_render_and_read_round_trip() {
        let device = local_device();
        let rendered = root_description(&device).unwrap();
        let metadata = read_root_description(&rendered).unwrap();
        assert_eq!(metadata.property("friendlyName"), Some("Test Device"));
        assert_eq!(
            metadata.property("deviceType"),
            Some("urn:schemas-upnp-org:device:Basic:1")
        );
        assert_eq!(
            metadata.property("UDN"),
            Some(format!("uuid:{}", device.uuid).as_str())
        );
        assert_eq!(metadata.icon_url(), Some("http://192.0.2.1:1999/icon.png"));
    }

    #[test]
    fn test_rendered_description_ends_with_root_close_tag() {
        let rendered = root_description(&local_device()).unwrap();
        assert!(rendered.ends_with("</root>"));
        assert!(rendered.contains("<URLBase>http://192.0.2.1:1999</URLBase>"));
        assert!(rendered.contains("<UPC/>"));
        assert!(rendered.contains("<serviceList/>"));
    }
}
