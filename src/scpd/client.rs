/*!
A deliberately small HTTP/1.1 client, just enough to pull a root description and an icon off a
device. One TCP connection per fetch, one request line plus a `HOST` header, and a line-oriented
read of the reply. Description bodies are read up to the closing `</root>` tag; icon bodies are
read by `Content-Length`.
*/

use crate::error::{invalid_header_value, invalid_url, missing_required_header, Error};
use crate::scpd::{description, protocol, DeviceMetadata};
use regex::Regex;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, ErrorKind as IOErrorKind, Read, Write};
use std::net::TcpStream;

lazy_static! {
    static ref HTTP_URL: Regex = Regex::new(r"^http://([^:/@?#]+):(\d+)(/.*)$").unwrap();
}

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

///
/// A one-shot fetcher for a single URL. Construction validates the URL; the fetch operations
/// return `None` on any deviation from the happy path rather than surfacing an error to the
/// discovery pipeline.
///
#[derive(Clone, Debug)]
pub struct MetadataClient {
    host: String,
    port: u16,
    path: String,
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl MetadataClient {
    ///
    /// Validate and split the location URL. The URL must be `http`, with an explicit port and a
    /// path; anything else is an [`Error::InvalidUrl`](../enum.Error.html).
    ///
    pub fn new(location: &str) -> Result<Self, Error> {
        let captures = HTTP_URL
            .captures(location)
            .ok_or_else(|| invalid_url(location))?;
        let port = captures
            .get(2)
            .map(|m| m.as_str())
            .unwrap_or_default()
            .parse::<u16>()
            .map_err(|_| invalid_url(location))?;
        Ok(MetadataClient {
            host: captures
                .get(1)
                .map(|m| m.as_str())
                .unwrap_or_default()
                .to_string(),
            port,
            path: captures
                .get(3)
                .map(|m| m.as_str())
                .unwrap_or_default()
                .to_string(),
        })
    }

    /// Fetch and parse the root description, or `None` on any failure.
    pub fn fetch_metadata(&self) -> Option<DeviceMetadata> {
        match self.try_fetch_metadata() {
            Ok(metadata) => Some(metadata),
            Err(error) => {
                debug!(
                    "fetch_metadata - {}:{}{} failed: {}",
                    self.host, self.port, self.path, error
                );
                None
            }
        }
    }

    /// Fetch the raw icon bytes, or `None` on any failure.
    pub fn fetch_icon(&self) -> Option<Vec<u8>> {
        match self.try_fetch_icon() {
            Ok(icon) => Some(icon),
            Err(error) => {
                debug!(
                    "fetch_icon - {}:{}{} failed: {}",
                    self.host, self.port, self.path, error
                );
                None
            }
        }
    }

    fn try_fetch_metadata(&self) -> Result<DeviceMetadata, Error> {
        let mut reader = self.open()?;
        self.expect_ok_status(&mut reader)?;
        loop {
            if read_line(&mut reader)?.is_empty() {
                break;
            }
        }
        let body = read_until_close_tag(&mut reader)?;
        let body = String::from_utf8(body)
            .map_err(|e| Error::from(crate::MessageFormatError::SourceEncoding(e.utf8_error())))?;
        description::read_root_description(&body)
    }

    fn try_fetch_icon(&self) -> Result<Vec<u8>, Error> {
        let mut reader = self.open()?;
        self.expect_ok_status(&mut reader)?;

        let mut headers: HashMap<String, String> = HashMap::new();
        loop {
            let line = read_line(&mut reader)?;
            if line.is_empty() {
                break;
            }
            match line.split_once(':') {
                Some((name, value)) => {
                    headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
                }
                None => return Err(invalid_header_value("response header", line).into()),
            }
        }

        let length = headers
            .get(&protocol::HEAD_CONTENT_LENGTH.to_ascii_lowercase())
            .ok_or_else(|| missing_required_header(protocol::HEAD_CONTENT_LENGTH))?;
        let length = length
            .parse::<usize>()
            .map_err(|_| invalid_header_value(protocol::HEAD_CONTENT_LENGTH, length.as_str()))?;

        let mut body = vec![0u8; length];
        reader.read_exact(&mut body)?;
        Ok(body)
    }

    /// Connect and send the request; the returned reader is positioned at the status line.
    fn open(&self) -> Result<BufReader<TcpStream>, Error> {
        debug!("open - fetching {} from {}:{}", self.path, self.host, self.port);
        let mut stream = TcpStream::connect((self.host.as_str(), self.port))?;
        let request = format!(
            "GET {} HTTP/1.1{}HOST: {}:{}{}{}",
            self.path,
            protocol::LINE_SEP,
            self.host,
            self.port,
            protocol::LINE_SEP,
            protocol::LINE_SEP
        );
        stream.write_all(request.as_bytes())?;
        Ok(BufReader::new(stream))
    }

    fn expect_ok_status(&self, reader: &mut BufReader<TcpStream>) -> Result<(), Error> {
        let status = read_line(reader)?;
        if status != protocol::STATUS_LINE_OK {
            debug!("expect_ok_status - unexpected response: {}", status);
            return Err(invalid_header_value("status line", status).into());
        }
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// Private Functions
// ------------------------------------------------------------------------------------------------

fn read_line<R: BufRead>(reader: &mut R) -> Result<String, Error> {
    let mut line = String::new();
    let read = reader.read_line(&mut line)?;
    if read == 0 {
        return Err(std::io::Error::from(IOErrorKind::UnexpectedEof).into());
    }
    Ok(line.trim_end().to_string())
}

fn read_until_close_tag<R: BufRead>(reader: &mut R) -> Result<Vec<u8>, Error> {
    let mut body = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        reader.read_exact(&mut byte)?;
        body.push(byte[0]);
        if body.ends_with(protocol::ROOT_CLOSE_TAG) {
            return Ok(body);
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_url_with_host_port_and_path() {
        let client = MetadataClient::new("http://192.0.2.1:1999/root_desc.xml").unwrap();
        assert_eq!(client.host, "192.0.2.1");
        assert_eq!(client.port, 1999);
        assert_eq!(client.path, "/root_desc.xml");
    }

    #[test]
    fn test_urls_missing_a_component_are_rejected() {
        for url in &[
            "http://192.0.2.1/root_desc.xml",
            "http://192.0.2.1:1999",
            "https://192.0.2.1:1999/root_desc.xml",
            "http://192.0.2.1:not-a-port/root_desc.xml",
            "http://192.0.2.1:99999999/root_desc.xml",
            "not a url at all",
        ] {
            assert!(
                matches!(MetadataClient::new(url), Err(Error::InvalidUrl { .. })),
                "expected InvalidUrl for {}",
                url
            );
        }
    }

    #[test]
    fn test_read_until_close_tag_includes_the_tag() {
        let mut reader = std::io::BufReader::new(&b"<root><device/></root>trailing"[..]);
        let body = read_until_close_tag(&mut reader).unwrap();
        assert_eq!(body, b"<root><device/></root>".to_vec());
    }

    #[test]
    fn test_read_until_close_tag_fails_at_eof() {
        let mut reader = std::io::BufReader::new(&b"<root><device/>"[..]);
        assert!(read_until_close_tag(&mut reader).is_err());
    }
}
