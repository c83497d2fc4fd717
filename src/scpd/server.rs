/*!
The metadata server a device runs beside its SSDP announcements: one request line per connection,
two recognised paths, everything else answered with a 400. The root description is rendered once
at construction and served with an exact `Content-Length`; the remainder of the request is never
read and connections are closed after the response is flushed.
*/

use crate::scpd::{description, protocol};
use crate::ssdp::LocalDevice;
use crate::Error;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

#[derive(Debug)]
pub struct MetadataServer {
    address: SocketAddr,
    root_desc_request: String,
    icon_request: String,
    root_description: Vec<u8>,
    icon: Option<Vec<u8>>,
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl MetadataServer {
    ///
    /// Build a server for the given device, pre-rendering its root description.
    ///
    pub fn new(device: &LocalDevice) -> Result<Self, Error> {
        Ok(MetadataServer {
            address: SocketAddr::new(device.host, device.port),
            root_desc_request: request_line(protocol::ROOT_DESC_PATH),
            icon_request: request_line(protocol::ICON_PATH),
            root_description: description::root_description(device)?.into_bytes(),
            icon: device.icon.clone(),
        })
    }

    ///
    /// Bind the configured address and answer requests until the listener fails.
    ///
    pub fn run(&self) -> Result<(), Error> {
        let listener = TcpListener::bind(self.address)?;
        info!(
            "run - serving root description at http://{}{}",
            self.address,
            protocol::ROOT_DESC_PATH
        );
        self.serve(&listener)
    }

    fn serve(&self, listener: &TcpListener) -> Result<(), Error> {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Err(error) = self.handle_connection(stream) {
                        debug!("serve - request failed: {}", error);
                    }
                }
                Err(error) => warn!("serve - accept failed: {}", error),
            }
        }
        Ok(())
    }

    fn handle_connection(&self, stream: TcpStream) -> Result<(), Error> {
        let mut reader = BufReader::new(&stream);
        let mut line = String::new();
        reader.read_line(&mut line)?;
        let line = line.trim_end();
        debug!("handle_connection - {}", line);

        match &self.icon {
            Some(icon) if line == self.icon_request => send_response(
                &stream,
                protocol::STATUS_LINE_OK,
                protocol::CONTENT_TYPE_PNG,
                icon,
            ),
            _ if line == self.root_desc_request => send_response(
                &stream,
                protocol::STATUS_LINE_OK,
                protocol::CONTENT_TYPE_XML,
                &self.root_description,
            ),
            _ => send_response(
                &stream,
                protocol::STATUS_LINE_BAD_REQUEST,
                protocol::CONTENT_TYPE_HTML,
                protocol::NOT_FOUND_BODY,
            ),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Private Functions
// ------------------------------------------------------------------------------------------------

fn request_line(path: &str) -> String {
    format!("GET {} HTTP/1.1", path)
}

fn send_response(
    mut stream: &TcpStream,
    status: &str,
    content_type: &str,
    body: &[u8],
) -> Result<(), Error> {
    let header = format!(
        "{}{}{}: {}{}{}: {}{}{}",
        status,
        protocol::LINE_SEP,
        protocol::HEAD_CONTENT_TYPE,
        content_type,
        protocol::LINE_SEP,
        protocol::HEAD_CONTENT_LENGTH,
        body.len(),
        protocol::LINE_SEP,
        protocol::LINE_SEP
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    stream.flush()?;
    Ok(())
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------
