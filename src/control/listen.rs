/*!
Fan-out of discovered device records to local subscribers.

Listeners connect over a unix stream socket and receive newline-delimited frames:

```text
DEVICE <usn>        or  SUBDEVICE <usn>
META <usn>
<key>:<value>       (one per metadata property)
ICON <usn>
<base64 png>        (single line)
```

A device's frames always appear in that order, immediately followed by its subdevices. Icon
bytes are base64-encoded so the frame stays line-delimited. A listener that fails a write is
dropped from the set.
*/

use super::{ControlPoint, Listener};
use crate::ssdp::Device;
use crate::Error;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::fs;
use std::io::{self, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

// ------------------------------------------------------------------------------------------------
// Private Values
// ------------------------------------------------------------------------------------------------

const FRAME_DEVICE: &str = "DEVICE";
const FRAME_SUBDEVICE: &str = "SUBDEVICE";
const FRAME_META: &str = "META";
const FRAME_ICON: &str = "ICON";

// ------------------------------------------------------------------------------------------------
// Private Types
// ------------------------------------------------------------------------------------------------

/// Unlinks the socket path when the server winds down.
struct SocketPathGuard(PathBuf);

impl Drop for SocketPathGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl ControlPoint {
    ///
    /// Serve the listener socket at `path`, accepting subscribers until the listener fails. A
    /// stale socket file at the path is unlinked first, and the path is unlinked again when the
    /// server goes away.
    ///
    pub fn run_ipc_server(self: Arc<Self>, path: &Path) -> Result<(), Error> {
        if path.exists() {
            fs::remove_file(path)?;
        }
        let listener = UnixListener::bind(path)?;
        let _guard = SocketPathGuard(path.to_path_buf());
        info!("run_ipc_server - listening at {}", path.display());
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let coordinator = Arc::clone(&self);
                    thread::spawn(move || coordinator.on_listener_connected(stream));
                }
                Err(error) => warn!("run_ipc_server - accept failed: {}", error),
            }
        }
        Ok(())
    }

    ///
    /// Register a new subscriber: replay every known device to it, then schedule a fresh
    /// discovery so newly observable devices materialise quickly.
    ///
    pub fn on_listener_connected(self: Arc<Self>, stream: UnixStream) {
        info!("on_listener_connected - listener connected");
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let writer = match stream.try_clone() {
            Ok(writer) => writer,
            Err(error) => {
                warn!("on_listener_connected - {}", error);
                return;
            }
        };
        {
            let mut state = self.state.lock();
            state.listeners.push(Listener { id, stream });
        }

        for device in self.remote_devices() {
            if !self.notify_listener(id, &writer, &device) {
                return;
            }
        }

        let coordinator = Arc::clone(&self);
        thread::spawn(move || {
            if let Err(error) = coordinator.discover() {
                warn!(
                    "on_listener_connected - scheduled discovery failed: {}",
                    error
                );
            }
        });
    }

    /// Stream one device to one listener; a failed write drops the listener. Returns whether the
    /// listener is still connected.
    pub(crate) fn notify_listener(&self, id: u64, mut writer: &UnixStream, device: &Device) -> bool {
        match self.write_device_frames(&mut writer, device, false) {
            Ok(()) => true,
            Err(error) => {
                info!("notify_listener - listener disconnected ({})", error);
                self.remove_listener(id);
                false
            }
        }
    }

    fn remove_listener(&self, id: u64) {
        let mut state = self.state.lock();
        state.listeners.retain(|listener| listener.id != id);
    }

    fn write_device_frames<W: Write>(
        &self,
        writer: &mut W,
        device: &Device,
        subdevice: bool,
    ) -> io::Result<()> {
        let frame = if subdevice {
            FRAME_SUBDEVICE
        } else {
            FRAME_DEVICE
        };
        writeln!(writer, "{} {}", frame, device.usn)?;

        let location = match &device.location {
            Some(location) => location,
            None => return writer.flush(),
        };
        let (metadata, icon) = self.describe(location);
        let metadata = match metadata {
            Some(metadata) => metadata,
            None => return writer.flush(),
        };

        writeln!(writer, "{} {}", FRAME_META, device.usn)?;
        for (key, value) in &metadata.properties {
            writeln!(writer, "{}:{}", key, value)?;
        }

        if let Some(icon) = icon {
            writeln!(writer, "{} {}", FRAME_ICON, device.usn)?;
            // b64 so the frame can stay newline-terminated
            writeln!(writer, "{}", BASE64.encode(&icon))?;
        }

        for child in &device.subdevices {
            self.write_device_frames(writer, child, true)?;
        }
        writer.flush()
    }
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------
