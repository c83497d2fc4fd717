use human_panic::setup_panic;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use structopt::StructOpt;
use tracing::{error, info};
use upnp_agent::control::ControlPoint;
use upnp_agent::scpd::MetadataServer;
use upnp_agent::ssdp::engine::{Engine, Options as EngineOptions};
use upnp_agent::ssdp::{protocol, LocalDevice};
use upnp_agent::error::configuration;
use upnp_agent::utils::interface;
use upnp_agent::{Error, UPNP_DOMAIN};

#[derive(Debug, StructOpt)]
#[structopt(name = "upnp-agent", about = "UPnP discovery and announcement agent")]
struct CommandLine {
    /// The level of logging to perform, from warnings to trace
    #[structopt(long, short = "v", parse(from_occurrences))]
    verbose: i8,

    /// The network interface to use for multicast membership and announcements
    #[structopt(long, short)]
    interface: Option<String>,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Control-point mode: discover devices on the local network
    Discover {
        /// Search target filter; `root` and bare device-type words are shorthand
        /// for `upnp:rootdevice` and `urn:schemas-upnp-org:device:<word>:1`
        #[structopt(long)]
        filter: Option<String>,

        /// Seconds to wait for responses after a search
        #[structopt(long, default_value = "6")]
        wait: u64,

        /// Create a stream socket for listeners, at the given path or a default
        /// under the system temp directory
        #[structopt(long)]
        sock: Option<Option<PathBuf>>,

        /// Disable listening for NOTIFY messages; only a foreground search is performed
        #[structopt(long = "no-daemon")]
        no_daemon: bool,
    },
    /// Device mode: announce this host and serve its description
    Announce {
        /// Friendly name of the device
        #[structopt(long, default_value = "Basic Device")]
        name: String,

        /// Device type word, expanded to `urn:schemas-upnp-org:device:<type>:1`
        #[structopt(long = "type", default_value = "Basic")]
        device_type: String,

        /// Path to a PNG image to use as the device icon
        #[structopt(long, parse(from_os_str))]
        icon: Option<PathBuf>,

        /// Port on which the metadata server listens
        #[structopt(long, default_value = "1999")]
        port: u16,

        /// Reply to all searches regardless of their search target
        #[structopt(long = "ignore-filter")]
        ignore_filter: bool,
    },
}

pub fn main() {
    setup_panic!();

    let args = CommandLine::from_args();

    init_tracing(args.verbose);

    let result = match args.cmd {
        Command::Discover {
            filter,
            wait,
            sock,
            no_daemon,
        } => do_discover(args.interface, filter, wait, sock, no_daemon),
        Command::Announce {
            name,
            device_type,
            icon,
            port,
            ignore_filter,
        } => do_announce(args.interface, name, device_type, icon, port, ignore_filter),
    };

    if let Err(error) = result {
        eprintln!("{}", error);
        std::process::exit(1);
    }
}

// ------------------------------------------------------------------------------------------------
// Private Functions
// ------------------------------------------------------------------------------------------------

fn init_tracing(verbosity: i8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
    info!("init_tracing - log filter level set to {}", level);
}

fn expand_filter(filter: Option<String>) -> Option<String> {
    filter.map(|filter| {
        if filter.contains(':') {
            filter
        } else if filter == "root" {
            protocol::TARGET_ROOT_DEVICE.to_string()
        } else {
            format!("urn:{}:device:{}:1", UPNP_DOMAIN, filter)
        }
    })
}

fn default_socket_path() -> PathBuf {
    std::env::temp_dir().join("upnp-agent.sock")
}

fn do_discover(
    interface_name: Option<String>,
    filter: Option<String>,
    wait: u64,
    sock: Option<Option<PathBuf>>,
    no_daemon: bool,
) -> Result<(), Error> {
    let filter = expand_filter(filter);
    info!("do_discover - filter: {:?}, wait: {}s", filter, wait);
    let coordinator = ControlPoint::new(filter, Duration::from_secs(wait), interface_name);

    let mut daemon = None;
    if !no_daemon {
        let worker = Arc::clone(&coordinator);
        daemon = Some(thread::spawn(move || {
            if let Err(error) = worker.run_ssdp_daemon() {
                error!("do_discover - ssdp daemon failed: {}", error);
            }
        }));
    }

    match sock {
        Some(path) => {
            let path = path.unwrap_or_else(default_socket_path);
            Arc::clone(&coordinator).run_ipc_server(&path)?;
        }
        None => {
            Arc::clone(&coordinator).discover()?;
            let devices = coordinator.remote_devices();
            println!("discovery returned {} device(s).", devices.len());
            for device in devices {
                println!(
                    "{} @ {}",
                    device.usn,
                    device.location.as_deref().unwrap_or("<no location>")
                );
                for subdevice in &device.subdevices {
                    println!("  {}", subdevice.usn);
                }
            }
        }
    }

    if let Some(daemon) = daemon {
        let _ = daemon.join();
    }
    Ok(())
}

fn do_announce(
    interface_name: Option<String>,
    name: String,
    device_type: String,
    icon: Option<PathBuf>,
    port: u16,
    ignore_filter: bool,
) -> Result<(), Error> {
    let host = interface::ip_address_for_interface(&interface_name)
        .or_else(interface::default_local_address)
        .ok_or_else(|| configuration("no usable IPv4 address to announce; try --interface"))?;

    let device_type = format!("urn:{}:device:{}:1", UPNP_DOMAIN, device_type);
    let mut device = LocalDevice::new(host, port, device_type, name);
    if let Some(path) = icon {
        device.icon = Some(fs::read(path)?);
    }
    info!(
        "do_announce - {} at {}",
        device.friendly_name,
        device.location()
    );

    let server = MetadataServer::new(&device)?;
    let server_thread = thread::spawn(move || {
        if let Err(error) = server.run() {
            error!("do_announce - metadata server failed: {}", error);
        }
    });

    let options = EngineOptions {
        network_interface: interface_name,
        local_port: protocol::MULTICAST_PORT,
        ..EngineOptions::default()
    };
    let mut engine = Engine::new(&options)?;
    engine.set_ignore_search_target(ignore_filter);
    for advertisement in device.advertisements() {
        engine.announce(advertisement)?;
    }

    let result = engine.run();
    let _ = server_thread.join();
    result
}
