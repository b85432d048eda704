//! plankton simulator CLI
//!
//! Runs a simulated device exposed through one of its protocol adapters.

use clap::Parser;
use plankton_env::validate_cycle_delay;
use plankton_sim::{Registry, Simulation, SimulationConfig, SimulationError};
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// plankton device simulator
#[derive(Parser, Debug)]
#[command(name = "plankton-sim", version)]
#[command(about = "Run a simulated hardware device", long_about = None)]
struct Args {
    /// Device to simulate; omit to list available devices
    device: Option<String>,

    /// Protocol to expose the device with (default: the device's first)
    #[arg(short, long)]
    protocol: Option<String>,

    /// Named setup to start the device with
    #[arg(short, long, default_value = "default")]
    setup: String,

    /// Wall-clock seconds per simulation cycle
    #[arg(short, long, default_value = "0.1")]
    cycle_delay: f64,

    /// Simulated seconds per wall-clock second
    #[arg(short = 'e', long, default_value = "1.0")]
    speed: f64,

    /// Serve remote control requests on HOST:PORT
    #[arg(short, long, value_name = "HOST:PORT")]
    rpc_host: Option<String>,

    /// List the protocols and setups of the device and exit
    #[arg(short, long)]
    list_protocols: bool,

    /// Print the device's interface for the selected protocol and exit
    #[arg(short = 'i', long)]
    show_interface: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Arguments passed to the adapter (after `--`)
    #[arg(last = true)]
    adapter_args: Vec<String>,
}

fn init_logging(verbose: bool) {
    let result = if std::env::var_os("RUST_LOG").is_some() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let level = if verbose { Level::DEBUG } else { Level::INFO };
        let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
        tracing::subscriber::set_global_default(subscriber)
    };

    if let Err(e) = result {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn run(args: Args) -> Result<(), SimulationError> {
    let registry = Registry::builtin();

    let Some(device_name) = args.device else {
        println!("Available devices:");
        for device in registry.devices() {
            println!("    {}", device);
        }
        return Ok(());
    };

    if args.list_protocols {
        println!("Protocols of {}:", device_name);
        for protocol in registry.protocols(&device_name)? {
            println!("    {}", protocol);
        }
        println!("Setups of {}:", device_name);
        for setup in registry.setups(&device_name)? {
            println!("    {}", setup);
        }
        return Ok(());
    }

    let device = registry.create_device(&device_name, Some(&args.setup))?;
    let adapter = registry.create_adapter(
        &device_name,
        device.as_ref(),
        args.protocol.as_deref(),
        &args.adapter_args,
    )?;

    if args.show_interface {
        println!("{}", adapter.documentation());
        return Ok(());
    }

    let cycle_delay = validate_cycle_delay(args.cycle_delay)?;
    let mut config = SimulationConfig::default()
        .with_cycle_delay(cycle_delay)
        .with_speed(args.speed);
    if let Some(address) = args.rpc_host {
        config = config.with_control_address(address);
    }

    info!(
        device = %device_name,
        setup = %args.setup,
        protocol = %adapter.protocol(),
        "plankton simulator v{}",
        env!("CARGO_PKG_VERSION")
    );

    let mut simulation = Simulation::new(device, adapter, config)?;
    simulation.start()
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args) {
        eprintln!("An error occurred: {}", e);
        std::process::exit(1);
    }
}
