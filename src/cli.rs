use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "locationhub", about = "Drive the location hub against simulated backends")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Native,
    Fused,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PriorityArg {
    NoPower,
    LowPower,
    Balanced,
    HighAccuracy,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the candidate adapters and which one resolves
    Resolve {
        /// Pretend the fused location service is installed
        #[arg(long)]
        fused_installed: bool,

        /// Try the fused adapter before the native one
        #[arg(long)]
        fused_first: bool,
    },

    /// Connect, enable mock mode and print a stream of injected fixes
    Watch {
        /// Backend to drive
        #[arg(long, value_enum, default_value = "native")]
        backend: Backend,

        /// Request priority
        #[arg(long, value_enum, default_value = "high-accuracy")]
        priority: PriorityArg,

        /// Requested update interval in milliseconds
        #[arg(long, default_value_t = 6000)]
        interval_ms: i64,

        /// Number of mock fixes to inject
        #[arg(long, default_value_t = 5)]
        count: u32,

        /// Starting latitude
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        lat: f64,

        /// Starting longitude
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        lon: f64,

        /// Altitude in meters
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        alt: f64,

        /// Latitude/longitude step between fixes, in degrees
        #[arg(long, default_value_t = 0.001, allow_negative_numbers = true)]
        step_deg: f64,

        /// Fused handshake delay in milliseconds
        #[arg(long, default_value_t = 50)]
        handshake_ms: u64,
    },
}
