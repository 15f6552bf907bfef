use crate::types::{KillSignal, NodeIdx};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Multi-host test harness command line
#[derive(Parser)]
#[command(name = "gridharness")]
#[command(about = "Run commands, start nodes and inspect node logs across cluster hosts")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct GridHarnessCli {
    #[command(subcommand)]
    pub command: Commands,

    /// Harness configuration file (defaults to ~/.config/gridharness/config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Run every host command on this machine instead of over SSH
    #[arg(long, global = true)]
    pub local: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a shell command on one or more hosts
    Exec {
        /// Target host (repeatable, defaults to all configured SSH hosts)
        #[arg(long = "host")]
        hosts: Vec<String>,
        /// Command line to run
        command: String,
    },

    /// Start every node of a configured application
    Start {
        /// Application name from the configuration
        app: String,
        /// Node state file (defaults to ./<app>.nodes.json)
        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Extract an attribute from the logs of started nodes
    Grep {
        app: String,
        /// Attribute name used in the output
        #[arg(long, default_value = "value")]
        attribute: String,
        /// Expression used for both the remote grep and the local capture
        #[arg(long, required_unless_present = "jmx")]
        regex: Option<String>,
        /// Separate local capture expression
        #[arg(long)]
        local_regex: Option<String>,
        /// Parse the captured value as an integer
        #[arg(long)]
        int: bool,
        /// Look up the JMX port instead of a custom expression
        #[arg(long)]
        jmx: bool,
        /// Restrict to these node ids
        #[arg(long = "node")]
        nodes: Vec<NodeIdx>,
        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Wait until a message appears in node logs
    WaitMessage {
        app: String,
        message: String,
        #[arg(long = "node")]
        nodes: Vec<NodeIdx>,
        /// Timeout in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,
        /// Poll interval in seconds
        #[arg(long, default_value = "2")]
        interval: u64,
        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// List the JVMs running on hosts
    Jps {
        /// Target host (repeatable, defaults to all configured SSH hosts)
        #[arg(long = "host")]
        hosts: Vec<String>,
    },

    /// Signal every JVM whose main class or jar contains NAME
    Killall {
        name: String,
        /// Target host (repeatable, defaults to all configured SSH hosts)
        #[arg(long = "host")]
        hosts: Vec<String>,
        #[arg(long, value_enum, default_value = "kill")]
        signal: SignalArg,
    },

    /// Signal started nodes
    Kill {
        app: String,
        #[arg(long = "node")]
        nodes: Vec<NodeIdx>,
        #[arg(long, value_enum, default_value = "kill")]
        signal: SignalArg,
        #[arg(long)]
        state: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SignalArg {
    /// SIGTERM
    Term,
    /// SIGKILL
    Kill,
}

impl From<SignalArg> for KillSignal {
    fn from(arg: SignalArg) -> Self {
        match arg {
            SignalArg::Term => KillSignal::Term,
            SignalArg::Kill => KillSignal::Kill,
        }
    }
}

/// State file used when none is given on the command line.
pub fn default_state_path(app: &str) -> PathBuf {
    PathBuf::from(format!("{app}.nodes.json"))
}
