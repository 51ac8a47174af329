//! Ping/pong token ring CLI
//!
//! ```bash
//! # Whole ring of 3 inside one process, losing 20% of the PINGs
//! ping-pong-ring local --size 3 --ping
//!
//! # One participant of a TCP ring (start one process per address)
//! ping-pong-ring node --id 0 --addresses 127.0.0.1:7000,127.0.0.1:7001
//! ```

use clap::{Args, Parser, Subcommand};
use color_print::cformat;
use ping_pong_ring::{
    log::{self, Level},
    tcp, ConfigError, FaultConfig, LocalRing, Participant, Peer, PeerConfig,
    SleepCriticalSection,
};
use std::{error::Error, net::SocketAddr, process, sync::Arc, time::Duration};
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(name = "ping-pong-ring")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every participant of the ring in this process
    Local {
        /// Number of participants
        #[arg(short, long, default_value = "3")]
        size: usize,

        #[command(flatten)]
        options: ProtocolArgs,
    },
    /// Run one participant of a ring linked over TCP
    Node {
        /// Ordinal id of this participant
        #[arg(long)]
        id: usize,

        /// Listen address of every participant, in ring order
        #[arg(long, value_delimiter = ',', required = true)]
        addresses: Vec<SocketAddr>,

        #[command(flatten)]
        options: ProtocolArgs,
    },
}

#[derive(Args, Debug)]
struct ProtocolArgs {
    /// Simulate the loss of outbound PINGs
    #[arg(long)]
    ping: bool,

    /// Simulate the loss of outbound PONGs
    #[arg(long)]
    pong: bool,

    /// Chance of losing a message in the selected mode [default: 20]. Needs --ping or --pong
    #[arg(long, value_name = "PERCENT")]
    loss_percent: Option<u8>,

    /// Time spent inside the critical section
    #[arg(long, default_value = "1000")]
    critical_section_ms: u64,

    /// Pause before every outbound PONG
    #[arg(long, default_value = "500")]
    pong_delay_ms: u64,

    /// Seed of the loss draws
    #[arg(long)]
    seed: Option<u64>,

    /// Only print warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

impl ProtocolArgs {
    fn peer_config(&self) -> Result<PeerConfig, ConfigError> {
        let mut fault = FaultConfig::from_flags(self.ping, self.pong);
        if let Some(percent) = self.loss_percent {
            fault = fault.with_percent(percent)?;
        }

        let config = PeerConfig::default()
            .with_fault(fault)
            .with_critical_section(Duration::from_millis(self.critical_section_ms))
            .with_pong_send_delay(Duration::from_millis(self.pong_delay_ms));

        Ok(match self.seed {
            Some(seed) => config.with_seed(seed),
            None => config,
        })
    }
}

async fn run_local(size: usize, options: &ProtocolArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = options.peer_config()?;
    let ring = LocalRing::with_sleep(size, &config)?;
    log::info(&cformat!("Starting a local ring of <bold>{size}</bold> participants."));
    ring.run().await
}

async fn run_node(
    id: usize,
    addresses: Vec<SocketAddr>,
    options: &ProtocolArgs,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = options.peer_config()?;
    let participant = Participant::new(id, addresses.len())?;
    let critical_section = Arc::new(SleepCriticalSection::new(config.timings.critical_section));
    let peer = Peer::new(participant, &config, critical_section)?;

    let listener = TcpListener::bind(addresses[participant.id]).await?;
    log::info(&cformat!(
        "Listening for the predecessor on <bold>{}</bold>.",
        addresses[participant.id]
    ));

    let successor_address = addresses[participant.successor_id].to_string();
    let endpoints = tcp::connect_ring(listener, &successor_address).await?;
    peer.run(endpoints).await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Local { size, options } => {
            set_verbosity(&options);
            run_local(size, &options).await
        }
        Command::Node {
            id,
            addresses,
            options,
        } => {
            set_verbosity(&options);
            run_node(id, addresses, &options).await
        }
    };

    if let Err(e) = result {
        match e.downcast_ref::<ConfigError>() {
            Some(config_error) => log::error(&config_error.to_string()),
            None => log::error(&cformat!("The ring stopped: <bold>{e}</bold>")),
        }
        process::exit(1);
    }
}

fn set_verbosity(options: &ProtocolArgs) {
    if options.quiet {
        log::set_level(Level::Warn);
    }
}
