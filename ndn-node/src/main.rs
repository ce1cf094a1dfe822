use std::net::{Ipv4Addr, SocketAddr};

use anyhow::Result;
use clap::Parser;
use tokio::io::AsyncBufReadExt;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;

use ndn_common::wire::DEFAULT_REG_PORT;
use ndn_node::{Node, NodeConfig};

/// NDN overlay node.
#[derive(Parser, Debug)]
#[command(name = "ndn-node", version)]
struct Args {
    /// Address this node advertises to its peers.
    own_ip: Ipv4Addr,

    /// TCP port this node listens on.
    own_port: u16,

    /// Registration service address.
    #[arg(default_value = "127.0.0.1")]
    reg_ip: Ipv4Addr,

    /// Registration service UDP port.
    #[arg(default_value_t = DEFAULT_REG_PORT)]
    reg_port: u16,

    /// Fixed RNG seed, for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = NodeConfig::new(args.own_ip, args.own_port)
        .with_registrar(SocketAddr::from((args.reg_ip, args.reg_port)));
    if let Some(seed) = args.seed {
        config = config.with_rng_seed(seed);
    }

    let mut node = Node::new(config).await?;
    println!(
        "node {} ready; type 'help' for the command list",
        node.local_addr()
    );

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let commands = LinesStream::new(stdin.lines()).filter_map(|line| line.ok());
    node.run(commands).await
}
