use std::net::Ipv4Addr;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use tokio::net::UdpSocket;

use ndn_common::wire::DEFAULT_REG_PORT;
use ndn_registrar::{serve, Registry};

/// Registration service for the NDN overlay.
#[derive(Parser, Debug)]
#[command(name = "ndn-registrar", version)]
struct Args {
    /// UDP port to listen on.
    #[arg(long, default_value_t = DEFAULT_REG_PORT)]
    port: u16,

    /// Address to bind.
    #[arg(long, default_value_t = Ipv4Addr::UNSPECIFIED)]
    bind: Ipv4Addr,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let socket = UdpSocket::bind((args.bind, args.port))
        .await
        .with_context(|| format!("failed to bind UDP {}:{}", args.bind, args.port))?;
    info!("registration service listening on {}", socket.local_addr()?);

    serve(socket, Registry::new()).await
}
