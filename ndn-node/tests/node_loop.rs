// Black-box tests of a running node loop: commands arrive over the same
// stream stdin would feed, peers are real TCP sockets speaking the wire
// grammar, and the registration service is the real one on an ephemeral
// port.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{ensure, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_stream::wrappers::ReceiverStream;

use ndn_common::wire::NodeAddr;
use ndn_node::{Node, NodeConfig};
use ndn_registrar::{serve, Registry};

async fn start_registrar() -> Result<SocketAddr> {
    let socket = UdpSocket::bind("127.0.0.1:0").await?;
    let addr = socket.local_addr()?;
    tokio::spawn(serve(socket, Registry::new()));
    Ok(addr)
}

struct TestNode {
    addr: NodeAddr,
    commands: mpsc::Sender<String>,
    handle: JoinHandle<Result<()>>,
}

impl TestNode {
    async fn spawn(registrar: SocketAddr, seed: u64) -> Result<Self> {
        let config = NodeConfig::new([127, 0, 0, 1].into(), 0)
            .with_registrar(registrar)
            .with_rng_seed(seed);
        let mut node = Node::new(config).await?;
        let addr = node.local_addr();
        let (commands, rx) = mpsc::channel(16);
        let handle = tokio::spawn(async move { node.run(ReceiverStream::new(rx)).await });
        Ok(Self {
            addr,
            commands,
            handle,
        })
    }

    async fn command(&self, line: &str) -> Result<()> {
        self.commands.send(line.to_string()).await?;
        Ok(())
    }
}

/// A scripted peer: a plain TCP connection speaking the line grammar.
struct RawPeer {
    stream: TcpStream,
    buf: Vec<u8>,
}

impl RawPeer {
    async fn connect(node: NodeAddr, own_port: u16) -> Result<Self> {
        let mut stream = TcpStream::connect((node.ip, node.port)).await?;
        stream
            .write_all(format!("ENTRY 127.0.0.1 {own_port}\n").as_bytes())
            .await?;
        Ok(Self {
            stream,
            buf: Vec::new(),
        })
    }

    async fn send(&mut self, line: &str) -> Result<()> {
        self.stream.write_all(format!("{line}\n").as_bytes()).await?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.buf.drain(..=pos).collect();
                return Ok(String::from_utf8_lossy(&line[..pos]).into_owned());
            }
            let mut chunk = [0u8; 256];
            let n = timeout(Duration::from_secs(5), self.stream.read(&mut chunk)).await??;
            ensure!(n > 0, "peer closed the stream");
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }
}

async fn member_list(registrar: SocketAddr, net: &str) -> Result<String> {
    let client = UdpSocket::bind("127.0.0.1:0").await?;
    client
        .send_to(format!("NODES {net}").as_bytes(), registrar)
        .await?;
    let mut buf = [0u8; 512];
    let (len, _) = timeout(Duration::from_secs(5), client.recv_from(&mut buf)).await??;
    Ok(String::from_utf8_lossy(&buf[..len]).into_owned())
}

#[tokio::test]
async fn lone_node_answers_hit_and_miss() -> Result<()> {
    let registrar = start_registrar().await?;
    let node = TestNode::spawn(registrar, 7).await?;

    node.command("dj 0.0.0.0 0").await?;
    node.command("create foo").await?;
    sleep(Duration::from_millis(200)).await;

    let mut peer = RawPeer::connect(node.addr, 45001).await?;
    peer.send("INTEREST 17 foo").await?;
    assert_eq!(peer.read_line().await?, "OBJECT 17 foo");

    // The peer is the node's only neighbor, so a miss comes straight back.
    peer.send("INTEREST 99 bar").await?;
    assert_eq!(peer.read_line().await?, "NOOBJECT 99 bar");
    Ok(())
}

#[tokio::test]
async fn join_registers_and_interest_relays_across_the_tree() -> Result<()> {
    let registrar = start_registrar().await?;

    let a = TestNode::spawn(registrar, 1).await?;
    a.command("join 042").await?;
    sleep(Duration::from_millis(300)).await;
    a.command("create foo").await?;

    let b = TestNode::spawn(registrar, 2).await?;
    b.command("join 042").await?;
    sleep(Duration::from_millis(300)).await;

    // Both nodes made it into the registry.
    let members = member_list(registrar, "042").await?;
    assert!(members.starts_with("NODESLIST 042\n"));
    assert!(members.contains(&format!("127.0.0.1 {}\n", a.addr.port)));
    assert!(members.contains(&format!("127.0.0.1 {}\n", b.addr.port)));

    // A third party asking B for A's object is answered through the tree.
    let mut peer = RawPeer::connect(b.addr, 45002).await?;
    peer.send("INTEREST 5 foo").await?;
    assert_eq!(peer.read_line().await?, "OBJECT 5 foo");

    // B cached the name, so a fresh search still finds it.
    peer.send("INTEREST 6 foo").await?;
    assert_eq!(peer.read_line().await?, "OBJECT 6 foo");

    // A miss walks the whole tree and comes back as NOOBJECT.
    peer.send("INTEREST 9 nothere").await?;
    assert_eq!(peer.read_line().await?, "NOOBJECT 9 nothere");
    Ok(())
}

#[tokio::test]
async fn leave_points_internal_neighbors_at_the_external_link() -> Result<()> {
    let registrar = start_registrar().await?;

    let a = TestNode::spawn(registrar, 1).await?;
    a.command("join 007").await?;
    sleep(Duration::from_millis(300)).await;

    let b = TestNode::spawn(registrar, 2).await?;
    b.command("join 007").await?;
    sleep(Duration::from_millis(300)).await;

    // A scripted internal neighbor hangs off B.
    let mut c = RawPeer::connect(b.addr, 45003).await?;
    sleep(Duration::from_millis(200)).await;

    // B departs: every internal neighbor learns B's external address (A).
    b.command("leave").await?;
    assert_eq!(
        c.read_line().await?,
        format!("LEAVE 127.0.0.1 {}", a.addr.port)
    );

    // Once the internal links close, B's loop finishes on its own.
    drop(c);
    timeout(Duration::from_secs(5), b.handle).await???;

    // B deregistered on the way out.
    sleep(Duration::from_millis(200)).await;
    let members = member_list(registrar, "007").await?;
    assert!(!members.contains(&format!("127.0.0.1 {}\n", b.addr.port)));
    assert!(members.contains(&format!("127.0.0.1 {}\n", a.addr.port)));
    Ok(())
}
