//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use line_relay::net::Listener;
use line_relay::{FramingMode, RelayHandler, Server, ServerError};

pub const WAIT: Duration = Duration::from_secs(5);

/// Start a backend that answers every line with its upper-cased copy.
pub async fn start_upper_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (reader, mut writer) = socket.into_split();
                let mut lines = BufReader::new(reader).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let reply = format!("{}\n", line.to_uppercase());
                    if writer.write_all(reply.as_bytes()).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    addr
}

/// Start a backend that reports every chunk of bytes it receives.
#[allow(dead_code)]
pub async fn start_capture_backend() -> (SocketAddr, mpsc::UnboundedReceiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            let _ = tx.send(buf[..n].to_vec());
                        }
                    }
                }
            });
        }
    });

    (addr, rx)
}

/// A relay server running on an ephemeral port.
pub struct RunningRelay {
    pub server: Arc<Server>,
    pub addr: SocketAddr,
    pub serving: JoinHandle<Result<(), ServerError>>,
}

/// Start a relay forwarding to `target` with the given transport.
pub async fn start_relay(target: SocketAddr, mode: FramingMode) -> RunningRelay {
    let listener = line_relay::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = RelayHandler::new(target.to_string(), mode, Duration::from_secs(2));

    let server = Arc::new(Server::new().with_listener(listener).with_handler(handler));
    let serving = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.run().await })
    };

    RunningRelay { server, addr, serving }
}

/// Send one line and wait for one line back.
pub async fn round_trip(stream: &mut BufReader<TcpStream>, line: &str) -> String {
    stream.get_mut().write_all(line.as_bytes()).await.unwrap();
    let mut reply = String::new();
    tokio::time::timeout(WAIT, stream.read_line(&mut reply))
        .await
        .expect("reply timed out")
        .unwrap();
    reply
}

pub async fn connect(addr: SocketAddr) -> BufReader<TcpStream> {
    BufReader::new(TcpStream::connect(addr).await.unwrap())
}
