//! Per-connection handler.
//!
//! One task per accepted connection reads commands sequentially and
//! writes replies in the same order, so per-connection ordering needs
//! no further machinery. Pipelining falls out of the buffer: every
//! complete frame already buffered is executed before the next read,
//! and their replies batch into one write.
//!
//! A malformed frame closes the connection without a reply for that
//! frame. Non-array frames and empty arrays are skipped.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use moonres_protocol::{parse_frame, Frame};

use crate::engine::Engine;

/// Initial buffer capacity; covers typical commands without
/// over-allocating for PING/GET/SET traffic.
const BUF_CAPACITY: usize = 4096;

/// Read buffer cap. A client that streams an enormous incomplete frame
/// gets disconnected instead of growing the buffer without bound.
const MAX_BUF_SIZE: usize = 64 * 1024 * 1024;

/// Drives a single client connection to completion.
pub async fn handle(
    mut stream: TcpStream,
    peer: SocketAddr,
    engine: Arc<Engine>,
) -> std::io::Result<()> {
    let mut buf = BytesMut::with_capacity(BUF_CAPACITY);
    let mut out = BytesMut::with_capacity(BUF_CAPACITY);

    debug!(%peer, "client connected");

    loop {
        if buf.len() > MAX_BUF_SIZE {
            debug!(%peer, "read buffer cap exceeded, closing");
            return Ok(());
        }

        // 0 bytes = clean disconnect
        if stream.read_buf(&mut buf).await? == 0 {
            debug!(%peer, "client disconnected");
            return Ok(());
        }

        // execute every complete frame already buffered, batching the
        // replies into a single write
        out.clear();
        loop {
            match parse_frame(&buf) {
                Ok(Some((frame, consumed))) => {
                    let _ = buf.split_to(consumed);
                    match frame {
                        Frame::Array(items) if !items.is_empty() => {
                            let Some(name_bytes) = items[0].as_bytes() else {
                                debug!(%peer, "skipping command with non-string name");
                                continue;
                            };
                            let name =
                                String::from_utf8_lossy(&name_bytes).to_ascii_uppercase();
                            let reply = engine.execute(&name, &items[1..], Some(peer)).await;
                            reply.serialize(&mut out);
                        }
                        Frame::Array(_) | Frame::NullArray => {}
                        other => {
                            debug!(%peer, frame = ?other, "skipping non-array frame");
                        }
                    }
                }
                Ok(None) => break, // need more data
                Err(e) => {
                    // protocol error: flush replies already produced for
                    // this batch, then close without replying to the
                    // malformed frame
                    debug!(%peer, "protocol error, closing connection: {e}");
                    if !out.is_empty() {
                        let _ = stream.write_all(&out).await;
                    }
                    return Ok(());
                }
            }
        }

        if !out.is_empty() {
            stream.write_all(&out).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use moonres_core::ShardedStore;
    use tokio::net::TcpListener;

    async fn spawn_server() -> SocketAddr {
        let mut cfg = Config::default();
        cfg.gc.enabled = false;
        let store = Arc::new(ShardedStore::new(2).unwrap());
        let engine = Arc::new(Engine::new(store, &cfg).unwrap());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let (stream, peer) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(_) => return,
                };
                let engine = Arc::clone(&engine);
                tokio::spawn(async move {
                    let _ = handle(stream, peer, engine).await;
                });
            }
        });
        addr
    }

    async fn send_and_read(stream: &mut TcpStream, request: &[u8], expect_len: usize) -> Vec<u8> {
        stream.write_all(request).await.unwrap();
        let mut reply = vec![0u8; expect_len];
        stream.read_exact(&mut reply).await.unwrap();
        reply
    }

    #[tokio::test]
    async fn set_get_del_over_the_wire() {
        let addr = spawn_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let reply = send_and_read(
            &mut stream,
            b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n",
            5,
        )
        .await;
        assert_eq!(reply, b"+OK\r\n");

        let reply = send_and_read(&mut stream, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n", 7).await;
        assert_eq!(reply, b"$1\r\nv\r\n");

        let reply = send_and_read(&mut stream, b"*2\r\n$3\r\nDEL\r\n$1\r\nk\r\n", 4).await;
        assert_eq!(reply, b":1\r\n");

        let reply = send_and_read(&mut stream, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n", 5).await;
        assert_eq!(reply, b"$-1\r\n");
    }

    #[tokio::test]
    async fn pipelined_commands_reply_in_order() {
        let addr = spawn_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let pipeline = b"*1\r\n$4\r\nPING\r\n\
                         *3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\n1\r\n\
                         *2\r\n$3\r\nGET\r\n$1\r\na\r\n";
        let reply = send_and_read(&mut stream, pipeline, 7 + 5 + 7).await;
        assert_eq!(reply, b"+PONG\r\n+OK\r\n$1\r\n1\r\n");
    }

    #[tokio::test]
    async fn lowercase_command_names_work() {
        let addr = spawn_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let reply = send_and_read(&mut stream, b"*1\r\n$4\r\nping\r\n", 7).await;
        assert_eq!(reply, b"+PONG\r\n");
    }

    #[tokio::test]
    async fn malformed_frame_closes_without_reply() {
        let addr = spawn_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        stream.write_all(b"~not resp\r\n").await.unwrap();
        let mut buf = Vec::new();
        let n = stream.read_to_end(&mut buf).await.unwrap();
        assert_eq!(n, 0, "connection should close with no reply bytes");
    }

    #[tokio::test]
    async fn nx_blocked_write_returns_null_over_the_wire() {
        let addr = spawn_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        send_and_read(
            &mut stream,
            b"*4\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\n1\r\n$2\r\nNX\r\n",
            5,
        )
        .await;
        let reply = send_and_read(
            &mut stream,
            b"*4\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\n2\r\n$2\r\nNX\r\n",
            5,
        )
        .await;
        assert_eq!(reply, b"$-1\r\n");
    }
}
