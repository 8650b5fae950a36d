//! Newline-delimited text framing over TCP

use std::fmt::Display;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// One TCP connection speaking one message per line
pub struct LineConnection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    peer: Option<SocketAddr>,
    buf: String,
}

impl LineConnection {
    pub fn new(stream: TcpStream) -> Self {
        let peer = stream.peer_addr().ok();
        let (read, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read),
            writer,
            peer,
            buf: String::new(),
        }
    }

    /// Connect to `addr`
    pub async fn connect(addr: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(stream))
    }

    /// Remote address, if the socket still knew it at accept time
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Write one message followed by a newline
    pub async fn send<M: Display + ?Sized>(&mut self, message: &M) -> io::Result<()> {
        let line = format!("{}\n", message);
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await
    }

    /// Read the next line without its terminator. `None` once the peer closed.
    pub async fn recv_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        let read = self.reader.read_line(&mut self.buf).await?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(self.buf.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Half-close the write side; the peer sees end of stream
    pub async fn shutdown(&mut self) {
        let _ = self.writer.shutdown().await;
    }
}
