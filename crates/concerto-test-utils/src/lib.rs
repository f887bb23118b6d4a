//! Test double for exercising the session protocol end to end: a
//! minimal client that speaks the framed binary wire format directly
//! over a `tokio::net::TcpStream`, without any of the bookkeeping a
//! real game client carries.

use std::io;

use concerto_protocol::{encode_frame, try_parse_frame, PacketFrame};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

pub struct MockSessionClient {
    stream: TcpStream,
    inbound: Vec<u8>,
}

impl MockSessionClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> io::Result<Self> {
        Ok(Self {
            stream: TcpStream::connect(addr).await?,
            inbound: Vec::new(),
        })
    }

    /// Writes the three LF-delimited login lines a real client sends
    /// before any framed packet follows.
    pub async fn send_login(
        &mut self,
        username: &str,
        password_md5: &str,
        client_data: &str,
    ) -> io::Result<()> {
        let mut line = String::new();
        line.push_str(username);
        line.push('\n');
        line.push_str(password_md5);
        line.push('\n');
        line.push_str(client_data);
        line.push('\n');
        self.stream.write_all(line.as_bytes()).await
    }

    pub async fn send_frame(&mut self, packet_id: u16, payload: &[u8]) -> io::Result<()> {
        self.stream
            .write_all(&encode_frame(packet_id, payload, false))
            .await
    }

    /// Reads bytes off the socket until a full frame is buffered, then
    /// returns it. The TCP login reply (`LOGIN_REPLY`) is read the same
    /// way as any other frame, once the handshake lines are in.
    pub async fn recv_frame(&mut self) -> io::Result<PacketFrame> {
        loop {
            if let Some((consumed, frame)) = try_parse_frame(&self.inbound)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?
            {
                self.inbound.drain(..consumed);
                return Ok(frame);
            }
            let mut buf = [0u8; 4096];
            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"));
            }
            self.inbound.extend_from_slice(&buf[..n]);
        }
    }

    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.stream.local_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn client_round_trips_a_frame_against_an_echo_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(&buf[..n]).await.unwrap();
        });

        let mut client = MockSessionClient::connect(addr).await.unwrap();
        client.send_frame(7, b"hello").await.unwrap();
        let frame = client.recv_frame().await.unwrap();
        assert_eq!(frame.packet_id, 7);
        assert_eq!(frame.payload, b"hello");
    }

    #[tokio::test]
    async fn recv_frame_buffers_a_frame_split_across_multiple_reads() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let framed = encode_frame(1, b"split across reads", false);
            let (first, second) = framed.split_at(3);
            socket.write_all(first).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            socket.write_all(second).await.unwrap();
        });

        let mut client = MockSessionClient::connect(addr).await.unwrap();
        let frame = client.recv_frame().await.unwrap();
        assert_eq!(frame.packet_id, 1);
        assert_eq!(frame.payload, b"split across reads");
    }

    #[tokio::test]
    async fn recv_frame_surfaces_eof_as_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
        });

        let mut client = MockSessionClient::connect(addr).await.unwrap();
        assert!(client.recv_frame().await.is_err());
    }
}
