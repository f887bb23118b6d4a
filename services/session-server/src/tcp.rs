//! TCP transport: each connection performs the line-based login
//! handshake, then runs a read loop (decoding inbound frames into
//! dispatched packets) alongside a periodic outbound-queue drain, on
//! the same task via `select!`.

use std::sync::Arc;
use std::time::Duration;

use concerto_core::{disconnect, Session};
use concerto_protocol::{encode_frame, try_parse_frame, PacketFrame, Reader, RequestId, ResponseId, Writer};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

use crate::state::AppState;

const OUTBOUND_DRAIN_INTERVAL: Duration = Duration::from_millis(100);

pub async fn listen(addr: impl ToSocketAddrs, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = ?listener.local_addr().ok(), "tcp listener bound");
    loop {
        let (socket, remote_addr) = listener.accept().await?;
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(socket, remote_addr.to_string(), state).await {
                tracing::debug!(%err, "tcp connection ended");
            }
        });
    }
}

async fn read_login_lines(reader: &mut BufReader<OwnedReadHalf>) -> std::io::Result<(String, String, String)> {
    let mut username = String::new();
    let mut password_md5 = String::new();
    let mut client_data = String::new();
    reader.read_line(&mut username).await?;
    reader.read_line(&mut password_md5).await?;
    reader.read_line(&mut client_data).await?;
    Ok((
        username.trim_end().to_owned(),
        password_md5.trim_end().to_owned(),
        client_data.trim_end().to_owned(),
    ))
}

async fn handle_connection(socket: TcpStream, remote_addr: String, state: AppState) -> std::io::Result<()> {
    let (read_half, mut write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);
    let (username, password_md5, client_data_raw) = read_login_lines(&mut reader).await?;

    let outcome = state
        .authenticator()
        .login(concerto_core::LoginRequest {
            username,
            password_md5,
            client_data_raw,
            transport: concerto_core::Transport::Tcp,
            remote_addr,
        })
        .await;

    let session = match outcome {
        concerto_core::LoginOutcome::Success(session) => session,
        concerto_core::LoginOutcome::Raw(bytes) => {
            let _ = write_half.write_all(&bytes).await;
            return Ok(());
        }
        concerto_core::LoginOutcome::Failure(failure) => {
            let _ = write_half.write_all(&login_failure_frame(failure)).await;
            return Ok(());
        }
    };

    let outbound = session.drain_outbound().await;
    if write_half.write_all(&outbound).await.is_err() {
        disconnect(&state.sessions, &state.chat, &state.spectators, &state.multiplayer, &session).await;
        return Ok(());
    }

    let mut read_buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let mut drain_interval = tokio::time::interval(OUTBOUND_DRAIN_INTERVAL);

    'conn: loop {
        tokio::select! {
            result = reader.read(&mut chunk) => {
                let n = match result {
                    Ok(0) | Err(_) => break 'conn,
                    Ok(n) => n,
                };
                read_buf.extend_from_slice(&chunk[..n]);
                loop {
                    match try_parse_frame(&read_buf) {
                        Ok(Some((consumed, frame))) => {
                            read_buf.drain(..consumed);
                            handle_frame(&state, &session, frame).await;
                        }
                        Ok(None) => break,
                        Err(err) => {
                            tracing::debug!(%err, "frame parse error; closing connection");
                            break 'conn;
                        }
                    }
                }
            }
            _ = drain_interval.tick() => {
                let outbound = session.drain_outbound().await;
                if !outbound.is_empty() && write_half.write_all(&outbound).await.is_err() {
                    break 'conn;
                }
            }
        }
    }

    disconnect(&state.sessions, &state.chat, &state.spectators, &state.multiplayer, &session).await;
    Ok(())
}

async fn handle_frame(state: &AppState, session: &Arc<Session>, frame: PacketFrame) {
    let Some(request_id) = RequestId::from_u16(frame.packet_id) else {
        tracing::debug!(packet_id = frame.packet_id, "unknown request packet id; dropped");
        return;
    };
    let Some(decoders) = state.decoders.resolve(session.protocol_version) else {
        return;
    };
    let Some(decode) = decoders.get(&frame.packet_id) else {
        return;
    };
    let mut reader = Reader::new(&frame.payload);
    match decode(&mut reader) {
        Ok(payload) => state.dispatcher.dispatch(session, request_id, payload).await,
        Err(err) => tracing::debug!(%err, packet_id = frame.packet_id, "failed to decode packet"),
    }
}

fn login_failure_frame(failure: concerto_protocol::LoginFailure) -> Vec<u8> {
    let mut writer = Writer::new();
    writer.write_i32(failure.code());
    encode_frame(ResponseId::LoginReply.as_u16(), &writer.into_bytes(), false)
}
