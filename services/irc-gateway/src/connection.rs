//! Per-connection IRC handling: the registration handshake
//! (`PASS`/`NICK`/`USER`), then a command loop mapping
//! `JOIN`/`PART`/`TOPIC`/`PRIVMSG` onto the chat hub and answering
//! everything else with the numeric replies a client expects.

use std::sync::Arc;
use std::time::Duration;

use concerto_collab::{PasswordVerifier, Repository};
use concerto_core::{Channel, ChannelName, ClientFingerprint, Session, Token, Transport};
use concerto_protocol::try_parse_frame;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;

use crate::config::Config;
use crate::state::GatewayState;
use crate::wire::{irc_encoders, numeric, SERVER_NAME};

pub async fn handle(socket: TcpStream, state: GatewayState, config: Config) -> std::io::Result<()> {
    let (read_half, mut write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    let Some((nick, pass)) = read_registration(&mut reader, &mut line).await? else {
        return Ok(());
    };

    let user = match state.repo.user_by_name(&nick).await {
        Ok(user) => user,
        Err(_) => {
            write_half.write_all(numeric(401, &nick, ":No such user").as_bytes()).await?;
            return Ok(());
        }
    };
    if !state.password_verifier.check(&pass, &user.bcrypt_password) {
        write_half
            .write_all(numeric(464, &nick, ":Password incorrect").as_bytes())
            .await?;
        return Ok(());
    }
    if user.restricted {
        write_half
            .write_all(numeric(465, &nick, ":You are banned from this server").as_bytes())
            .await?;
        return Ok(());
    }

    let session = Arc::new(Session::new(
        -user.id,
        user.name.clone(),
        Token::empty(),
        Transport::Tcp,
        String::new(),
        ClientFingerprint {
            version_date: 0,
            adapters_md5: String::new(),
            adapter_list: Vec::new(),
            utc_offset: 0,
            country: *b"XX",
            city: false,
            latitude: 0.0,
            longitude: 0.0,
        },
        0,
        user.permissions,
        user.preferred_mode,
        Arc::new(irc_encoders()),
    ));
    state.sessions.append(session.clone()).await;
    send_welcome(&mut write_half, &user.name).await?;

    let mut drain_interval = tokio::time::interval(Duration::from_millis(200));
    let mut ping_interval = tokio::time::interval(Duration::from_secs(config.ping_interval_secs));

    'conn: loop {
        line.clear();
        tokio::select! {
            result = reader.read_line(&mut line) => {
                let n = result?;
                if n == 0 {
                    break 'conn;
                }
                let trimmed = line.trim_end_matches(['\r', '\n']).to_owned();
                if trimmed.is_empty() {
                    continue;
                }
                session.touch().await;
                if !dispatch_command(&state, &session, &mut write_half, &trimmed).await? {
                    break 'conn;
                }
            }
            _ = drain_interval.tick() => {
                if !flush_outbound(&session, &mut write_half).await? {
                    break 'conn;
                }
            }
            _ = ping_interval.tick() => {
                if session.seconds_since_response().await >= config.timeout_secs {
                    break 'conn;
                }
                if write_half.write_all(format!(":{SERVER_NAME} PING :{SERVER_NAME}\r\n").as_bytes()).await.is_err() {
                    break 'conn;
                }
            }
        }
    }

    teardown(&state, &session).await;
    Ok(())
}

/// Reads lines until both a nick and (implicitly) a completed `USER`
/// line have been seen. `PASS` is optional and may arrive in any
/// order relative to `NICK`; a bare `QUIT` during registration just
/// closes the connection.
async fn read_registration(
    reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>,
    line: &mut String,
) -> std::io::Result<Option<(String, String)>> {
    let mut nick = None;
    let mut pass = String::new();
    loop {
        line.clear();
        if reader.read_line(line).await? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            continue;
        }
        let (command, params) = parse_line(trimmed);
        match command.as_str() {
            "PASS" => pass = params.first().cloned().unwrap_or_default(),
            "NICK" => nick = params.first().cloned(),
            "USER" => {
                if let Some(nick) = nick {
                    return Ok(Some((nick, pass)));
                }
            }
            "QUIT" => return Ok(None),
            _ => {}
        }
    }
}

/// Splits a line into its command word and parameters, honoring the
/// `:`-prefixed trailing parameter that may itself contain spaces.
fn parse_line(line: &str) -> (String, Vec<String>) {
    let mut parts = line.splitn(2, ' ');
    let command = parts.next().unwrap_or_default().to_ascii_uppercase();
    let mut remaining = parts.next().unwrap_or_default();
    let mut params = Vec::new();
    loop {
        let trimmed = remaining.trim_start();
        if trimmed.is_empty() {
            break;
        }
        if let Some(trailing) = trimmed.strip_prefix(':') {
            params.push(trailing.to_owned());
            break;
        }
        match trimmed.split_once(' ') {
            Some((first, rest)) => {
                params.push(first.to_owned());
                remaining = rest;
            }
            None => {
                params.push(trimmed.to_owned());
                break;
            }
        }
    }
    (command, params)
}

async fn dispatch_command(
    state: &GatewayState,
    session: &Arc<Session>,
    write_half: &mut OwnedWriteHalf,
    line: &str,
) -> std::io::Result<bool> {
    let (command, params) = parse_line(line);
    match command.as_str() {
        "JOIN" => {
            if let Some(names) = params.first() {
                for name in names.split(',') {
                    handle_join(state, session, write_half, name).await?;
                }
            }
        }
        "PART" => {
            if let Some(names) = params.first() {
                for name in names.split(',') {
                    handle_part(state, session, name).await;
                }
            }
        }
        "TOPIC" => {
            if let Some(name) = params.first() {
                handle_topic(state, session, write_half, name, params.get(1)).await?;
            }
        }
        "PRIVMSG" => {
            if let (Some(target), Some(text)) = (params.first(), params.get(1)) {
                handle_privmsg(state, session, target, text).await;
            }
        }
        "MOTD" => {
            write_half
                .write_all(numeric(375, &session.name, ":- bancho Message of the day -").as_bytes())
                .await?;
            write_half
                .write_all(numeric(376, &session.name, ":End of /MOTD command.").as_bytes())
                .await?;
        }
        "LUSERS" => {
            let count = state.sessions.len().await;
            write_half
                .write_all(numeric(251, &session.name, &format!(":There are {count} users online")).as_bytes())
                .await?;
        }
        "PING" => {
            let token = params.first().cloned().unwrap_or_default();
            write_half
                .write_all(format!(":{SERVER_NAME} PONG {SERVER_NAME} :{token}\r\n").as_bytes())
                .await?;
        }
        "PONG" => {}
        "AWAY" => {
            let away = !params.first().map(String::as_str).unwrap_or_default().is_empty();
            let (code, text) = if away {
                (306, "You have been marked as being away")
            } else {
                (305, "You are no longer marked as being away")
            };
            write_half
                .write_all(numeric(code, &session.name, &format!(":{text}")).as_bytes())
                .await?;
        }
        "WHO" => handle_who(state, session, write_half, params.first()).await?,
        "WHOIS" => handle_whois(state, session, write_half, params.first()).await?,
        "MODE" => {
            if let Some(target) = params.first() {
                write_half
                    .write_all(numeric(324, &session.name, &format!("{target} +")).as_bytes())
                    .await?;
            }
        }
        "QUIT" => return Ok(false),
        other => {
            write_half
                .write_all(numeric(421, &session.name, &format!("{other} :Unknown command")).as_bytes())
                .await?;
        }
    }
    Ok(true)
}

async fn handle_join(
    state: &GatewayState,
    session: &Arc<Session>,
    write_half: &mut OwnedWriteHalf,
    name: &str,
) -> std::io::Result<()> {
    let channel_name = ChannelName::new(name);
    let channel = match state.chat.get(&channel_name).await {
        Some(channel) => channel,
        None => {
            state
                .chat
                .register(Channel::new(channel_name, "", -1, -1, true, session.name.clone()))
                .await
        }
    };
    if state.chat.join(&channel, session).await.is_err() {
        write_half
            .write_all(numeric(471, &session.name, &format!("{name} :Cannot join channel")).as_bytes())
            .await?;
        return Ok(());
    }

    write_half
        .write_all(format!(":{0}!{0}@{SERVER_NAME} JOIN {name}\r\n", session.name).as_bytes())
        .await?;

    let topic = channel.topic.read().await.clone();
    if topic.is_empty() {
        write_half
            .write_all(numeric(331, &session.name, &format!("{name} :No topic is set")).as_bytes())
            .await?;
    } else {
        write_half
            .write_all(numeric(332, &session.name, &format!("{name} :{topic}")).as_bytes())
            .await?;
    }

    let mut names = Vec::new();
    for member_id in channel.members.read().await.clone() {
        if let Some(member) = state.sessions.by_id(member_id).await {
            names.push(member.name.clone());
        }
    }
    write_half
        .write_all(numeric(353, &session.name, &format!("= {name} :{}", names.join(" "))).as_bytes())
        .await?;
    write_half
        .write_all(numeric(366, &session.name, &format!("{name} :End of /NAMES list.")).as_bytes())
        .await?;
    Ok(())
}

async fn handle_part(state: &GatewayState, session: &Arc<Session>, name: &str) {
    if let Some(channel) = state.chat.get(&ChannelName::new(name)).await {
        state.chat.part(&channel, session).await;
    }
}

async fn handle_topic(
    state: &GatewayState,
    session: &Arc<Session>,
    write_half: &mut OwnedWriteHalf,
    name: &str,
    new_topic: Option<&String>,
) -> std::io::Result<()> {
    let Some(channel) = state.chat.get(&ChannelName::new(name)).await else {
        write_half
            .write_all(numeric(403, &session.name, &format!("{name} :No such channel")).as_bytes())
            .await?;
        return Ok(());
    };
    if let Some(text) = new_topic {
        *channel.topic.write().await = text.clone();
        write_half
            .write_all(format!(":{0}!{0}@{SERVER_NAME} TOPIC {name} :{text}\r\n", session.name).as_bytes())
            .await?;
    } else {
        let topic = channel.topic.read().await.clone();
        if topic.is_empty() {
            write_half
                .write_all(numeric(331, &session.name, &format!("{name} :No topic is set")).as_bytes())
                .await?;
        } else {
            write_half
                .write_all(numeric(332, &session.name, &format!("{name} :{topic}")).as_bytes())
                .await?;
        }
    }
    Ok(())
}

async fn handle_privmsg(state: &GatewayState, session: &Arc<Session>, target: &str, text: &str) {
    if target.starts_with('#') {
        if let Some(channel) = state.chat.get(&ChannelName::new(target)).await {
            let _ = state.chat.send(&channel, session, text, false).await;
        }
    } else {
        let _ = state.chat.private_message(session, target, text).await;
    }
}

async fn handle_who(
    state: &GatewayState,
    session: &Arc<Session>,
    write_half: &mut OwnedWriteHalf,
    mask: Option<&String>,
) -> std::io::Result<()> {
    if let Some(name) = mask {
        if let Some(channel) = state.chat.get(&ChannelName::new(name)).await {
            for member_id in channel.members.read().await.clone() {
                let Some(member) = state.sessions.by_id(member_id).await else { continue };
                write_half
                    .write_all(
                        numeric(
                            352,
                            &session.name,
                            &format!("{name} {0} {SERVER_NAME} {SERVER_NAME} {0} H :0 {0}", member.name),
                        )
                        .as_bytes(),
                    )
                    .await?;
            }
        }
    }
    let target = mask.cloned().unwrap_or_default();
    write_half
        .write_all(numeric(315, &session.name, &format!("{target} :End of /WHO list.")).as_bytes())
        .await?;
    Ok(())
}

async fn handle_whois(
    state: &GatewayState,
    session: &Arc<Session>,
    write_half: &mut OwnedWriteHalf,
    nick: Option<&String>,
) -> std::io::Result<()> {
    let Some(nick) = nick else { return Ok(()) };
    if state.sessions.by_name(nick).await.is_none() {
        write_half
            .write_all(numeric(401, &session.name, &format!("{nick} :No such nick")).as_bytes())
            .await?;
        return Ok(());
    }
    write_half
        .write_all(numeric(311, &session.name, &format!("{nick} {nick} {SERVER_NAME} * :{nick}")).as_bytes())
        .await?;
    write_half
        .write_all(numeric(318, &session.name, &format!("{nick} :End of /WHOIS list.")).as_bytes())
        .await?;
    Ok(())
}

async fn send_welcome(write_half: &mut OwnedWriteHalf, nick: &str) -> std::io::Result<()> {
    write_half
        .write_all(numeric(1, nick, &format!(":Welcome to the bancho IRC gateway, {nick}")).as_bytes())
        .await?;
    write_half
        .write_all(numeric(2, nick, &format!(":Your host is {SERVER_NAME}")).as_bytes())
        .await?;
    write_half
        .write_all(numeric(3, nick, ":This server was started recently").as_bytes())
        .await?;
    write_half
        .write_all(numeric(4, nick, &format!("{SERVER_NAME} 1.0 o o")).as_bytes())
        .await?;
    write_half
        .write_all(numeric(375, nick, ":- bancho Message of the day -").as_bytes())
        .await?;
    write_half
        .write_all(numeric(376, nick, ":End of /MOTD command.").as_bytes())
        .await?;
    Ok(())
}

/// Unwraps every frame accumulated on the session's outbound queue
/// and writes its raw payload to the socket, discarding the binary
/// framing header — see `wire::irc_encoders` for why that header is
/// always there even though the payload itself is a plain IRC line.
async fn flush_outbound(session: &Arc<Session>, write_half: &mut OwnedWriteHalf) -> std::io::Result<bool> {
    let outbound = session.drain_outbound().await;
    let mut offset = 0;
    while offset < outbound.len() {
        match try_parse_frame(&outbound[offset..]) {
            Ok(Some((consumed, frame))) => {
                offset += consumed;
                if write_half.write_all(&frame.payload).await.is_err() {
                    return Ok(false);
                }
            }
            _ => break,
        }
    }
    Ok(true)
}

/// Removes the session from the registry and parts it from every
/// channel it joined. `concerto_core::disconnect` isn't reused here
/// since it also tears down spectator and multiplayer state this
/// gateway never builds — IRC sessions never spectate or join a
/// match.
async fn teardown(state: &GatewayState, session: &Arc<Session>) {
    state.sessions.remove(session.id).await;
    for channel_name in session.channels.read().await.clone() {
        if let Some(channel) = state.chat.get(&channel_name).await {
            state.chat.part(&channel, session).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_line;

    #[test]
    fn parses_command_with_trailing_colon_param() {
        let (command, params) = parse_line("PRIVMSG #osu :hello there friend");
        assert_eq!(command, "PRIVMSG");
        assert_eq!(params, vec!["#osu".to_owned(), "hello there friend".to_owned()]);
    }

    #[test]
    fn parses_command_with_no_params() {
        let (command, params) = parse_line("LUSERS");
        assert_eq!(command, "LUSERS");
        assert!(params.is_empty());
    }

    #[test]
    fn uppercases_the_command_word() {
        let (command, _) = parse_line("join #osu");
        assert_eq!(command, "JOIN");
    }
}
