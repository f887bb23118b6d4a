//! IRC line formatting and the custom outbound encoder that lets an
//! IRC session reuse the binary-protocol session's outbound queue as a
//! plain mailbox.

use std::collections::HashMap;

use concerto_protocol::{EncodeFn, ResponseId, ResponsePayload, Writer};

pub const SERVER_NAME: &str = "bancho";

pub fn numeric(code: u16, nick: &str, rest: &str) -> String {
    format!(":{SERVER_NAME} {code:03} {nick} {rest}\r\n")
}

pub fn privmsg_line(sender: &str, target: &str, text: &str) -> String {
    format!(":{sender}!{sender}@{SERVER_NAME} PRIVMSG {target} :{text}\r\n")
}

/// Every recipient-side chat delivery (channel message or private
/// message) arrives through `ChatRouter` as a `SendMessage` response.
/// This is the only packet id an IRC session's outbound queue needs an
/// encoder for; everything else `enqueue`s to a missing entry and is a
/// silent no-op, which is correct here since the IRC command handler
/// writes its own protocol replies directly instead of going through
/// the queue.
pub fn irc_encoders() -> HashMap<u16, EncodeFn> {
    let mut map = HashMap::new();
    map.insert(ResponseId::SendMessage.as_u16(), encode_send_message as EncodeFn);
    map
}

fn encode_send_message(writer: &mut Writer, payload: &ResponsePayload) {
    if let ResponsePayload::ChatMessage(wire) = payload {
        let line = privmsg_line(&wire.sender_name, &wire.target, &wire.content);
        writer.write_bytes(line.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concerto_protocol::ChatMessageWire;

    #[test]
    fn encode_send_message_writes_a_raw_privmsg_line() {
        let mut writer = Writer::new();
        encode_send_message(
            &mut writer,
            &ResponsePayload::ChatMessage(ChatMessageWire {
                sender_name: "peppy".to_owned(),
                content: "hello".to_owned(),
                target: "#osu".to_owned(),
                sender_id: 2,
            }),
        );
        let line = String::from_utf8(writer.into_bytes()).unwrap();
        assert_eq!(line, ":peppy!peppy@bancho PRIVMSG #osu :hello\r\n");
    }

    #[test]
    fn encode_send_message_ignores_other_payload_kinds() {
        let mut writer = Writer::new();
        encode_send_message(&mut writer, &ResponsePayload::Empty);
        assert!(writer.into_bytes().is_empty());
    }
}
