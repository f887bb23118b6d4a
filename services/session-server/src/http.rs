//! HTTP long-poll transport: `POST /` without an `osu-token` header
//! carries the login handshake; with the header it carries a batch of
//! framed request packets for an already-authenticated session.
//! `GET /` serves a fixed landing page.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use concerto_core::{LoginOutcome, LoginRequest, Transport};
use concerto_protocol::{encode_frame, try_parse_frame, Reader, RequestId, ResponseId, Writer};

use crate::auth::parse_login_lines;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(landing_page).post(handle_post))
        .with_state(state)
}

async fn landing_page() -> impl IntoResponse {
    Html(LANDING_PAGE_HTML)
}

async fn handle_post(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    match headers.get("osu-token").and_then(|v| v.to_str().ok()) {
        Some(token) => handle_resumed_session(&state, token, &body).await,
        None => handle_login(&state, &body).await,
    }
}

async fn handle_login(state: &AppState, body: &[u8]) -> Response {
    let raw = String::from_utf8_lossy(body);
    let Some(lines) = parse_login_lines(&raw) else {
        return (StatusCode::BAD_REQUEST, "malformed login body").into_response();
    };

    let outcome = state
        .authenticator()
        .login(LoginRequest {
            username: lines.username,
            password_md5: lines.password_md5,
            client_data_raw: lines.client_data,
            transport: Transport::Http,
            remote_addr: String::new(),
        })
        .await;

    match outcome {
        LoginOutcome::Success(session) => {
            let token = session.token.read().await.as_str().to_owned();
            let outbound = session.drain_outbound().await;
            let mut response = bancho_headers(Response::new(outbound.into()));
            response.headers_mut().insert(
                HeaderName::from_static("cho-token"),
                HeaderValue::from_str(&token).unwrap_or_else(|_| HeaderValue::from_static("")),
            );
            response
        }
        LoginOutcome::Raw(bytes) => bancho_headers(Response::new(bytes.into())),
        LoginOutcome::Failure(failure) => {
            let mut writer = Writer::new();
            writer.write_i32(failure.code());
            let framed = encode_frame(ResponseId::LoginReply.as_u16(), &writer.into_bytes(), false);
            bancho_headers(Response::new(framed.into()))
        }
    }
}

async fn handle_resumed_session(state: &AppState, token: &str, body: &[u8]) -> Response {
    let Some(session) = state.sessions.by_token(token).await else {
        return (StatusCode::FORBIDDEN, "unknown or expired token").into_response();
    };
    session.touch().await;

    let mut offset = 0;
    while let Ok(Some((consumed, frame))) = try_parse_frame(&body[offset..]) {
        offset += consumed;
        let Some(request_id) = RequestId::from_u16(frame.packet_id) else {
            continue;
        };
        let Some(decoders) = state.decoders.resolve(session.protocol_version) else {
            continue;
        };
        let Some(decode) = decoders.get(&frame.packet_id) else {
            continue;
        };
        let mut reader = Reader::new(&frame.payload);
        if let Ok(payload) = decode(&mut reader) {
            state.dispatcher.dispatch(&session, request_id, payload).await;
        }
    }

    let outbound = session.drain_outbound().await;
    bancho_headers(Response::new(outbound.into()))
}

fn bancho_headers(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(HeaderName::from_static("server"), HeaderValue::from_static("bancho"));
    response
        .headers_mut()
        .insert(HeaderName::from_static("cho-protocol"), HeaderValue::from_static("18"));
    response
}

const LANDING_PAGE_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>bancho</title></head>
<body><p>this is a bancho server.</p></body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landing_page_html_is_well_formed() {
        assert!(LANDING_PAGE_HTML.starts_with("<!DOCTYPE html>"));
    }
}
