//! Parsing for the 3-line LF-delimited login handshake shared by the
//! TCP and HTTP transports.

pub struct LoginLines {
    pub username: String,
    pub password_md5: String,
    pub client_data: String,
}

/// Splits a handshake body into its three lines. The body may or may
/// not carry a trailing newline after the third line.
pub fn parse_login_lines(body: &str) -> Option<LoginLines> {
    let mut lines = body.splitn(3, '\n');
    let username = lines.next()?.trim_end_matches('\r').to_owned();
    let password_md5 = lines.next()?.trim_end_matches('\r').to_owned();
    let client_data = lines
        .next()?
        .trim_end_matches('\r')
        .trim_end_matches('\n')
        .to_owned();
    Some(LoginLines {
        username,
        password_md5,
        client_data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_three_lf_delimited_lines() {
        let parsed = parse_login_lines("alice\nabc123\nb20120812|0|0|a:b:c:d:e|hash\n").unwrap();
        assert_eq!(parsed.username, "alice");
        assert_eq!(parsed.password_md5, "abc123");
        assert_eq!(parsed.client_data, "b20120812|0|0|a:b:c:d:e|hash");
    }

    #[test]
    fn tolerates_missing_trailing_newline() {
        let parsed = parse_login_lines("alice\nabc123\nb335|0|0|a:b:c:d:e|hash").unwrap();
        assert_eq!(parsed.client_data, "b335|0|0|a:b:c:d:e|hash");
    }

    #[test]
    fn too_few_lines_is_none() {
        assert!(parse_login_lines("alice\nabc123").is_none());
    }
}
