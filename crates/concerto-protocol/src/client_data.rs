//! Parsing for the `client_data` field of the login handshake.
//!
//! The wire shape is `|`-delimited: `version_string | utc_offset |
//! display_city | adapters_hash_info | screen_hash | flags`, where
//! `adapters_hash_info` is itself `:`-delimited:
//! `adapters_md5:adapter_list_csv:mac_md5:uninstall_md5:disk_md5`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClientDataError {
    #[error("client_data has fewer than 5 pipe-delimited fields")]
    TooFewFields,
    #[error("adapters_hash_info has fewer than 5 colon-delimited fields")]
    MalformedAdapterInfo,
    #[error("version string is not of the form 'bNNNNNNNN'")]
    MalformedVersionString,
    #[error("utc_offset is not a valid integer")]
    MalformedUtcOffset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdaptersHashInfo {
    pub adapters_md5: String,
    pub adapter_list_csv: String,
    pub mac_md5: String,
    pub uninstall_md5: String,
    pub disk_md5: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientData {
    pub version_date: i64,
    pub utc_offset: i32,
    pub display_city: bool,
    pub adapters: AdaptersHashInfo,
    pub screen_hash: String,
    pub flags: String,
}

/// Parses a `bNNNNNNNN` (or `bNNN`) version string into its numeric
/// date, e.g. `"b20120812"` → `20_120_812`, `"b335"` → `335`.
pub fn parse_version_date(version_string: &str) -> Result<i64, ClientDataError> {
    version_string
        .strip_prefix('b')
        .and_then(|digits| digits.parse::<i64>().ok())
        .ok_or(ClientDataError::MalformedVersionString)
}

fn parse_adapters_hash_info(field: &str) -> Result<AdaptersHashInfo, ClientDataError> {
    let mut parts = field.splitn(5, ':');
    let adapters_md5 = parts.next().ok_or(ClientDataError::MalformedAdapterInfo)?;
    let adapter_list_csv = parts.next().ok_or(ClientDataError::MalformedAdapterInfo)?;
    let mac_md5 = parts.next().ok_or(ClientDataError::MalformedAdapterInfo)?;
    let uninstall_md5 = parts.next().ok_or(ClientDataError::MalformedAdapterInfo)?;
    let disk_md5 = parts.next().ok_or(ClientDataError::MalformedAdapterInfo)?;
    Ok(AdaptersHashInfo {
        adapters_md5: adapters_md5.to_owned(),
        adapter_list_csv: adapter_list_csv.to_owned(),
        mac_md5: mac_md5.to_owned(),
        uninstall_md5: uninstall_md5.to_owned(),
        disk_md5: disk_md5.to_owned(),
    })
}

pub fn parse_client_data(raw: &str) -> Result<ClientData, ClientDataError> {
    let mut fields = raw.splitn(6, '|');
    let version_string = fields.next().ok_or(ClientDataError::TooFewFields)?;
    let utc_offset_field = fields.next().ok_or(ClientDataError::TooFewFields)?;
    let display_city_field = fields.next().ok_or(ClientDataError::TooFewFields)?;
    let adapters_field = fields.next().ok_or(ClientDataError::TooFewFields)?;
    let screen_hash = fields.next().ok_or(ClientDataError::TooFewFields)?;
    let flags = fields.next().unwrap_or("");

    let version_date = parse_version_date(version_string)?;
    let utc_offset = utc_offset_field
        .parse::<i32>()
        .map_err(|_| ClientDataError::MalformedUtcOffset)?;
    let display_city = display_city_field == "1";
    let adapters = parse_adapters_hash_info(adapters_field)?;

    Ok(ClientData {
        version_date,
        utc_offset,
        display_city,
        adapters,
        screen_hash: screen_hash.to_owned(),
        flags: flags.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modern_version_string() {
        assert_eq!(parse_version_date("b20120812").unwrap(), 20_120_812);
    }

    #[test]
    fn parses_short_version_string() {
        assert_eq!(parse_version_date("b335").unwrap(), 335);
    }

    #[test]
    fn rejects_version_string_without_leading_b() {
        assert_eq!(
            parse_version_date("20120812"),
            Err(ClientDataError::MalformedVersionString)
        );
    }

    #[test]
    fn parses_full_client_data_line() {
        let raw = "b20120812|24|1|aabbcc:eth0,wlan0:ddeeff:00112233:44556677|deadbeef|runningunderwine=0";
        let parsed = parse_client_data(raw).unwrap();
        assert_eq!(parsed.version_date, 20_120_812);
        assert_eq!(parsed.utc_offset, 24);
        assert!(parsed.display_city);
        assert_eq!(parsed.adapters.adapters_md5, "aabbcc");
        assert_eq!(parsed.adapters.adapter_list_csv, "eth0,wlan0");
        assert_eq!(parsed.adapters.mac_md5, "ddeeff");
        assert_eq!(parsed.adapters.uninstall_md5, "00112233");
        assert_eq!(parsed.adapters.disk_md5, "44556677");
        assert_eq!(parsed.screen_hash, "deadbeef");
        assert_eq!(parsed.flags, "runningunderwine=0");
    }

    #[test]
    fn missing_flags_field_defaults_to_empty() {
        let raw = "b335|0|0|a:b:c:d:e|hash";
        let parsed = parse_client_data(raw).unwrap();
        assert_eq!(parsed.flags, "");
    }

    #[test]
    fn too_few_fields_is_an_error() {
        assert_eq!(
            parse_client_data("b335|0|0"),
            Err(ClientDataError::TooFewFields)
        );
    }

    #[test]
    fn malformed_adapter_info_is_an_error() {
        let raw = "b335|0|0|only:three:parts|hash";
        assert_eq!(
            parse_client_data(raw),
            Err(ClientDataError::MalformedAdapterInfo)
        );
    }
}
