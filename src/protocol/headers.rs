//! Header names and header value helpers.
//!
//! | Header | Sent | Example |
//! |--------|------|---------|
//! | `X-Request-ID` | every attempt | `req_1760790000000_k3j9x0a1b` |
//! | `API-Version` | every attempt | `v1` |
//! | `X-Requested-With` | default header | `XMLHttpRequest` |
//! | `Authorization` | unless `skip_auth` | `Bearer eyJ...` |
//!
//! # Examples
//!
//! ```
//! use studio_http::protocol::headers::{bearer, parse_content_disposition_filename};
//!
//! assert_eq!(bearer("abc"), "Bearer abc");
//! assert_eq!(
//!     parse_content_disposition_filename(r#"attachment; filename="take-1.mp3""#),
//!     Some("take-1.mp3".to_string())
//! );
//! ```

use http::HeaderName;

/// Per-attempt request identifier.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Backend API version.
pub const API_VERSION: HeaderName = HeaderName::from_static("api-version");

/// Legacy HTTP/1.0 cache directive.
pub const PRAGMA: HeaderName = HeaderName::from_static("pragma");

/// Headers every client sends unless overridden per request.
pub const DEFAULT_HEADERS: [(&str, &str); 3] = [
    ("content-type", "application/json"),
    ("accept", "application/json"),
    ("x-requested-with", "XMLHttpRequest"),
];

/// Format an `Authorization` value for a bearer token.
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Extract the file name from a `Content-Disposition` value.
///
/// Handles `filename="quoted"`, `filename=bare` and the RFC 5987
/// `filename*=UTF-8''encoded` form, preferring the latter when both are
/// present. Percent-escapes in the extended form are decoded.
pub fn parse_content_disposition_filename(value: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for part in value.split(';').map(str::trim) {
        let Some((key, raw)) = part.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename" => {
                let name = raw.trim().trim_matches('"');
                if !name.is_empty() {
                    plain = Some(name.to_string());
                }
            }
            "filename*" => {
                let encoded = raw.trim();
                let encoded = encoded
                    .split_once("''")
                    .map_or(encoded, |(_, rest)| rest);
                let decoded = percent_decode(encoded);
                if !decoded.is_empty() {
                    extended = Some(decoded);
                }
            }
            _ => {}
        }
    }

    extended.or(plain)
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_names_are_lowercase() {
        assert_eq!(X_REQUEST_ID.as_str(), "x-request-id");
        assert_eq!(API_VERSION.as_str(), "api-version");
    }

    #[test]
    fn test_content_disposition_variants() {
        assert_eq!(
            parse_content_disposition_filename("attachment; filename=report.pdf"),
            Some("report.pdf".to_string())
        );
        assert_eq!(
            parse_content_disposition_filename(
                "attachment; filename=\"fallback.txt\"; filename*=UTF-8''na%C3%AFve%20draft.txt"
            ),
            Some("naïve draft.txt".to_string())
        );
        assert_eq!(parse_content_disposition_filename("inline"), None);
        assert_eq!(parse_content_disposition_filename("attachment; filename=\"\""), None);
    }

    #[test]
    fn test_percent_decode_keeps_invalid_escapes() {
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("a%zzb"), "a%zzb");
    }
}
