//! SharedKeyLite request signing for the table service.

use crate::error::{TableError, TableResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// `x-ms-date` header value (RFC 1123).
pub(crate) fn request_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// `/{account}{path}`, plus `?comp=` when the request has that parameter.
pub(crate) fn canonicalized_resource(account_name: &str, url: &Url) -> String {
    let mut resource = format!("/{}{}", account_name, url.path());
    if let Some((_, comp)) = url.query_pairs().find(|(k, _)| k == "comp") {
        resource.push_str("?comp=");
        resource.push_str(&comp);
    }
    resource
}

/// Builds the `Authorization` header value for the table service.
pub(crate) fn shared_key_lite(
    account_name: &str,
    key: &[u8],
    date: &str,
    url: &Url,
) -> TableResult<String> {
    let string_to_sign = format!("{}\n{}", date, canonicalized_resource(account_name, url));
    sign(account_name, key, &string_to_sign)
}

/// Builds the `Authorization` header value for the queue service, which also
/// signs the verb, the content type and every `x-ms-` header.
///
/// The date line stays empty; the service reads `x-ms-date` from the signed
/// headers instead.
pub(crate) fn shared_key_lite_queue(
    account_name: &str,
    key: &[u8],
    method: &str,
    content_type: &str,
    ms_headers: &[(&str, &str)],
    url: &Url,
) -> TableResult<String> {
    let mut headers: Vec<(String, &str)> = ms_headers
        .iter()
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim()))
        .collect();
    headers.sort();
    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();

    let string_to_sign = format!(
        "{method}\n\n{content_type}\n\n{canonical_headers}{}",
        canonicalized_resource(account_name, url)
    );
    sign(account_name, key, &string_to_sign)
}

fn sign(account_name: &str, key: &[u8], string_to_sign: &str) -> TableResult<String> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| TableError::Config(format!("unusable account key: {e}")))?;
    mac.update(string_to_sign.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());
    Ok(format!("SharedKeyLite {account_name}:{signature}"))
}
