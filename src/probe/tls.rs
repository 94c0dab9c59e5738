use chrono::{DateTime, Utc};
use x509_parser::prelude::*;

use crate::check::SslInfo;

const SECONDS_PER_DAY: i64 = 86_400;

/// Extract validity and naming from a DER-encoded certificate
///
/// Returns `None` for anything that does not parse; a missing or unreadable
/// certificate only means the outcome carries no SSL info.
pub fn parse_certificate(der: &[u8], now: DateTime<Utc>) -> Option<SslInfo> {
    let (_, cert) = X509Certificate::from_der(der).ok()?;
    let validity = cert.validity();
    let valid_from = DateTime::from_timestamp(validity.not_before.timestamp(), 0)?;
    let valid_to = DateTime::from_timestamp(validity.not_after.timestamp(), 0)?;

    Some(SslInfo {
        valid_from,
        valid_to,
        issuer: cert.issuer().to_string(),
        subject: cert.subject().to_string(),
        days_remaining: days_remaining(valid_to, now),
    })
}

/// floor((valid_to - now) / 1 day)
pub fn days_remaining(valid_to: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (valid_to - now).num_seconds().div_euclid(SECONDS_PER_DAY)
}
