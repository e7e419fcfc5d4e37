//! Sign-in challenge message: rendering and strict parsing.
//!
//! Layout (every line ends in `\n`):
//!
//! ```text
//! {domain} wants you to sign in with your Ethereum account:
//! {address}
//!
//! {statement}            <- optional, followed by a blank line
//!
//! URI: {uri}
//! Version: {version}
//! Chain ID: {chain_id}
//! Nonce: {nonce}
//! Issued At: {issued_at}
//! Expiration Time: {expiration_time}   <- optional
//! ```
//!
//! The signature covers these exact bytes, so the server always verifies the
//! text it received and never a re-rendering of it.

use crate::auth::address::Address;
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

const HEADER_SUFFIX: &str = " wants you to sign in with your Ethereum account:";

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+) wants you to sign in with your Ethereum account:$").expect("valid regex")
});
static ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("valid regex"));
static FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(URI|Version|Chain ID|Nonce|Issued At|Expiration Time): (.*)$")
        .expect("valid regex")
});
static URI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:\S+$").expect("valid regex"));
static DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("valid regex"));
static NONCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{8,}$").expect("valid regex"));

/// Structured contents of a challenge message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeMessage {
    pub domain: String,
    pub address: Address,
    pub statement: Option<String>,
    pub uri: String,
    pub version: String,
    pub chain_id: u64,
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
    pub expiration_time: Option<DateTime<Utc>>,
}

/// A required field is missing or malformed. Carries the field name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Malformed challenge: {0}")]
pub struct ChallengeError(pub &'static str);

impl ChallengeMessage {
    /// Render the canonical message text.
    pub fn build(&self) -> String {
        self.to_string()
    }

    /// Parse message text produced by [`ChallengeMessage::build`].
    ///
    /// The header and address must be the first two lines. Labelled fields may
    /// appear in any order but each must start its own line, appear once, and
    /// nothing unlabelled may follow the statement paragraph.
    pub fn parse(text: &str) -> Result<Self, ChallengeError> {
        let mut lines = text.split('\n');

        let header = lines.next().ok_or(ChallengeError("domain"))?;
        let domain = HEADER_RE
            .captures(header)
            .map(|c| c[1].to_string())
            .ok_or(ChallengeError("domain"))?;

        let address_line = lines.next().ok_or(ChallengeError("address"))?;
        if !ADDRESS_RE.is_match(address_line) {
            return Err(ChallengeError("address"));
        }
        let address: Address = address_line
            .parse()
            .map_err(|_| ChallengeError("address"))?;

        if lines.next() != Some("") {
            return Err(ChallengeError("address"));
        }

        let mut rest: Vec<&str> = lines.collect();
        // Trailing newline of the last field.
        if rest.last() == Some(&"") {
            rest.pop();
        }

        let mut statement = None;
        let mut fields = rest.as_slice();
        if let Some(first) = fields.first() {
            if !FIELD_RE.is_match(first) {
                if first.is_empty() || fields.get(1) != Some(&"") {
                    return Err(ChallengeError("statement"));
                }
                statement = Some(first.to_string());
                fields = &fields[2..];
            }
        }

        let mut uri = None;
        let mut version = None;
        let mut chain_id = None;
        let mut nonce = None;
        let mut issued_at = None;
        let mut expiration_time = None;

        for line in fields {
            let caps = FIELD_RE.captures(line).ok_or(ChallengeError("fields"))?;
            let value = caps.get(2).map_or("", |m| m.as_str());
            match &caps[1] {
                "URI" => {
                    if !URI_RE.is_match(value) {
                        return Err(ChallengeError("uri"));
                    }
                    set_once(&mut uri, value.to_string(), "uri")?;
                }
                "Version" => {
                    if !DECIMAL_RE.is_match(value) {
                        return Err(ChallengeError("version"));
                    }
                    set_once(&mut version, value.to_string(), "version")?;
                }
                "Chain ID" => {
                    if !DECIMAL_RE.is_match(value) {
                        return Err(ChallengeError("chain_id"));
                    }
                    let parsed = value.parse().map_err(|_| ChallengeError("chain_id"))?;
                    set_once(&mut chain_id, parsed, "chain_id")?;
                }
                "Nonce" => {
                    if !NONCE_RE.is_match(value) {
                        return Err(ChallengeError("nonce"));
                    }
                    set_once(&mut nonce, value.to_string(), "nonce")?;
                }
                "Issued At" => {
                    set_once(&mut issued_at, parse_timestamp(value, "issued_at")?, "issued_at")?;
                }
                "Expiration Time" => {
                    set_once(
                        &mut expiration_time,
                        parse_timestamp(value, "expiration_time")?,
                        "expiration_time",
                    )?;
                }
                _ => return Err(ChallengeError("fields")),
            }
        }

        Ok(ChallengeMessage {
            domain,
            address,
            statement,
            uri: uri.ok_or(ChallengeError("uri"))?,
            version: version.ok_or(ChallengeError("version"))?,
            chain_id: chain_id.ok_or(ChallengeError("chain_id"))?,
            nonce: nonce.ok_or(ChallengeError("nonce"))?,
            issued_at: issued_at.ok_or(ChallengeError("issued_at"))?,
            expiration_time,
        })
    }
}

impl fmt::Display for ChallengeMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}{}", self.domain, HEADER_SUFFIX)?;
        writeln!(f, "{}", self.address.to_checksum())?;
        writeln!(f)?;
        if let Some(statement) = &self.statement {
            writeln!(f, "{}", statement)?;
            writeln!(f)?;
        }
        writeln!(f, "URI: {}", self.uri)?;
        writeln!(f, "Version: {}", self.version)?;
        writeln!(f, "Chain ID: {}", self.chain_id)?;
        writeln!(f, "Nonce: {}", self.nonce)?;
        writeln!(f, "Issued At: {}", format_timestamp(&self.issued_at))?;
        if let Some(expiration_time) = &self.expiration_time {
            writeln!(f, "Expiration Time: {}", format_timestamp(expiration_time))?;
        }
        Ok(())
    }
}

/// Whether `statement` survives a build/parse round trip: one non-blank line
/// that does not read as a labelled field.
pub fn is_valid_statement(statement: &str) -> bool {
    !statement.trim().is_empty()
        && !statement.contains(['\n', '\r'])
        && !FIELD_RE.is_match(statement)
}

fn set_once<T>(slot: &mut Option<T>, value: T, field: &'static str) -> Result<(), ChallengeError> {
    if slot.is_some() {
        return Err(ChallengeError(field));
    }
    *slot = Some(value);
    Ok(())
}

fn parse_timestamp(value: &str, field: &'static str) -> Result<DateTime<Utc>, ChallengeError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ChallengeError(field))
}

fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
