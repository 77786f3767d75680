//! Connection string handling for the info probe.
//!
//! libpq accepts either a `postgres://` URL or a `key=value` list; both are
//! understood here so the password can be kept out of every report.

use std::collections::BTreeMap;
use std::ffi::OsString;
use thiserror::Error;
use url::Url;

pub const MASK: &str = "***";
const DEFAULT_PORT: &str = "5432";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DsnError {
    #[error("Malformed connection URL: {0}")]
    MalformedUrl(String),
    #[error("Malformed connection parameter: {0}")]
    MalformedParameter(String),
    #[error("Unterminated quoted value for parameter: {0}")]
    UnterminatedQuote(String),
}

fn is_url(dsn: &str) -> bool {
    dsn.starts_with("postgres://") || dsn.starts_with("postgresql://")
}

/// Connection parameters named by `dsn`, without the password.
///
/// The port defaults to 5432 when not given, the way libpq resolves it.
pub fn connection_parameters(dsn: &str) -> Result<BTreeMap<String, String>, DsnError> {
    let mut params = if is_url(dsn) {
        url_parameters(dsn)?
    } else {
        keyword_parameters(dsn)?
    };

    params.remove("password");
    params
        .entry("port".to_string())
        .or_insert_with(|| DEFAULT_PORT.to_string());
    Ok(params)
}

/// `dsn` with its password replaced by [`MASK`].
pub fn mask_password(dsn: &str) -> Result<String, DsnError> {
    if is_url(dsn) {
        let mut url = Url::parse(dsn).map_err(|e| DsnError::MalformedUrl(e.to_string()))?;
        if url.password().is_some() {
            url.set_password(Some(MASK))
                .map_err(|_| DsnError::MalformedUrl(dsn.to_string()))?;
        }
        return Ok(url.to_string());
    }

    let masked = tokenize(dsn)?
        .into_iter()
        .map(|(key, value)| {
            if key == "password" {
                format!("{key}={MASK}")
            } else {
                format!("{key}={}", quote(&value))
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    Ok(masked)
}

/// Render parameters as a libpq keyword string.
pub fn render_parameters(params: &BTreeMap<String, String>) -> String {
    // libpq lists these first; everything else follows alphabetically
    const LEADING: [&str; 4] = ["user", "dbname", "host", "port"];

    let leading = LEADING
        .iter()
        .filter_map(|key| params.get(*key).map(|value| (*key, value)));
    let rest = params
        .iter()
        .filter(|(key, _)| !LEADING.contains(&key.as_str()))
        .map(|(key, value)| (key.as_str(), value));

    leading
        .chain(rest)
        .map(|(key, value)| format!("{key}={}", quote(value)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `PG*` variables from `vars`, with `PGPASSWORD` masked.
///
/// Entries that are not valid Unicode are skipped.
pub fn pg_environment<I>(vars: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| {
            let key = key.into_string().ok()?;
            if !key.starts_with("PG") {
                return None;
            }
            if key == "PGPASSWORD" {
                return Some((key, MASK.to_string()));
            }
            Some((key, value.into_string().ok()?))
        })
        .collect()
}

fn url_parameters(dsn: &str) -> Result<BTreeMap<String, String>, DsnError> {
    let url = Url::parse(dsn).map_err(|e| DsnError::MalformedUrl(e.to_string()))?;

    let mut params = BTreeMap::new();
    if !url.username().is_empty() {
        params.insert("user".to_string(), url.username().to_string());
    }
    if let Some(host) = url.host_str().filter(|h| !h.is_empty()) {
        params.insert("host".to_string(), host.to_string());
    }
    if let Some(port) = url.port() {
        params.insert("port".to_string(), port.to_string());
    }
    let dbname = url.path().trim_start_matches('/');
    if !dbname.is_empty() {
        params.insert("dbname".to_string(), dbname.to_string());
    }
    for (key, value) in url.query_pairs() {
        params.insert(key.into_owned(), value.into_owned());
    }
    Ok(params)
}

fn keyword_parameters(dsn: &str) -> Result<BTreeMap<String, String>, DsnError> {
    Ok(tokenize(dsn)?.into_iter().collect())
}

/// Split a libpq keyword string into pairs, honoring single quotes and
/// backslash escapes inside values.
fn tokenize(dsn: &str) -> Result<Vec<(String, String)>, DsnError> {
    let mut pairs = Vec::new();
    let mut chars = dsn.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && !c.is_whitespace()) {
            key.push(c);
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.next() != Some('=') || key.is_empty() {
            return Err(DsnError::MalformedParameter(key));
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'\'').is_some() {
            loop {
                match chars.next() {
                    Some('\\') => match chars.next() {
                        Some(escaped) => value.push(escaped),
                        None => return Err(DsnError::UnterminatedQuote(key)),
                    },
                    Some('\'') => break,
                    Some(c) => value.push(c),
                    None => return Err(DsnError::UnterminatedQuote(key)),
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        value.push(escaped);
                    }
                } else {
                    value.push(c);
                }
            }
        }

        pairs.push((key, value));
    }

    Ok(pairs)
}

fn quote(value: &str) -> String {
    if !value.is_empty() && !value.contains(|c: char| c.is_whitespace() || c == '\'' || c == '\\')
    {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}
