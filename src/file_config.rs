//! Loading client settings from INI files.
//!
//! Settings live in a `[tsdb]` section:
//!
//! ```ini
//! [tsdb]
//! hosts = tsd1:4242, tsd2:4242
//! trust_window_secs = 60
//! wait_retry = false
//! exhaustion = shuffle
//! ```
//!
//! Every key is optional except `hosts`. The result is a
//! [`SocketClientBuilder`] so callers can layer further settings on top.

use std::{fs, path::Path, str::FromStr};

use ini::Ini;

use crate::{
    error::ConfigError,
    socket_client::{Endpoint, ExhaustionPolicy, SocketClientBuilder},
};

/// Section holding the client settings.
pub const SECTION: &str = "tsdb";

/// Read `path` and turn its `[tsdb]` section into a builder.
pub fn load_ini(path: impl AsRef<Path>) -> Result<SocketClientBuilder, ConfigError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Err(ConfigError::Parse {
            path: path.display().to_string(),
            message: "empty file".into(),
        });
    }
    from_ini_str(&text, &path.display().to_string())
}

/// Parse INI `text`; `origin` names the source in error messages.
pub fn from_ini_str(text: &str, origin: &str) -> Result<SocketClientBuilder, ConfigError> {
    let ini = Ini::load_from_str(text).map_err(|err| ConfigError::Parse {
        path: origin.to_owned(),
        message: err.to_string(),
    })?;
    let section = ini.section(Some(SECTION)).ok_or_else(|| {
        ConfigError::InvalidConfig(format!("{origin} has no [{SECTION}] section"))
    })?;

    let mut builder = SocketClientBuilder::new();
    let mut saw_hosts = false;
    for (key, raw) in section.iter() {
        let raw = raw.trim();
        builder = match key {
            "hosts" => {
                saw_hosts = true;
                builder.with_endpoints(parse_hosts(raw)?)
            }
            "trust_window_secs" => builder.with_trust_window_ms(secs_to_ms(key, raw)?),
            "reconnect_interval_secs" => {
                builder.with_reconnect_interval_ms(secs_to_ms(key, raw)?)
            }
            "send_queue_max_size" => builder.with_send_queue_max_size(parse_value(key, raw)?),
            "max_uncaught_errors" => builder.with_max_uncaught_errors(parse_value(key, raw)?),
            "wait_retry" => builder.wait_retry(parse_bool(key, raw)?),
            "connect_timeout_ms" => builder.with_connect_timeout_ms(parse_value(key, raw)?),
            "io_timeout_ms" => builder.with_io_timeout_ms(parse_value(key, raw)?),
            "max_attempts" => builder.with_max_attempts(parse_value(key, raw)?),
            "deadline_secs" => builder.with_deadline_ms(secs_to_ms(key, raw)?),
            "exhaustion" => builder.with_exhaustion_policy(parse_exhaustion(raw)?),
            other => {
                return Err(ConfigError::InvalidConfig(format!(
                    "unknown key {other:?} in [{SECTION}] of {origin}"
                )));
            }
        };
    }
    if !saw_hosts {
        return Err(ConfigError::InvalidConfig(format!(
            "[{SECTION}] of {origin} must list hosts"
        )));
    }
    Ok(builder)
}

fn parse_hosts(raw: &str) -> Result<Vec<Endpoint>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .map(Endpoint::from_str)
        .collect()
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.parse()
        .map_err(|_| ConfigError::InvalidConfig(format!("{key} has invalid value {raw:?}")))
}

fn secs_to_ms(key: &str, raw: &str) -> Result<u64, ConfigError> {
    parse_value::<u64>(key, raw)?
        .checked_mul(1000)
        .ok_or_else(|| ConfigError::InvalidConfig(format!("{key} is too large")))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidConfig(format!(
            "{key} must be a boolean, got {raw:?}"
        ))),
    }
}

fn parse_exhaustion(raw: &str) -> Result<ExhaustionPolicy, ConfigError> {
    match raw {
        "shuffle" => Ok(ExhaustionPolicy::ShuffleAndClear),
        "in_order" => Ok(ExhaustionPolicy::ClearInOrder),
        _ => Err(ConfigError::InvalidConfig(format!(
            "exhaustion must be \"shuffle\" or \"in_order\", got {raw:?}"
        ))),
    }
}
