//! Target URLs: `<dbid>` or `<dbid>(<driver>://<host>:<port>)`.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{GenericError, Result};

/// Highest database id accepted in a URL.
pub const MAX_DATABASE_ID: u32 = 255;

const URL_PATTERN: &str = r"^(\w+)\((\w*)://([^:]*?):(\w*)\)$";

fn url_regex() -> std::result::Result<&'static Regex, GenericError> {
    static RE: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(URL_PATTERN))
        .as_ref()
        .map_err(|e| GenericError::invalid_url(&e.to_string()))
}

/// How a target is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Driver {
    /// Locally linked native submitter.
    Native,
    /// ADATCP over plain TCP.
    AdaTcp,
    /// ADATCP over TLS.
    AdaTcps,
    /// Legacy Entire Network dialect, recognized only to be rejected.
    EntireNetwork,
}

impl Driver {
    /// Scheme text.
    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Native => "native",
            Driver::AdaTcp => "adatcp",
            Driver::AdaTcps => "adatcps",
            Driver::EntireNetwork => "tcpip",
        }
    }

    /// Whether the driver talks to a remote host.
    pub fn is_remote(&self) -> bool {
        matches!(self, Driver::AdaTcp | Driver::AdaTcps)
    }
}

impl FromStr for Driver {
    type Err = GenericError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" => Ok(Driver::Native),
            "adatcp" => Ok(Driver::AdaTcp),
            "adatcps" => Ok(Driver::AdaTcps),
            "tcpip" => Ok(Driver::EntireNetwork),
            other => Err(GenericError::unknown_scheme(other)),
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed target URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Url {
    /// Database id, 1 to 255.
    pub dbid: u32,
    /// How the database is reached.
    pub driver: Driver,
    /// Host name, empty for native access.
    pub host: String,
    /// Port, 0 for native access.
    pub port: u16,
}

impl Url {
    /// Native target for a database id.
    pub fn native(dbid: u32) -> Result<Self> {
        check_dbid(u64::from(dbid))?;
        Ok(Self {
            dbid,
            driver: Driver::Native,
            host: String::new(),
            port: 0,
        })
    }

    /// Remote ADATCP target.
    pub fn adatcp(dbid: u32, host: impl Into<String>, port: u16) -> Result<Self> {
        check_dbid(u64::from(dbid))?;
        Ok(Self {
            dbid,
            driver: Driver::AdaTcp,
            host: host.into(),
            port,
        })
    }

    /// Parses `<dbid>` or `<dbid>(<driver>://<host>:<port>)`.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if !input.contains('(') {
            let dbid = parse_dbid(input)?;
            return Url::native(dbid);
        }
        let caps = url_regex()?
            .captures(input)
            .ok_or_else(|| GenericError::invalid_url(input))?;
        let dbid = parse_dbid(&caps[1])?;
        let driver: Driver = caps[2].parse()?;
        let port_text = &caps[4];
        let port = port_text
            .parse::<u16>()
            .map_err(|_| GenericError::port_not_numeric(port_text))?;
        Ok(Self {
            dbid,
            driver,
            host: caps[3].to_string(),
            port,
        })
    }

    /// `host:port` for dialing.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_dbid(text: &str) -> Result<u32> {
    let dbid = text
        .parse::<u64>()
        .map_err(|_| GenericError::dbid_not_numeric(text))?;
    check_dbid(dbid)?;
    Ok(dbid as u32)
}

fn check_dbid(dbid: u64) -> Result<()> {
    if dbid < 1 || dbid > u64::from(MAX_DATABASE_ID) {
        return Err(GenericError::dbid_out_of_range(dbid).into());
    }
    Ok(())
}

impl FromStr for Url {
    type Err = crate::error::AdabasError;

    fn from_str(s: &str) -> Result<Self> {
        Url::parse(s)
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.driver == Driver::Native && self.port == 0 {
            return write!(f, "{}", self.dbid);
        }
        write!(
            f,
            "{}({}://{}:{})",
            self.dbid, self.driver, self.host, self.port
        )
    }
}
