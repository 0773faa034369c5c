//! Validated mail addresses.

use std::fmt;

use mailparse::{addrparse, MailAddr};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Reasons a string is not a usable `local-part@domain` address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,

    #[error("address has no '@': {0}")]
    MissingAt(String),

    #[error("address has more than one '@': {0}")]
    MultipleAt(String),

    #[error("address has an empty local part: {0}")]
    EmptyLocalPart(String),

    #[error("address has an empty domain: {0}")]
    EmptyDomain(String),

    #[error("header value holds no address: {0}")]
    NoAddressInHeader(String),
}

/// A `local-part@domain` address with exactly one `@`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MailAddress {
    raw: String,
    at: usize,
}

impl MailAddress {
    /// Parse a bare address, trimming whitespace and any `<...>` decoration.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let trimmed = input.trim().trim_start_matches('<').trim_end_matches('>').trim();

        if trimmed.is_empty() {
            return Err(AddressError::Empty);
        }

        let at = trimmed
            .find('@')
            .ok_or_else(|| AddressError::MissingAt(trimmed.to_string()))?;

        if trimmed[at + 1..].contains('@') {
            return Err(AddressError::MultipleAt(trimmed.to_string()));
        }
        if at == 0 {
            return Err(AddressError::EmptyLocalPart(trimmed.to_string()));
        }
        if at + 1 == trimmed.len() {
            return Err(AddressError::EmptyDomain(trimmed.to_string()));
        }

        Ok(Self {
            raw: trimmed.to_string(),
            at,
        })
    }

    /// Parse a header value such as `"Reva" <bayarea@red.mail.reva.tech>`,
    /// keeping only the first address.
    pub fn from_header(value: &str) -> Result<Self, AddressError> {
        let list = match addrparse(value) {
            Ok(list) => list,
            // Not RFC 5322 shaped; try it as a bare address.
            Err(_) => return Self::parse(value),
        };

        let first = list.iter().find_map(|addr| match addr {
            MailAddr::Single(info) => Some(info.addr.clone()),
            MailAddr::Group(group) => group.addrs.first().map(|info| info.addr.clone()),
        });

        match first {
            Some(addr) => Self::parse(&addr),
            None => Err(AddressError::NoAddressInHeader(value.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn local_part(&self) -> &str {
        &self.raw[..self.at]
    }

    pub fn domain(&self) -> &str {
        &self.raw[self.at + 1..]
    }

    /// Dot-separated labels of the domain part.
    pub fn domain_labels(&self) -> Vec<&str> {
        self.domain().split('.').collect()
    }
}

impl fmt::Display for MailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for MailAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for MailAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for MailAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_header(&raw).map_err(serde::de::Error::custom)
    }
}
