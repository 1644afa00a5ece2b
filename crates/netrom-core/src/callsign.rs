//! Station callsigns and node mnemonics.
//!
//! Callsigns travel on the wire as AX.25 address fields: six characters, each
//! shifted left one bit and space padded, followed by an SSID byte. Mnemonics
//! (node aliases) are six plain ASCII bytes, also space padded.

use core::fmt;
use core::str::FromStr;

use crate::constants::{CALLSIGN_FIELD_LEN, CALLSIGN_MAX_CHARS, MNEMONIC_LEN, SSID_MAX};
use crate::error::CallsignError;

/// Reserved bits set in an encoded SSID byte.
const SSID_RESERVED_BITS: u8 = 0x60;

fn is_padding(b: u8) -> bool {
    b == b' ' || b == 0
}

/// An amateur-radio station address: base call plus SSID.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Callsign {
    call: String,
    ssid: u8,
}

impl Callsign {
    /// Build a callsign, upper-casing the base call.
    pub fn new(call: &str, ssid: u8) -> Result<Self, CallsignError> {
        let call = call.trim();
        if call.is_empty() {
            return Err(CallsignError::Empty);
        }
        if call.len() > CALLSIGN_MAX_CHARS {
            return Err(CallsignError::TooLong {
                max: CALLSIGN_MAX_CHARS,
                actual: call.len(),
            });
        }
        if let Some(c) = call.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(CallsignError::InvalidCharacter(c));
        }
        if ssid > SSID_MAX {
            return Err(CallsignError::InvalidSsid(ssid));
        }
        Ok(Self {
            call: call.to_ascii_uppercase(),
            ssid,
        })
    }

    /// The base call without SSID.
    pub fn base(&self) -> &str {
        &self.call
    }

    pub fn ssid(&self) -> u8 {
        self.ssid
    }

    /// Encode as a 7-byte shifted address field.
    pub fn to_shifted(&self) -> [u8; CALLSIGN_FIELD_LEN] {
        let mut field = [b' ' << 1; CALLSIGN_FIELD_LEN];
        for (slot, b) in field.iter_mut().zip(self.call.bytes()) {
            *slot = b << 1;
        }
        field[CALLSIGN_FIELD_LEN - 1] = SSID_RESERVED_BITS | (self.ssid << 1);
        field
    }

    /// Decode a 7-byte shifted address field.
    ///
    /// Trailing space or NUL padding is trimmed after un-shifting.
    pub fn from_shifted(field: &[u8]) -> Result<Self, CallsignError> {
        if field.len() != CALLSIGN_FIELD_LEN {
            return Err(CallsignError::FieldLength {
                expected: CALLSIGN_FIELD_LEN,
                actual: field.len(),
            });
        }
        let mut chars: Vec<u8> = field[..CALLSIGN_MAX_CHARS].iter().map(|b| b >> 1).collect();
        while chars.last().copied().is_some_and(is_padding) {
            chars.pop();
        }
        let ssid = (field[CALLSIGN_FIELD_LEN - 1] >> 1) & SSID_MAX;
        let call: String = chars.into_iter().map(char::from).collect();
        Self::new(&call, ssid)
    }

    /// Whether `query` names this station, ignoring case.
    ///
    /// An SSID-less query only matches SSID 0.
    pub fn matches(&self, query: &str) -> bool {
        match query.trim().parse::<Callsign>() {
            Ok(other) => other == *self,
            Err(_) => false,
        }
    }
}

impl FromStr for Callsign {
    type Err = CallsignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((call, ssid)) => {
                let ssid: u8 = ssid
                    .parse()
                    .map_err(|_| CallsignError::InvalidCharacter('-'))?;
                Self::new(call, ssid)
            }
            None => Self::new(s, 0),
        }
    }
}

impl fmt::Display for Callsign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ssid == 0 {
            write!(f, "{}", self.call)
        } else {
            write!(f, "{}-{}", self.call, self.ssid)
        }
    }
}

impl fmt::Debug for Callsign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callsign({self})")
    }
}

/// A node's short human-readable alias, e.g. `BCDNOD`.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Mnemonic(String);

impl Mnemonic {
    /// Build a mnemonic. Empty mnemonics are allowed; many nodes advertise none.
    pub fn new(alias: &str) -> Result<Self, CallsignError> {
        let alias = alias.trim();
        if alias.len() > MNEMONIC_LEN {
            return Err(CallsignError::TooLong {
                max: MNEMONIC_LEN,
                actual: alias.len(),
            });
        }
        if let Some(c) = alias.chars().find(|c| !c.is_ascii_graphic()) {
            return Err(CallsignError::InvalidCharacter(c));
        }
        Ok(Self(alias.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encode as a 6-byte space-padded field.
    pub fn to_field(&self) -> [u8; MNEMONIC_LEN] {
        let mut field = [b' '; MNEMONIC_LEN];
        field[..self.0.len()].copy_from_slice(self.0.as_bytes());
        field
    }

    /// Decode a 6-byte field, trimming trailing space or NUL padding.
    pub fn from_field(field: &[u8]) -> Result<Self, CallsignError> {
        if field.len() != MNEMONIC_LEN {
            return Err(CallsignError::FieldLength {
                expected: MNEMONIC_LEN,
                actual: field.len(),
            });
        }
        let mut end = field.len();
        while end > 0 && is_padding(field[end - 1]) {
            end -= 1;
        }
        let alias: String = field[..end].iter().copied().map(char::from).collect();
        Self::new(&alias)
    }

    /// Whether `query` names this alias, ignoring case.
    pub fn matches(&self, query: &str) -> bool {
        !self.0.is_empty() && self.0.eq_ignore_ascii_case(query.trim())
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mnemonic({})", self.0)
    }
}
