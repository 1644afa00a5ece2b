//! INP3 routing broadcast.
//!
//! ```text
//! 0xFF | { dest (7, shifted) | hops (1) | trip time ms (2, BE) | option* | 0x00 }*
//! option = len (1) | type (1) | payload (len)
//! ```

use crate::callsign::Callsign;
use crate::constants::{
    BROADCAST_SIGNATURE, CALLSIGN_FIELD_LEN, INP3_FIXED_LEN, INP3_OPTION_ALIAS, INP3_OPTION_IP,
    INP3_TERMINATOR,
};
use crate::error::BroadcastError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Inp3OptionType {
    Alias,
    Ip,
    Other(u8),
}

impl Inp3OptionType {
    pub fn from_u8(v: u8) -> Self {
        match v {
            INP3_OPTION_ALIAS => Inp3OptionType::Alias,
            INP3_OPTION_IP => Inp3OptionType::Ip,
            other => Inp3OptionType::Other(other),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Inp3OptionType::Alias => INP3_OPTION_ALIAS,
            Inp3OptionType::Ip => INP3_OPTION_IP,
            Inp3OptionType::Other(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inp3Option {
    pub kind: Inp3OptionType,
    pub payload: Vec<u8>,
}

impl Inp3Option {
    pub fn alias(alias: &str) -> Self {
        Self {
            kind: Inp3OptionType::Alias,
            payload: alias.as_bytes().to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inp3Entry {
    pub destination: Callsign,
    pub hops: u8,
    pub trip_time_ms: u16,
    pub options: Vec<Inp3Option>,
}

impl Inp3Entry {
    /// First ALIAS option, if it is valid text.
    pub fn alias(&self) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.kind == Inp3OptionType::Alias)
            .and_then(|o| std::str::from_utf8(&o.payload).ok())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inp3Broadcast {
    pub entries: Vec<Inp3Entry>,
}

impl Inp3Broadcast {
    /// Parse a complete broadcast. A missing terminator or an option running
    /// past the end rejects the whole packet.
    pub fn parse(raw: &[u8]) -> Result<Self, BroadcastError> {
        if raw.first() != Some(&BROADCAST_SIGNATURE) {
            return Err(BroadcastError::MissingSignature);
        }

        let mut entries = Vec::new();
        let mut offset = 1;
        while offset < raw.len() {
            let remaining = raw.len() - offset;
            if remaining < INP3_FIXED_LEN {
                return Err(BroadcastError::TruncatedRecord { offset, remaining });
            }
            let destination = Callsign::from_shifted(&raw[offset..offset + CALLSIGN_FIELD_LEN])?;
            let hops = raw[offset + CALLSIGN_FIELD_LEN];
            let trip_time_ms = u16::from_be_bytes([
                raw[offset + CALLSIGN_FIELD_LEN + 1],
                raw[offset + CALLSIGN_FIELD_LEN + 2],
            ]);
            offset += INP3_FIXED_LEN;

            let mut options = Vec::new();
            loop {
                let Some(&length) = raw.get(offset) else {
                    return Err(BroadcastError::MissingTerminator { offset });
                };
                if length == INP3_TERMINATOR {
                    offset += 1;
                    break;
                }
                let length = usize::from(length);
                let remaining = raw.len() - offset;
                if 2 + length > remaining {
                    return Err(BroadcastError::OptionOverrun {
                        offset,
                        length,
                        remaining,
                    });
                }
                options.push(Inp3Option {
                    kind: Inp3OptionType::from_u8(raw[offset + 1]),
                    payload: raw[offset + 2..offset + 2 + length].to_vec(),
                });
                offset += 2 + length;
            }

            entries.push(Inp3Entry {
                destination,
                hops,
                trip_time_ms,
                options,
            });
        }

        Ok(Self { entries })
    }

    /// Encode. Empty options are skipped and payloads capped at 255 bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = vec![BROADCAST_SIGNATURE];
        for entry in &self.entries {
            out.extend_from_slice(&entry.destination.to_shifted());
            out.push(entry.hops);
            out.extend_from_slice(&entry.trip_time_ms.to_be_bytes());
            for option in entry.options.iter().filter(|o| !o.payload.is_empty()) {
                let payload = &option.payload[..option.payload.len().min(u8::MAX as usize)];
                out.push(payload.len() as u8);
                out.push(option.kind.to_u8());
                out.extend_from_slice(payload);
            }
            out.push(INP3_TERMINATOR);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(call: &str, hops: u8, trip: u16, options: Vec<Inp3Option>) -> Inp3Entry {
        Inp3Entry {
            destination: call.parse().unwrap(),
            hops,
            trip_time_ms: trip,
            options,
        }
    }

    #[test]
    fn parse_two_records() {
        let broadcast = Inp3Broadcast {
            entries: vec![
                entry("G1BCD", 2, 300, vec![Inp3Option::alias("BCDNOD")]),
                entry(
                    "G4XYZ-2",
                    5,
                    1200,
                    vec![
                        Inp3Option {
                            kind: Inp3OptionType::Ip,
                            payload: vec![44, 1, 2, 3],
                        },
                        Inp3Option::alias("XYZ"),
                    ],
                ),
            ],
        };
        let raw = broadcast.serialize();
        assert_eq!(*raw.last().unwrap(), 0x00);
        let parsed = Inp3Broadcast::parse(&raw).unwrap();
        assert_eq!(parsed, broadcast);
        assert_eq!(parsed.entries[0].alias(), Some("BCDNOD"));
        assert_eq!(parsed.entries[1].alias(), Some("XYZ"));
    }

    #[test]
    fn trip_time_is_big_endian() {
        let raw = Inp3Broadcast {
            entries: vec![entry("G1BCD", 1, 0x0102, vec![])],
        }
        .serialize();
        assert_eq!(&raw[8..11], &[1, 0x01, 0x02]);
        assert_eq!(raw.len(), 12);
    }

    #[test]
    fn option_overrun_discards_packet() {
        let mut raw = Inp3Broadcast {
            entries: vec![entry("G1BCD", 1, 10, vec![])],
        }
        .serialize();
        // replace the terminator with an option that claims 40 bytes
        raw.pop();
        raw.extend_from_slice(&[40, 0x00, b'A', 0x00]);
        assert_eq!(
            Inp3Broadcast::parse(&raw),
            Err(BroadcastError::OptionOverrun {
                offset: 11,
                length: 40,
                remaining: 4
            })
        );
    }

    #[test]
    fn missing_terminator() {
        let mut raw = vec![0xFF];
        raw.extend_from_slice(&"G1BCD".parse::<Callsign>().unwrap().to_shifted());
        raw.extend_from_slice(&[1, 0, 10, 3, 0x00, b'A', b'B', b'C']);
        assert_eq!(
            Inp3Broadcast::parse(&raw),
            Err(BroadcastError::MissingTerminator { offset: 16 })
        );
    }

    #[test]
    fn empty_options_skipped_on_encode() {
        let raw = Inp3Broadcast {
            entries: vec![entry(
                "G1BCD",
                1,
                10,
                vec![Inp3Option {
                    kind: Inp3OptionType::Other(9),
                    payload: vec![],
                }],
            )],
        }
        .serialize();
        let parsed = Inp3Broadcast::parse(&raw).unwrap();
        assert!(parsed.entries[0].options.is_empty());
        assert_eq!(parsed.entries[0].alias(), None);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn parse_never_panics(tail in proptest::collection::vec(any::<u8>(), 0..80)) {
            let mut raw = vec![0xFF];
            raw.extend(tail);
            let _ = Inp3Broadcast::parse(&raw);
        }
    }
}
