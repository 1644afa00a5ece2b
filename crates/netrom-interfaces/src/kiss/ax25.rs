//! AX.25 UI frame encoding.
//!
//! Only unconnected information frames are handled here:
//! `destination, source, [digipeaters], control 0x03, PID, info`.
//! Digipeater paths on received frames are skipped.

use netrom_core::Callsign;
use netrom_core::constants::CALLSIGN_FIELD_LEN;

use crate::error::FramingError;
use crate::traits::LinkFrame;

/// UI control byte with the poll/final bit clear.
pub const CONTROL_UI: u8 = 0x03;

const POLL_FINAL: u8 = 0x10;
const COMMAND_BIT: u8 = 0x80;
const END_OF_ADDRESS: u8 = 0x01;

/// Destination and source, at most eight digipeaters.
const MAX_ADDRESSES: usize = 10;

/// Addresses, control and PID of the shortest valid UI frame.
pub const MIN_UI_FRAME: usize = 2 * CALLSIGN_FIELD_LEN + 2;

/// Encode `frame` as an AX.25 UI command frame.
pub fn encode_ui(frame: &LinkFrame) -> Vec<u8> {
    let mut out = Vec::with_capacity(MIN_UI_FRAME + frame.payload.len());

    let mut destination = frame.destination.to_shifted();
    destination[CALLSIGN_FIELD_LEN - 1] |= COMMAND_BIT;
    out.extend_from_slice(&destination);

    let mut source = frame.source.to_shifted();
    source[CALLSIGN_FIELD_LEN - 1] |= END_OF_ADDRESS;
    out.extend_from_slice(&source);

    out.push(CONTROL_UI);
    out.push(frame.pid);
    out.extend_from_slice(&frame.payload);
    out
}

/// Decode an AX.25 UI frame.
pub fn decode_ui(raw: &[u8]) -> Result<LinkFrame, FramingError> {
    if raw.len() < MIN_UI_FRAME {
        return Err(FramingError::TooShort {
            min: MIN_UI_FRAME,
            actual: raw.len(),
        });
    }

    let mut fields = 0;
    loop {
        let end = (fields + 1) * CALLSIGN_FIELD_LEN;
        if end > raw.len() || fields == MAX_ADDRESSES {
            return Err(FramingError::UnterminatedAddress);
        }
        fields += 1;
        if raw[end - 1] & END_OF_ADDRESS != 0 {
            break;
        }
    }
    if fields < 2 {
        return Err(FramingError::UnterminatedAddress);
    }

    let address_len = fields * CALLSIGN_FIELD_LEN;
    let rest = &raw[address_len..];
    let [control, pid, payload @ ..] = rest else {
        return Err(FramingError::TooShort {
            min: address_len + 2,
            actual: raw.len(),
        });
    };
    if control & !POLL_FINAL != CONTROL_UI {
        return Err(FramingError::NotUiFrame(*control));
    }

    Ok(LinkFrame {
        destination: Callsign::from_shifted(&raw[..CALLSIGN_FIELD_LEN])?,
        source: Callsign::from_shifted(&raw[CALLSIGN_FIELD_LEN..2 * CALLSIGN_FIELD_LEN])?,
        pid: *pid,
        payload: payload.to_vec(),
    })
}
