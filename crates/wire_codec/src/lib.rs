//! # Wire Codec
//!
//! Fixed 28-byte encoding of a [`SyncMessage`].
//!
//! | offset | size | field                     |
//! |--------|------|---------------------------|
//! | 0      | 1    | version (`0x1` top nibble) |
//! | 1      | 6    | originator                |
//! | 7      | 6    | sender                    |
//! | 13     | 2    | precedence                |
//! | 15     | 1    | hops                      |
//! | 16     | 2    | origination time delta    |
//! | 18     | 4    | current pattern           |
//! | 22     | 4    | next pattern              |
//! | 26     | 2    | pattern time delta        |
//!
//! Multi-byte fields are big-endian. Times travel as deltas: the sender
//! encodes `now - t`, the receiver rebuilds `receipt_time - delta` where
//! `receipt_time` is its own clock minus [`TRANSMISSION_OFFSET`].

mod error;

pub use error::CodecError;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use contracts::{DeviceId, Milliseconds, PatternId, SyncMessage};

/// Encoded payload length.
pub const PAYLOAD_LEN: usize = 28;

/// Byte 0 of every payload this codec writes.
pub const VERSION: u8 = 0x10;

const VERSION_MASK: u8 = 0xF0;

/// Assumed one-way latency subtracted from the receiver's clock.
pub const TRANSMISSION_OFFSET: Milliseconds = 5;

/// Largest delta representable on the wire.
pub const MAX_TIME_DELTA: Milliseconds = 0xFFFF;

/// Encode a message relative to the sender's clock.
pub fn encode(message: &SyncMessage, now: Milliseconds) -> Bytes {
    let mut buf = BytesMut::with_capacity(PAYLOAD_LEN);
    encode_into(message, now, &mut buf);
    buf.freeze()
}

/// Encode a message into an existing buffer.
pub fn encode_into(message: &SyncMessage, now: Milliseconds, buf: &mut impl BufMut) {
    buf.put_u8(VERSION);
    buf.put_slice(message.originator.as_bytes());
    buf.put_slice(message.sender.as_bytes());
    buf.put_u16(message.precedence);
    buf.put_u8(message.num_hops);
    buf.put_u16(encode_time_delta(message.last_origination_time, now));
    buf.put_u32(message.current_pattern.bits());
    buf.put_u32(message.next_pattern.bits());
    buf.put_u16(encode_time_delta(message.current_pattern_start_time, now));
    tracing::trace!(message = %message, now, "encoded sync message");
}

/// Decode a payload relative to the receiver's clock.
///
/// Trailing bytes beyond [`PAYLOAD_LEN`] are ignored.
pub fn decode(payload: &[u8], now: Milliseconds) -> Result<SyncMessage, CodecError> {
    if payload.len() < PAYLOAD_LEN {
        return Err(CodecError::TooShort {
            len: payload.len(),
        });
    }

    let mut buf = payload;
    let version = buf.get_u8();
    if version & VERSION_MASK != VERSION {
        return Err(CodecError::BadVersion { byte: version });
    }

    let originator = get_device_id(&mut buf);
    let sender = get_device_id(&mut buf);
    let precedence = buf.get_u16();
    let num_hops = buf.get_u8();
    let origination_delta = buf.get_u16();
    let current_pattern = PatternId::new(buf.get_u32());
    let next_pattern = PatternId::new(buf.get_u32());
    let pattern_delta = buf.get_u16();

    let receipt_time = now.saturating_sub(TRANSMISSION_OFFSET);
    let message = SyncMessage {
        sender,
        originator,
        precedence,
        current_pattern,
        next_pattern,
        num_hops,
        current_pattern_start_time: receipt_time.saturating_sub(pattern_delta as Milliseconds),
        last_origination_time: receipt_time.saturating_sub(origination_delta as Milliseconds),
        receipt_transport: None,
        receipt_details: String::new(),
    };
    tracing::trace!(message = %message, now, "decoded sync message");
    Ok(message)
}

/// `now - time`, or [`MAX_TIME_DELTA`] when that is negative or too large.
#[inline]
pub fn encode_time_delta(time: Milliseconds, now: Milliseconds) -> u16 {
    match now.checked_sub(time) {
        Some(delta) if delta <= MAX_TIME_DELTA => delta as u16,
        _ => MAX_TIME_DELTA as u16,
    }
}

fn get_device_id(buf: &mut &[u8]) -> DeviceId {
    let mut bytes = [0u8; DeviceId::LEN];
    buf.copy_to_slice(&mut bytes);
    DeviceId::new(bytes)
}
