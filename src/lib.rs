#![no_std]

mod bits;
mod crc;
mod field;
mod frame;
mod metrics;
mod render;

// Base frame, DLC = 8, 0x00 * 8, with the CRC and the trailer:
// 1 + 11 + 1 + 1 + 1 + 4 + 64 + 15 = 98 stuffable bits, at most 24 stuff bits,
// plus 13 trailing bits. Extended frames add 20 stuffable bits.

/// Longest payload of a classic CAN frame, in bytes
pub const MAX_PAYLOAD_BYTES: usize = 8;

/// Capacity of an unstuffed [`BitSequence`]. The longest classic frame is 160
/// bits after stuffing.
pub const MAX_BITS: usize = 256;

/// Capacity of a stuffed [`BitSequence`], enough to stuff [`MAX_BITS`] bits in
/// the worst case.
pub const MAX_STUFFED_BITS: usize = bits::max_length_after_stuffing(MAX_BITS);

pub use bits::*;
pub use crc::*;
pub use field::*;
pub use frame::*;
pub use metrics::*;
pub use render::*;

pub use embedded_can::{ExtendedId, Id, StandardId};
