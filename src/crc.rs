use crate::{field::Level, SeqBit};

/// Anything that can be fed bit by bit into [`crc`].
pub trait AsBit {
    fn as_bit(&self) -> bool;
}

impl AsBit for bool {
    fn as_bit(&self) -> bool {
        *self
    }
}

/// Any non-zero value counts as a 1.
impl AsBit for u8 {
    fn as_bit(&self) -> bool {
        *self != 0
    }
}

impl AsBit for SeqBit {
    fn as_bit(&self) -> bool {
        self.value()
    }
}

impl AsBit for Level {
    fn as_bit(&self) -> bool {
        (*self).into()
    }
}

impl<T: AsBit + ?Sized> AsBit for &T {
    fn as_bit(&self) -> bool {
        (**self).as_bit()
    }
}

/// A CRC polynomial together with its width in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CrcAlgorithm {
    pub polynomial: u32,
    pub width: u8,
}

/// Classic CAN.
///
/// x^15 + x^14 + x^10 + x^8 + x^7 + x^4 + x^3 + 1 = `0b1100_0101_1001_1001`
pub const CAN_CRC15: CrcAlgorithm = CrcAlgorithm {
    polynomial: 0xC599,
    width: 15,
};

/// CAN FD, payloads up to 16 bytes.
///
/// x^17 + x^16 + x^14 + x^13 + x^11 + x^6 + x^4 + x^3 + x + 1
pub const CAN_FD_CRC17: CrcAlgorithm = CrcAlgorithm {
    polynomial: 0x3685B,
    width: 17,
};

/// CAN FD, payloads above 16 bytes.
///
/// x^21 + x^20 + x^13 + x^11 + x^7 + x^4 + x^3 + 1
pub const CAN_FD_CRC21: CrcAlgorithm = CrcAlgorithm {
    polynomial: 0x302899,
    width: 21,
};

impl CrcAlgorithm {
    pub fn checksum<I>(&self, bits: I) -> u32
    where
        I: IntoIterator,
        I::Item: AsBit,
    {
        crc(bits, self.polynomial, self.width)
    }
}

/// Computes a CRC bit by bit, by long division with `polynomial`.
///
/// The polynomial may be given with or without its implicit `x^width` term,
/// which is cleared before starting. The register starts at zero and no
/// final XOR is applied. `width` is clamped to `1..=32`.
pub fn crc<I>(bits: I, polynomial: u32, width: u8) -> u32
where
    I: IntoIterator,
    I::Item: AsBit,
{
    let width = u32::from(width.clamp(1, 32));
    let mask = (1u64 << width) - 1;
    let top_bit = 1u64 << (width - 1);
    let polynomial = u64::from(polynomial) & mask;

    let mut remainder = 0u64;

    for bit in bits {
        remainder ^= u64::from(bit.as_bit()) << (width - 1);

        remainder = if remainder & top_bit != 0 {
            (remainder << 1) ^ polynomial
        } else {
            remainder << 1
        };
        remainder &= mask;
    }

    // The mask keeps the remainder within 32 bits
    remainder as u32
}

pub fn crc15<I>(bits: I) -> u32
where
    I: IntoIterator,
    I::Item: AsBit,
{
    CAN_CRC15.checksum(bits)
}

pub fn crc17<I>(bits: I) -> u32
where
    I: IntoIterator,
    I::Item: AsBit,
{
    CAN_FD_CRC17.checksum(bits)
}

pub fn crc21<I>(bits: I) -> u32
where
    I: IntoIterator,
    I::Item: AsBit,
{
    CAN_FD_CRC21.checksum(bits)
}
