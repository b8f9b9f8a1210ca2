use core::fmt::{self, Write};

use heapless::String;

use crate::{BitSequence, SeqBit, MAX_STUFFED_BITS};

/// Capacity of [`BitSequence::to_bin_string`]
pub const BIN_STRING_CAPACITY: usize = MAX_STUFFED_BITS;
/// Capacity of [`BitSequence::to_bin_string_grouped`], enough for a
/// separator after every single bit
pub const GROUPED_BIN_STRING_CAPACITY: usize = 2 * MAX_STUFFED_BITS;
/// Capacity of [`BitSequence::to_hex_string`]
pub const HEX_STRING_CAPACITY: usize = MAX_STUFFED_BITS.div_ceil(4);

/// Which end of the sequence the groups of a grouped binary string start from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Align {
    /// `"0011 0010 0110 11"`
    #[default]
    Left,
    /// `"11 0011 0010 0110"`
    Right,
}

/// Binary rendering of a [`BitSequence`], see [`BitSequence::bin`].
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Bin<'a> {
    bits: &'a BitSequence,
    grouping: Option<(usize, Align)>,
    stuff_prefix: &'a str,
    stuff_suffix: &'a str,
}

impl<'a> Bin<'a> {
    /// Separates groups of `size` bits with a space. A size of 0 disables
    /// grouping.
    pub fn grouped(mut self, size: usize, align: Align) -> Self {
        self.grouping = (size > 0).then_some((size, align));
        self
    }

    /// Wraps every stuff bit between `prefix` and `suffix`, e.g. to
    /// highlight them in markup.
    pub fn mark_stuff_bits(mut self, prefix: &'a str, suffix: &'a str) -> Self {
        self.stuff_prefix = prefix;
        self.stuff_suffix = suffix;
        self
    }

    fn separator_before(&self, index: usize) -> bool {
        match self.grouping {
            Some(_) if index == 0 => false,
            Some((size, Align::Left)) => index % size == 0,
            Some((size, Align::Right)) => (self.bits.len() - index) % size == 0,
            None => false,
        }
    }
}

impl fmt::Display for Bin<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, bit) in self.bits.seq_bits().iter().enumerate() {
            if self.separator_before(index) {
                f.write_char(' ')?;
            }

            let digit = if bit.value() { '1' } else { '0' };

            if bit.is_stuff() {
                f.write_str(self.stuff_prefix)?;
                f.write_char(digit)?;
                f.write_str(self.stuff_suffix)?;
            } else {
                f.write_char(digit)?;
            }
        }

        Ok(())
    }
}

/// Uppercase hexadecimal rendering of a [`BitSequence`], see
/// [`BitSequence::hex`].
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Hex<'a> {
    bits: &'a BitSequence,
}

fn to_hex_digit(value: u8) -> char {
    const HEX_LUT: &[u8] = "0123456789ABCDEF".as_bytes();

    HEX_LUT[(value & 0xF) as usize] as char
}

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Nibbles are counted from the last bit, so only the first one may be
        // partial.
        let bits = self.bits.seq_bits();
        let (leading, nibbles) = bits.split_at(bits.len() % 4);

        let nibble_value = |nibble: &[SeqBit]| {
            nibble
                .iter()
                .fold(0u8, |acc, bit| (acc << 1) | u8::from(bit.value()))
        };

        if !leading.is_empty() {
            f.write_char(to_hex_digit(nibble_value(leading)))?;
        }

        for nibble in nibbles.chunks(4) {
            f.write_char(to_hex_digit(nibble_value(nibble)))?;
        }

        Ok(())
    }
}

impl BitSequence {
    /// Binary rendering, first bit left-most. Chain [`Bin::grouped`] and
    /// [`Bin::mark_stuff_bits`] for other layouts.
    pub fn bin(&self) -> Bin<'_> {
        Bin {
            bits: self,
            grouping: None,
            stuff_prefix: "",
            stuff_suffix: "",
        }
    }

    /// Hexadecimal rendering where the first bit is the most significant.
    ///
    /// `[1,0,1,1,1,1,0,1,0]` renders as `"17A"`.
    pub fn hex(&self) -> Hex<'_> {
        Hex { bits: self }
    }

    /// `"0001100100110"`
    pub fn to_bin_string(&self) -> String<BIN_STRING_CAPACITY> {
        render(self.bin())
    }

    /// `"0 0011 0010 0110"` (right aligned) or `"0001 1001 0011 0"` (left
    /// aligned) for groups of 4.
    pub fn to_bin_string_grouped(
        &self,
        size: usize,
        align: Align,
    ) -> String<GROUPED_BIN_STRING_CAPACITY> {
        render(self.bin().grouped(size, align))
    }

    pub fn to_hex_string(&self) -> String<HEX_STRING_CAPACITY> {
        render(self.hex())
    }
}

fn render<const N: usize>(value: impl fmt::Display) -> String<N> {
    let mut result = String::new();

    write!(result, "{value}").expect("Rendering fits the string capacity");

    result
}

impl fmt::Display for BitSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.bin(), f)
    }
}
