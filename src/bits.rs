use core::{iter, slice, str::FromStr};

use heapless::Vec;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{field::Level, MAX_BITS, MAX_STUFFED_BITS};

/// Amount of identical consecutive bits after which a stuff bit is inserted.
pub const STUFF_RUN_LENGTH: usize = 5;

/// A single element of a [`BitSequence`].
///
/// The least significant bit of the discriminant holds the bit value, the
/// next one marks bits that were inserted by [`BitSequence::apply_bit_stuffing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[num_enum(error_type(name = BitsError, constructor = BitsError::UnsupportedValue))]
#[repr(u8)]
pub enum SeqBit {
    Zero = 0b00,
    One = 0b01,
    ZeroStuff = 0b10,
    OneStuff = 0b11,
}

impl SeqBit {
    pub const fn new(value: bool, stuff: bool) -> Self {
        match (value, stuff) {
            (false, false) => Self::Zero,
            (true, false) => Self::One,
            (false, true) => Self::ZeroStuff,
            (true, true) => Self::OneStuff,
        }
    }

    pub const fn value(self) -> bool {
        (self as u8) & 0b01 != 0
    }

    pub const fn is_stuff(self) -> bool {
        (self as u8) & 0b10 != 0
    }
}

/// Errors raised while building or transforming a [`BitSequence`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitsError {
    /* Malformed literals */
    #[error("Tried to read a bit from an unsupported character ({0:?})")]
    UnsupportedCharacter(char),
    #[error("Tried to read a bit from an unsupported value ({0:?}), expected 0 or 1")]
    UnsupportedValue(u8),
    #[error("The sequence would exceed its capacity of ({0:?}) bits")]
    CapacityExceeded(usize),

    /* Stuffing state */
    #[error("The bit sequence is already stuffed")]
    AlreadyStuffed,
    #[error("The bit sequence is already de-stuffed")]
    AlreadyUnstuffed,
}

impl BitsError {
    /// True for the errors caused by a malformed input literal.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedCharacter(_) | Self::UnsupportedValue(_)
        )
    }
}

/// Every shape of input a [`BitSequence`] can be built from or extended with.
///
/// Usually not named directly: all the supported types convert into it, so
/// `BitSequence::new("01 10")`, `BitSequence::new(&[1u8, 0])` and
/// `BitSequence::new(true)` all work.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitSource<'a> {
    /// Binary digits, whitespace is skipped (`"01 0011"`)
    Str(&'a str),
    Bools(&'a [bool]),
    /// Integers restricted to 0 and 1
    Ints(&'a [u8]),
    /// Any mix of the other sources, appended in order
    Mixed(&'a [BitSource<'a>]),
    Bool(bool),
    Int(u8),
    /// Copy of another sequence. The stuff marks are only kept when copying
    /// into a stuffed sequence.
    Bits(&'a BitSequence),
}

impl<'a> From<&'a str> for BitSource<'a> {
    fn from(bits: &'a str) -> Self {
        Self::Str(bits)
    }
}

impl<'a> From<&'a [bool]> for BitSource<'a> {
    fn from(bits: &'a [bool]) -> Self {
        Self::Bools(bits)
    }
}

impl<'a, const N: usize> From<&'a [bool; N]> for BitSource<'a> {
    fn from(bits: &'a [bool; N]) -> Self {
        Self::Bools(bits)
    }
}

impl<'a> From<&'a [u8]> for BitSource<'a> {
    fn from(bits: &'a [u8]) -> Self {
        Self::Ints(bits)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for BitSource<'a> {
    fn from(bits: &'a [u8; N]) -> Self {
        Self::Ints(bits)
    }
}

impl<'a> From<&'a [BitSource<'a>]> for BitSource<'a> {
    fn from(sources: &'a [BitSource<'a>]) -> Self {
        Self::Mixed(sources)
    }
}

impl<'a, const N: usize> From<&'a [BitSource<'a>; N]> for BitSource<'a> {
    fn from(sources: &'a [BitSource<'a>; N]) -> Self {
        Self::Mixed(sources)
    }
}

impl From<bool> for BitSource<'_> {
    fn from(bit: bool) -> Self {
        Self::Bool(bit)
    }
}

impl From<u8> for BitSource<'_> {
    fn from(bit: u8) -> Self {
        Self::Int(bit)
    }
}

impl From<Level> for BitSource<'_> {
    fn from(level: Level) -> Self {
        Self::Bool(level.into())
    }
}

impl<'a> From<&'a BitSequence> for BitSource<'a> {
    fn from(bits: &'a BitSequence) -> Self {
        Self::Bits(bits)
    }
}

/// Ordered sequence of bits as transmitted on the bus, first bit first.
///
/// Keeps track of whether stuff bits were already inserted, so that a
/// sequence can never be stuffed (or de-stuffed) twice.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitSequence {
    bits: Vec<SeqBit, MAX_STUFFED_BITS>,
    stuffed: bool,
}

impl BitSequence {
    /// An empty, unstuffed sequence
    pub const fn empty() -> Self {
        Self {
            bits: Vec::new(),
            stuffed: false,
        }
    }

    /// Creates an unstuffed sequence from any supported [`BitSource`].
    pub fn new<'a>(source: impl Into<BitSource<'a>>) -> Result<Self, BitsError> {
        let mut sequence = Self::empty();
        sequence.extend(source)?;
        Ok(sequence)
    }

    /// Creates a sequence whose bits already contain stuffing. The stuff bits
    /// of a literal cannot be told apart from the data bits, so they are not
    /// marked.
    pub fn new_stuffed<'a>(source: impl Into<BitSource<'a>>) -> Result<Self, BitsError> {
        let mut sequence = Self {
            bits: Vec::new(),
            stuffed: true,
        };
        sequence.extend(source)?;
        Ok(sequence)
    }

    /// Builds a `width`-bit field from the low bits of `value`, most
    /// significant bit first. `width` must be at most 32.
    pub fn from_uint(value: u32, width: u8) -> Self {
        debug_assert!(width <= 32, "A u32 has no more than 32 bits");
        let width = u32::from(width.min(32));

        Self {
            bits: (0..width)
                .rev()
                .map(|shift| SeqBit::new((value >> shift) & 1 != 0, false))
                .collect(),
            stuffed: false,
        }
    }

    pub(crate) fn repeat(level: Level, count: usize) -> Self {
        Self {
            bits: iter::repeat(SeqBit::new(level.into(), false))
                .take(count.min(MAX_BITS))
                .collect(),
            stuffed: false,
        }
    }

    /// Appends the bits of a field while assembling a frame, which always
    /// fits in the capacity.
    pub(crate) fn append(&mut self, other: &BitSequence) {
        self.bits
            .extend_from_slice(&other.bits)
            .expect("CAN frames fit within MAX_STUFFED_BITS");
    }

    /// Appends `tail` to the end (right side) of the sequence.
    ///
    /// Either all of `tail` is appended or, on error, nothing is.
    pub fn extend<'a>(&mut self, tail: impl Into<BitSource<'a>>) -> Result<&mut Self, BitsError> {
        let previous_len = self.bits.len();

        if let Err(err) = self.extend_from_source(tail.into()) {
            self.bits.truncate(previous_len);
            return Err(err);
        }

        Ok(self)
    }

    fn extend_from_source(&mut self, source: BitSource<'_>) -> Result<(), BitsError> {
        match source {
            BitSource::Str(digits) => digits
                .chars()
                .filter(|c| !c.is_whitespace())
                .try_for_each(|c| match c {
                    '0' => self.push(SeqBit::Zero),
                    '1' => self.push(SeqBit::One),
                    _ => Err(BitsError::UnsupportedCharacter(c)),
                }),
            BitSource::Bools(bools) => bools
                .iter()
                .try_for_each(|&bit| self.push(SeqBit::new(bit, false))),
            BitSource::Ints(ints) => ints
                .iter()
                .try_for_each(|&value| self.push(int_to_bit(value)?)),
            BitSource::Mixed(sources) => sources
                .iter()
                .try_for_each(|source| self.extend_from_source(*source)),
            BitSource::Bool(bit) => self.push(SeqBit::new(bit, false)),
            BitSource::Int(value) => self.push(int_to_bit(value)?),
            BitSource::Bits(other) if self.stuffed => {
                other.bits.iter().try_for_each(|&bit| self.push(bit))
            }
            BitSource::Bits(other) => other
                .iter()
                .try_for_each(|bit| self.push(SeqBit::new(bit, false))),
        }
    }

    /// Unstuffed sequences hold up to [`MAX_BITS`], stuffed ones up to
    /// [`MAX_STUFFED_BITS`], so stuffing never runs out of room.
    pub fn capacity(&self) -> usize {
        if self.stuffed {
            MAX_STUFFED_BITS
        } else {
            MAX_BITS
        }
    }

    fn push(&mut self, bit: SeqBit) -> Result<(), BitsError> {
        let capacity = self.capacity();

        if self.bits.len() >= capacity {
            return Err(BitsError::CapacityExceeded(capacity));
        }

        self.bits
            .push(bit)
            .map_err(|_| BitsError::CapacityExceeded(capacity))
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn is_stuffed(&self) -> bool {
        self.stuffed
    }

    /// The bits in transmission order
    pub fn iter(&self) -> Iter<'_> {
        Iter(self.bits.iter())
    }

    /// The bits including the marks of which ones are stuff bits
    pub fn seq_bits(&self) -> &[SeqBit] {
        &self.bits
    }

    /// Amount of stuff bits this very sequence needs, which is between 0 and
    /// [`max_amount_of_stuff_bits`] of its length.
    pub fn exact_amount_of_stuff_bits(&self) -> usize {
        let mut runs = RunTracker::default();

        self.iter().filter_map(|bit| runs.stuff_after(bit)).count()
    }

    pub fn exact_length_after_stuffing(&self) -> usize {
        self.len() + self.exact_amount_of_stuff_bits()
    }

    /// Returns a copy with a stuff bit of opposite value inserted after every
    /// run of five identical bits.
    ///
    /// ```text
    /// Input:    11111 0000
    /// Stuffing:      0    1
    /// Output:   11111000001
    /// ```
    ///
    /// Only fails with [`BitsError::AlreadyStuffed`]: the stuffed capacity
    /// covers the worst case of a full unstuffed sequence.
    pub fn apply_bit_stuffing(&self) -> Result<Self, BitsError> {
        if self.stuffed {
            return Err(BitsError::AlreadyStuffed);
        }

        let mut result = Self {
            bits: Vec::new(),
            stuffed: true,
        };
        let mut runs = RunTracker::default();

        for bit in self.iter() {
            result.push(SeqBit::new(bit, false))?;

            if let Some(stuff_bit) = runs.stuff_after(bit) {
                result.push(SeqBit::new(stuff_bit, true))?;
            }
        }

        Ok(result)
    }

    /// Returns a copy without the bits marked as stuff bits.
    ///
    /// A hand-written stuffed literal carries no marks and is returned as is,
    /// which fails with [`BitsError::CapacityExceeded`] if it is longer than
    /// [`MAX_BITS`].
    pub fn remove_bit_stuffing(&self) -> Result<Self, BitsError> {
        if !self.stuffed {
            return Err(BitsError::AlreadyUnstuffed);
        }

        let mut result = Self::empty();

        for bit in self.bits.iter().filter(|bit| !bit.is_stuff()) {
            result.push(*bit)?;
        }

        Ok(result)
    }
}

fn int_to_bit(value: u8) -> Result<SeqBit, BitsError> {
    match SeqBit::try_from(value)? {
        bit if bit.is_stuff() => Err(BitsError::UnsupportedValue(value)),
        bit => Ok(bit),
    }
}

/// Maximum amount of stuff bits that a sequence of `amount_of_bits` bits can
/// require, regardless of its content.
///
/// The worst case is a run of five identical bits followed by runs of four,
/// each of them completed into a run of five by the previous stuff bit.
pub const fn max_amount_of_stuff_bits(amount_of_bits: usize) -> usize {
    if amount_of_bits < 1 {
        0
    } else {
        (amount_of_bits - 1) / (STUFF_RUN_LENGTH - 1)
    }
}

pub const fn max_length_after_stuffing(amount_of_bits: usize) -> usize {
    amount_of_bits + max_amount_of_stuff_bits(amount_of_bits)
}

/// Counts runs of identical bits the way a CAN controller does: an inserted
/// stuff bit starts the next run.
#[derive(Debug, Default)]
struct RunTracker {
    previous: Option<bool>,
    run: usize,
}

impl RunTracker {
    /// Feeds the next bit, returning the stuff bit to insert after it, if any.
    fn stuff_after(&mut self, bit: bool) -> Option<bool> {
        if self.previous == Some(bit) {
            self.run += 1;
        } else {
            self.run = 1;
        }

        if self.run == STUFF_RUN_LENGTH {
            self.previous = Some(!bit);
            self.run = 1;
            Some(!bit)
        } else {
            self.previous = Some(bit);
            None
        }
    }
}

/// Equal when the bit values and the stuffed state match. Stuff marks are not
/// compared, so literal stuffed sequences compare equal to computed ones.
impl PartialEq for BitSequence {
    fn eq(&self, other: &Self) -> bool {
        self.stuffed == other.stuffed && self.iter().eq(other.iter())
    }
}

impl Eq for BitSequence {}

impl FromStr for BitSequence {
    type Err = BitsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Iterator over the values of a [`BitSequence`]
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Iter<'a>(#[cfg_attr(feature = "defmt", defmt(Debug2Format))] slice::Iter<'a, SeqBit>);

impl Iterator for Iter<'_> {
    type Item = bool;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|bit| bit.value())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0.next_back().map(|bit| bit.value())
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a BitSequence {
    type Item = bool;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
