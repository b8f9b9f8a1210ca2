use embedded_can::{ExtendedId, Id, StandardId};

use crate::{
    bits::{max_length_after_stuffing, BitSequence},
    crc::crc15,
    field::{FieldKind, BASE_ID_BITS, BASE_LAYOUT, EXTENDED_ID_BITS, EXTENDED_LAYOUT},
    MAX_PAYLOAD_BYTES,
};

/// The user input a [`ValidationError`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Field {
    Identifier,
    Payload,
    Dlc,
    Bitrate,
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ValidationError {
    #[error("Identifier ({0:#X}) is out of the valid range of a base frame (0..=0x7FF)")]
    StandardIdOutOfRange(u32),
    #[error("Identifier ({0:#X}) is out of the valid range of an extended frame (0..=0x1FFFFFFF)")]
    ExtendedIdOutOfRange(u32),
    #[error("Payload of ({0:?}) bytes is longer than the valid range (0..=8)")]
    PayloadTooLong(usize),
    #[error("DLC ({0:?}) is out of the valid range (0..=8)")]
    DlcOutOfRange(usize),
    #[error("Bitrate ({0:?}) must be a finite, positive amount of bits per second")]
    InvalidBitrate(f64),
}

impl ValidationError {
    pub fn field(&self) -> Field {
        match self {
            Self::StandardIdOutOfRange(_) | Self::ExtendedIdOutOfRange(_) => Field::Identifier,
            Self::PayloadTooLong(_) => Field::Payload,
            Self::DlcOutOfRange(_) => Field::Dlc,
            Self::InvalidBitrate(_) => Field::Bitrate,
        }
    }
}

/// A classic CAN data or remote frame, with either a base (11-bit) or an
/// extended (29-bit) identifier.
///
/// The frame only stores its identifier and payload. Every field and the
/// whole frame are built as [`BitSequence`]s on request.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanFrame {
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    id: Id,
    dlc: usize,
    data: Option<[u8; MAX_PAYLOAD_BYTES]>,
}

impl CanFrame {
    /// Creates a data frame with an 11-bit identifier.
    pub fn new_base(id: u32, payload: &[u8]) -> Result<Self, ValidationError> {
        let standard_id = u16::try_from(id)
            .ok()
            .and_then(StandardId::new)
            .ok_or(ValidationError::StandardIdOutOfRange(id))?;

        Self::new_data(standard_id, payload)
    }

    /// Creates a data frame with a 29-bit identifier.
    pub fn new_extended(id: u32, payload: &[u8]) -> Result<Self, ValidationError> {
        let extended_id = ExtendedId::new(id).ok_or(ValidationError::ExtendedIdOutOfRange(id))?;

        Self::new_data(extended_id, payload)
    }

    /// Creates a data frame. `payload` must be at most 8 bytes long.
    pub fn new_data(id: impl Into<Id>, payload: &[u8]) -> Result<Self, ValidationError> {
        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(ValidationError::PayloadTooLong(payload.len()));
        }

        let mut copy = [0u8; MAX_PAYLOAD_BYTES];
        copy[..payload.len()].copy_from_slice(payload);

        Ok(Self {
            id: id.into(),
            dlc: payload.len(),
            data: Some(copy),
        })
    }

    /// Creates a remote frame requesting `dlc` bytes. `dlc` must be in the
    /// range 0..=8.
    pub fn new_remote(id: impl Into<Id>, dlc: usize) -> Result<Self, ValidationError> {
        if dlc > MAX_PAYLOAD_BYTES {
            return Err(ValidationError::DlcOutOfRange(dlc));
        }

        Ok(Self {
            id: id.into(),
            dlc,
            data: None,
        })
    }

    /// Copies any other [`embedded_can::Frame`] implementation.
    pub fn from_frame<F: embedded_can::Frame>(frame: &F) -> Result<Self, ValidationError> {
        if frame.is_remote_frame() {
            Self::new_remote(frame.id(), frame.dlc())
        } else {
            Self::new_data(frame.id(), frame.data())
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    /// The identifier as a plain integer
    pub fn raw_id(&self) -> u32 {
        match self.id {
            Id::Standard(id) => id.as_raw().into(),
            Id::Extended(id) => id.as_raw(),
        }
    }

    pub fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    pub fn is_remote(&self) -> bool {
        self.data.is_none()
    }

    /// Gets the DLC (Data Length Code) of the frame
    pub fn dlc(&self) -> usize {
        self.dlc
    }

    /// Gets the data associated with the frame. Will return `None` if it is an
    /// RTR frame.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_ref().map(|d| &d[..self.dlc])
    }

    /// The transmitted payload, empty for remote frames.
    pub fn payload(&self) -> &[u8] {
        self.data().unwrap_or_default()
    }

    /// Write access to the payload bytes. Its length is fixed.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        match self.data.as_mut() {
            Some(data) => &mut data[..self.dlc],
            None => &mut [],
        }
    }

    /// The fields of this frame in order of transmission.
    pub fn layout(&self) -> &'static [FieldKind] {
        match self.id {
            Id::Standard(_) => &BASE_LAYOUT,
            Id::Extended(_) => &EXTENDED_LAYOUT,
        }
    }

    pub fn id_bit_length(&self) -> usize {
        match self.id {
            Id::Standard(_) => BASE_ID_BITS,
            Id::Extended(_) => EXTENDED_ID_BITS,
        }
    }

    /// Bits of the data field, 0 for remote frames.
    pub fn data_bit_length(&self) -> usize {
        self.payload().len() * 8
    }

    /// Width of `kind` in this frame, `None` if the frame has no such field.
    pub fn field_width(&self, kind: FieldKind) -> Option<usize> {
        if !self.layout().contains(&kind) {
            return None;
        }

        Some(kind.fixed_width().unwrap_or_else(|| self.data_bit_length()))
    }

    /// Builds a single field, `None` if the frame has no such field (e.g.
    /// [`FieldKind::IdentifierB`] of a base frame).
    pub fn field(&self, kind: FieldKind) -> Option<BitSequence> {
        let width = self.field_width(kind)?;
        // Only fixed-width fields, the widest being 18 bits, are built from
        // integers
        let uint_field = |value: u32| BitSequence::from_uint(value, width as u8);

        Some(match kind {
            FieldKind::Identifier | FieldKind::IdentifierB => uint_field(self.raw_id()),
            FieldKind::IdentifierA => {
                uint_field(self.raw_id() >> FieldKind::IdentifierB.fixed_width()?)
            }
            FieldKind::IdentifierExtension => BitSequence::repeat(self.is_extended().into(), width),
            FieldKind::RemoteTransmissionRequest => BitSequence::repeat(self.is_remote().into(), width),
            FieldKind::DataLengthCode => uint_field(self.dlc as u32),
            FieldKind::DataField => self.data_field(),
            FieldKind::Crc => uint_field(self.crc()),
            other => BitSequence::repeat(other.fixed_level()?, width),
        })
    }

    fn data_field(&self) -> BitSequence {
        let mut bits = BitSequence::empty();

        for &byte in self.payload() {
            bits.append(&BitSequence::from_uint(byte.into(), 8));
        }

        bits
    }

    /// The 15-bit CRC over all the fields preceding the CRC field.
    pub fn crc(&self) -> u32 {
        let mut preceding = BitSequence::empty();

        for &kind in self.layout().iter().take_while(|&&kind| kind != FieldKind::Crc) {
            if let Some(bits) = self.field(kind) {
                preceding.append(&bits);
            }
        }

        crc15(&preceding)
    }

    /// All the fields with their kind, in order of transmission.
    pub fn fields(&self) -> impl Iterator<Item = (FieldKind, BitSequence)> + '_ {
        self.layout()
            .iter()
            .filter_map(move |&kind| self.field(kind).map(|bits| (kind, bits)))
    }

    /// The whole frame without stuff bits.
    pub fn whole_frame(&self) -> BitSequence {
        let mut frame = BitSequence::empty();

        for (_, bits) in self.fields() {
            frame.append(&bits);
        }

        frame
    }

    /// The whole frame as transmitted: stuff bits are inserted from the start
    /// of frame up to the CRC, the trailer after it is appended as is.
    pub fn whole_frame_stuffed(&self) -> BitSequence {
        let mut stuffable = BitSequence::empty();
        let mut trailer = BitSequence::empty();

        for (kind, bits) in self.fields() {
            if kind.is_stuffable() {
                stuffable.append(&bits);
            } else {
                trailer.append(&bits);
            }
        }

        let mut frame = stuffable
            .apply_bit_stuffing()
            .expect("A freshly built frame is unstuffed");
        frame.append(&trailer);

        frame
    }

    fn bit_length_where(&self, stuffable: bool) -> usize {
        self.layout()
            .iter()
            .filter(|kind| kind.is_stuffable() == stuffable)
            .filter_map(|&kind| self.field_width(kind))
            .sum()
    }

    /// Bits from the start of frame up to and including the CRC.
    pub fn stuffable_bit_length(&self) -> usize {
        self.bit_length_where(true)
    }

    /// Bits after the CRC, which are never stuffed.
    pub fn trailer_bit_length(&self) -> usize {
        self.bit_length_where(false)
    }

    /// Worst-case length of the whole frame after stuffing, over all frames
    /// with the same format and payload length.
    pub fn max_length_after_stuffing(&self) -> usize {
        max_length_after_stuffing(self.stuffable_bit_length()) + self.trailer_bit_length()
    }
}

impl embedded_can::Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        Self::new_data(id, data).ok()
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        CanFrame::new_remote(id, dlc).ok()
    }

    fn is_extended(&self) -> bool {
        CanFrame::is_extended(self)
    }

    fn is_remote_frame(&self) -> bool {
        self.is_remote()
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        self.dlc
    }

    fn data(&self) -> &[u8] {
        self.payload()
    }
}
