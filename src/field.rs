use core::fmt;

use num_enum::IntoPrimitive;

/// Logical state of the bus.
///
/// Dominant wins arbitration and is encoded as `0`, recessive is the idle
/// state and is encoded as `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Level {
    Dominant = 0,
    Recessive = 1,
}

impl From<Level> for bool {
    fn from(level: Level) -> Self {
        level == Level::Recessive
    }
}

impl From<bool> for Level {
    fn from(bit: bool) -> Self {
        if bit {
            Level::Recessive
        } else {
            Level::Dominant
        }
    }
}

/// Every field that can appear in a classic CAN data or remote frame, in
/// the order of transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FieldKind {
    StartOfFrame,
    /// The whole 11-bit identifier of a base frame
    Identifier,
    /// Bits 28..18 of an extended identifier
    IdentifierA,
    SubstituteRemoteRequest,
    IdentifierExtension,
    /// Bits 17..0 of an extended identifier
    IdentifierB,
    RemoteTransmissionRequest,
    Reserved1,
    Reserved0,
    DataLengthCode,
    DataField,
    Crc,
    CrcDelimiter,
    AckSlot,
    AckDelimiter,
    EndOfFrame,
    InterFrameSpace,
}

/// Field order of a base frame (11-bit identifier).
pub const BASE_LAYOUT: [FieldKind; 13] = [
    FieldKind::StartOfFrame,
    FieldKind::Identifier,
    FieldKind::RemoteTransmissionRequest,
    FieldKind::IdentifierExtension,
    FieldKind::Reserved0,
    FieldKind::DataLengthCode,
    FieldKind::DataField,
    FieldKind::Crc,
    FieldKind::CrcDelimiter,
    FieldKind::AckSlot,
    FieldKind::AckDelimiter,
    FieldKind::EndOfFrame,
    FieldKind::InterFrameSpace,
];

/// Field order of an extended frame (29-bit identifier).
pub const EXTENDED_LAYOUT: [FieldKind; 16] = [
    FieldKind::StartOfFrame,
    FieldKind::IdentifierA,
    FieldKind::SubstituteRemoteRequest,
    FieldKind::IdentifierExtension,
    FieldKind::IdentifierB,
    FieldKind::RemoteTransmissionRequest,
    FieldKind::Reserved1,
    FieldKind::Reserved0,
    FieldKind::DataLengthCode,
    FieldKind::DataField,
    FieldKind::Crc,
    FieldKind::CrcDelimiter,
    FieldKind::AckSlot,
    FieldKind::AckDelimiter,
    FieldKind::EndOfFrame,
    FieldKind::InterFrameSpace,
];

pub const CRC_FIELD_BITS: usize = 15;
pub const DLC_FIELD_BITS: usize = 4;
pub const BASE_ID_BITS: usize = 11;
pub const EXTENDED_ID_BITS: usize = 29;

impl FieldKind {
    /// Width in bits of the field, or `None` for the data field whose width
    /// depends on the payload.
    pub const fn fixed_width(self) -> Option<usize> {
        Some(match self {
            Self::StartOfFrame => 1,
            Self::Identifier => BASE_ID_BITS,
            Self::IdentifierA => 11,
            Self::SubstituteRemoteRequest => 1,
            Self::IdentifierExtension => 1,
            Self::IdentifierB => 18,
            Self::RemoteTransmissionRequest => 1,
            Self::Reserved1 => 1,
            Self::Reserved0 => 1,
            Self::DataLengthCode => DLC_FIELD_BITS,
            Self::DataField => return None,
            Self::Crc => CRC_FIELD_BITS,
            Self::CrcDelimiter => 1,
            Self::AckSlot => 1,
            Self::AckDelimiter => 1,
            Self::EndOfFrame => 7,
            Self::InterFrameSpace => 3,
        })
    }

    /// Whether bit stuffing applies to this field. Only the fields from the
    /// start of frame up to and including the CRC are stuffed.
    pub const fn is_stuffable(self) -> bool {
        !matches!(
            self,
            Self::CrcDelimiter
                | Self::AckSlot
                | Self::AckDelimiter
                | Self::EndOfFrame
                | Self::InterFrameSpace
        )
    }

    /// The level every bit of the field is fixed to, if any.
    ///
    /// IDE and RTR are not listed here as they depend on the frame format.
    pub const fn fixed_level(self) -> Option<Level> {
        match self {
            Self::StartOfFrame | Self::Reserved1 | Self::Reserved0 => Some(Level::Dominant),
            Self::SubstituteRemoteRequest
            | Self::CrcDelimiter
            | Self::AckSlot
            | Self::AckDelimiter
            | Self::EndOfFrame
            | Self::InterFrameSpace => Some(Level::Recessive),
            _ => None,
        }
    }

    /// Short protocol name of the field, e.g. `"SOF"`.
    pub const fn abbreviation(self) -> &'static str {
        match self {
            Self::StartOfFrame => "SOF",
            Self::Identifier => "ID",
            Self::IdentifierA => "IDA",
            Self::SubstituteRemoteRequest => "SRR",
            Self::IdentifierExtension => "IDE",
            Self::IdentifierB => "IDB",
            Self::RemoteTransmissionRequest => "RTR",
            Self::Reserved1 => "R1",
            Self::Reserved0 => "R0",
            Self::DataLengthCode => "DLC",
            Self::DataField => "DATA",
            Self::Crc => "CRC",
            Self::CrcDelimiter => "CRC DEL",
            Self::AckSlot => "ACK",
            Self::AckDelimiter => "ACK DEL",
            Self::EndOfFrame => "EOF",
            Self::InterFrameSpace => "IFS",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_bits(layout: &[FieldKind], stuffable: bool) -> usize {
        layout
            .iter()
            .filter(|kind| kind.is_stuffable() == stuffable)
            .filter_map(|kind| kind.fixed_width())
            .sum()
    }

    #[test]
    fn base_layout_widths() {
        // SOF + ID + RTR + IDE + R0 + DLC + CRC
        assert_eq!(fixed_bits(&BASE_LAYOUT, true), 19 + 15);
        // CRC delimiter + ACK slot + ACK delimiter + EOF + IFS
        assert_eq!(fixed_bits(&BASE_LAYOUT, false), 13);
    }

    #[test]
    fn extended_layout_widths() {
        assert_eq!(fixed_bits(&EXTENDED_LAYOUT, true), 39 + 15);
        assert_eq!(fixed_bits(&EXTENDED_LAYOUT, false), 13);
    }

    #[test]
    fn stuffable_fields_form_a_prefix() {
        for layout in [&BASE_LAYOUT[..], &EXTENDED_LAYOUT[..]] {
            let split = layout.iter().position(|kind| !kind.is_stuffable()).unwrap();
            assert_eq!(layout[split - 1], FieldKind::Crc);
            assert!(layout[split..].iter().all(|kind| !kind.is_stuffable()));
        }
    }

    #[test]
    fn levels() {
        assert!(!bool::from(Level::Dominant));
        assert!(bool::from(Level::Recessive));
        assert_eq!(Level::from(true), Level::Recessive);
        assert_eq!(u8::from(Level::Dominant), 0);
        assert_eq!(FieldKind::StartOfFrame.fixed_level(), Some(Level::Dominant));
        assert_eq!(FieldKind::EndOfFrame.fixed_level(), Some(Level::Recessive));
        assert_eq!(FieldKind::IdentifierExtension.fixed_level(), None);
    }

    #[test]
    fn abbreviations() {
        use core::fmt::Write;

        assert_eq!(FieldKind::StartOfFrame.abbreviation(), "SOF");
        assert_eq!(FieldKind::SubstituteRemoteRequest.abbreviation(), "SRR");
        assert_eq!(FieldKind::DataLengthCode.abbreviation(), "DLC");

        let mut rendered: heapless::String<16> = heapless::String::new();
        write!(rendered, "{}", FieldKind::CrcDelimiter).unwrap();
        assert_eq!(rendered, "CRC DEL");

        rendered.clear();
        write!(rendered, "{}|{}", FieldKind::IdentifierA, FieldKind::IdentifierB).unwrap();
        assert_eq!(rendered, "IDA|IDB");
    }
}
