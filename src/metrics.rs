use num_enum::IntoPrimitive;

use crate::{CanFrame, ValidationError};

/// Share of `metadata_bits` in a frame of `data_bits + metadata_bits`, in
/// percent. An empty frame has no overhead.
pub fn overhead_percentage(data_bits: usize, metadata_bits: usize) -> f64 {
    let total = data_bits + metadata_bits;

    if total == 0 {
        return 0.0;
    }

    metadata_bits as f64 / total as f64 * 100.0
}

/// Seconds needed to send `total_bits` at `bitrate` bits per second.
pub fn transfer_time(total_bits: usize, bitrate: f64) -> f64 {
    total_bits as f64 / bitrate
}

/// Bits per second of useful data, or 0 if nothing was transferred.
pub fn effective_bitrate(data_bits: usize, transfer_time: f64) -> f64 {
    if transfer_time == 0.0 {
        return 0.0;
    }

    data_bits as f64 / transfer_time
}

/// Standard nominal bit rates of a classic CAN bus, in bits per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum NominalBitRate {
    /// 10 Kbit/s
    Rate10Kbit = 10_000,
    /// 20 Kbit/s
    Rate20Kbit = 20_000,
    /// 50 Kbit/s
    Rate50Kbit = 50_000,
    /// 83.3 Kbit/s
    Rate83_3Kbit = 83_333,
    /// 100 Kbit/s
    Rate100Kbit = 100_000,
    /// 125 Kbit/s
    Rate125Kbit = 125_000,
    /// 250 Kbit/s
    Rate250Kbit = 250_000,
    /// 500 Kbit/s
    #[default]
    Rate500Kbit = 500_000,
    /// 800 Kbit/s
    Rate800Kbit = 800_000,
    /// 1 Mbit/s
    Rate1Mbit = 1_000_000,
}

impl NominalBitRate {
    pub fn bits_per_second(self) -> u32 {
        self.into()
    }
}

impl From<NominalBitRate> for f64 {
    fn from(rate: NominalBitRate) -> Self {
        rate.bits_per_second().into()
    }
}

/// Overhead and timing of a single frame at a given bit rate.
///
/// Data is looked at in two ways: the payload alone, or the identifier
/// together with the payload. Everything else on the bus, stuff bits
/// included, counts as metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameMetrics {
    pub bitrate: f64,
    pub unstuffed_bits: usize,
    pub stuffed_bits: usize,
    pub stuff_bits: usize,
    /// Worst case over all frames of the same format and payload length
    pub max_bits: usize,
    /// Seconds to send the stuffed frame
    pub transfer_time: f64,
    /// Seconds to send the worst-case frame
    pub max_transfer_time: f64,
    pub payload_bits: usize,
    pub id_and_payload_bits: usize,
    pub payload_overhead: f64,
    pub id_and_payload_overhead: f64,
    pub payload_effective_bitrate: f64,
    pub id_and_payload_effective_bitrate: f64,
}

impl FrameMetrics {
    pub fn new(frame: &CanFrame, bitrate: impl Into<f64>) -> Result<Self, ValidationError> {
        let bitrate = bitrate.into();

        if !bitrate.is_finite() || bitrate <= 0.0 {
            return Err(ValidationError::InvalidBitrate(bitrate));
        }

        let unstuffed_bits = frame.whole_frame().len();
        let stuffed_bits = frame.whole_frame_stuffed().len();
        let max_bits = frame.max_length_after_stuffing();

        let payload_bits = frame.data_bit_length();
        let id_and_payload_bits = payload_bits + frame.id_bit_length();
        let seconds = transfer_time(stuffed_bits, bitrate);

        Ok(Self {
            bitrate,
            unstuffed_bits,
            stuffed_bits,
            stuff_bits: stuffed_bits - unstuffed_bits,
            max_bits,
            transfer_time: seconds,
            max_transfer_time: transfer_time(max_bits, bitrate),
            payload_bits,
            id_and_payload_bits,
            payload_overhead: overhead_percentage(payload_bits, stuffed_bits - payload_bits),
            id_and_payload_overhead: overhead_percentage(
                id_and_payload_bits,
                stuffed_bits - id_and_payload_bits,
            ),
            payload_effective_bitrate: effective_bitrate(payload_bits, seconds),
            id_and_payload_effective_bitrate: effective_bitrate(id_and_payload_bits, seconds),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Field;

    fn assert_close(actual: f64, expected: f64) {
        let tolerance = 1e-9 * if expected > 1.0 { expected } else { 1.0 };

        assert!(
            actual - expected < tolerance && expected - actual < tolerance,
            "{actual} != {expected}"
        );
    }

    #[test]
    fn overhead() {
        assert_close(overhead_percentage(0, 0), 0.0);
        assert_close(overhead_percentage(0, 47), 100.0);
        assert_close(overhead_percentage(64, 64), 50.0);
        assert_close(overhead_percentage(1, 3), 75.0);
        assert_close(overhead_percentage(10, 0), 0.0);
    }

    #[test]
    fn timing() {
        assert_close(transfer_time(100, 1_000_000.0), 100e-6);
        assert_close(transfer_time(0, 500_000.0), 0.0);
        assert_close(effective_bitrate(64, 128e-6), 500_000.0);
        assert_close(effective_bitrate(64, 0.0), 0.0);
    }

    #[test]
    fn nominal_bit_rates() {
        assert_eq!(NominalBitRate::Rate83_3Kbit.bits_per_second(), 83_333);
        assert_eq!(NominalBitRate::Rate1Mbit.bits_per_second(), 1_000_000);
        assert_eq!(NominalBitRate::default(), NominalBitRate::Rate500Kbit);
        assert_close(NominalBitRate::Rate125Kbit.into(), 125_000.0);
    }

    #[test]
    fn empty_base_frame() {
        let frame = CanFrame::new_base(0, &[]).unwrap();
        let metrics = FrameMetrics::new(&frame, NominalBitRate::Rate500Kbit).unwrap();

        assert_eq!(metrics.unstuffed_bits, 47);
        assert_eq!(metrics.stuffed_bits, 53);
        assert_eq!(metrics.stuff_bits, 6);
        assert_eq!(metrics.max_bits, 34 + 8 + 13);
        assert_close(metrics.transfer_time, 53.0 / 500_000.0);
        assert_close(metrics.max_transfer_time, 55.0 / 500_000.0);

        assert_eq!(metrics.payload_bits, 0);
        assert_eq!(metrics.id_and_payload_bits, 11);
        assert_close(metrics.payload_overhead, 100.0);
        assert_close(metrics.id_and_payload_overhead, 42.0 / 53.0 * 100.0);
        assert_close(metrics.payload_effective_bitrate, 0.0);
        assert_close(
            metrics.id_and_payload_effective_bitrate,
            11.0 / (53.0 / 500_000.0),
        );
    }

    #[test]
    fn full_base_frame() {
        let frame = CanFrame::new_base(0x133, &[0xFF, 0, 0, 0, 0, 0, 0, 0xFF]).unwrap();
        let metrics = FrameMetrics::new(&frame, 1_000_000.0).unwrap();

        assert_eq!(metrics.stuffed_bits, 123);
        assert_eq!(metrics.stuff_bits, 12);
        assert!(metrics.stuffed_bits <= metrics.max_bits);
        assert_close(metrics.transfer_time, 123e-6);
        assert_close(metrics.payload_overhead, 59.0 / 123.0 * 100.0);
        assert_close(metrics.id_and_payload_overhead, 48.0 / 123.0 * 100.0);
        assert_close(metrics.payload_effective_bitrate, 64.0 / 123e-6);
        assert_close(metrics.id_and_payload_effective_bitrate, 75.0 / 123e-6);
    }

    #[test]
    fn extended_frame_counts_the_long_identifier() {
        let frame = CanFrame::new_extended(0x1234567, &[0xDE, 0xAD]).unwrap();
        let metrics = FrameMetrics::new(&frame, NominalBitRate::Rate250Kbit).unwrap();

        assert_eq!(metrics.stuffed_bits, 86);
        assert_eq!(metrics.payload_bits, 16);
        assert_eq!(metrics.id_and_payload_bits, 45);
        assert_close(metrics.id_and_payload_overhead, 41.0 / 86.0 * 100.0);
    }

    #[test]
    fn invalid_bitrate() {
        let frame = CanFrame::new_base(0, &[]).unwrap();

        for bitrate in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = FrameMetrics::new(&frame, bitrate).unwrap_err();

            assert!(matches!(err, ValidationError::InvalidBitrate(_)));
            assert_eq!(err.field(), Field::Bitrate);
        }
    }
}
