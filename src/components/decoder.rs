//! Raw frame decoding.
//!
//! Converts a driver-owned [`RawFrameView`] into an owned, densely packed,
//! bit-normalized [`DecodedFrame`]. Pure computation: no locks, no I/O,
//! one output allocation. Runs on the driver's callback thread, so it must
//! never block.

use tracing::warn;

use crate::components::frame::{DecodedFrame, PixelFormat, RawFrameView, ReadoutDepth, SampleDepth};
use crate::error::DecodeError;

/// What to do with a pixel-format code outside the known table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownFormatPolicy {
    /// Treat the buffer as Mono8. Best effort: the image is likely wrong,
    /// but acquisition keeps running. Each fallback frame logs a warning.
    #[default]
    Mono8Fallback,
    /// Reject the frame with [`DecodeError::UnsupportedFormat`].
    Strict,
}

/// Decode one raw frame.
///
/// The copy is stride-aware: each source row may carry alignment padding
/// beyond `width * bytes_per_pixel`, which is stripped. For formats stored
/// as 16-bit samples, when the readout depth is below 16 bits every sample
/// is left-shifted by `16 - effective_bits` so the full `u16` range is
/// used regardless of sensor mode. 8-bit-sample formats are never shifted.
pub fn decode(
    raw: &RawFrameView<'_>,
    depth: ReadoutDepth,
    policy: UnknownFormatPolicy,
) -> Result<DecodedFrame, DecodeError> {
    if raw.data.is_empty() {
        return Err(DecodeError::EmptySource);
    }
    if raw.width == 0 || raw.height == 0 {
        return Err(DecodeError::EmptyDimensions {
            width: raw.width,
            height: raw.height,
        });
    }

    let format = match PixelFormat::from_code(raw.pixel_format) {
        Some(f) => f,
        None => match policy {
            UnknownFormatPolicy::Strict => {
                return Err(DecodeError::UnsupportedFormat(raw.pixel_format));
            }
            UnknownFormatPolicy::Mono8Fallback => {
                warn!(
                    code = format!("{:#010x}", raw.pixel_format),
                    "unknown pixel format, decoding as Mono8"
                );
                PixelFormat::Mono8
            }
        },
    };

    let (sample_depth, channels) = format.layout();
    let row_bytes = raw.width as usize * channels as usize * sample_depth.bytes();
    if raw.stride < row_bytes {
        return Err(DecodeError::StrideTooSmall {
            stride: raw.stride,
            row_bytes,
        });
    }

    let height = raw.height as usize;
    // The last row only needs row_bytes, not a full stride.
    let needed = (height.saturating_sub(1)) * raw.stride + row_bytes;
    if raw.data.len() < needed {
        return Err(DecodeError::SourceTruncated {
            needed,
            actual: raw.data.len(),
        });
    }

    let mut data = vec![0u8; row_bytes * height];
    for (row, dst) in data.chunks_exact_mut(row_bytes).enumerate() {
        let start = row * raw.stride;
        dst.copy_from_slice(&raw.data[start..start + row_bytes]);
    }

    if sample_depth == SampleDepth::U16 {
        let shift = 16 - depth.effective_bits();
        if shift > 0 {
            for sample in data.chunks_exact_mut(2) {
                let v = u16::from_le_bytes([sample[0], sample[1]]) << shift;
                sample.copy_from_slice(&v.to_le_bytes());
            }
        }
    }

    Ok(DecodedFrame {
        width: raw.width,
        height: raw.height,
        channels,
        sample_depth,
        data,
        block_id: raw.block_id,
        timestamp_ns: raw.timestamp_ns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono16_view(width: u32, height: u32, stride: usize, data: &[u8]) -> RawFrameView<'_> {
        RawFrameView {
            width,
            height,
            stride,
            pixel_format: PixelFormat::Mono16.code(),
            data,
            block_id: 7,
            timestamp_ns: 1_000,
        }
    }

    #[test]
    fn eleven_bit_samples_shift_left_by_five() {
        let data = 0x0123u16.to_le_bytes();
        let raw = mono16_view(1, 1, 2, &data);
        let frame = decode(&raw, ReadoutDepth::Bit11LowGain, UnknownFormatPolicy::default())
            .expect("decode");
        assert_eq!(frame.as_u16_slice(), Some(&[0x0123u16 << 5][..]));
    }

    #[test]
    fn twelve_bit_samples_shift_left_by_four() {
        let data = 0x0fffu16.to_le_bytes();
        let raw = mono16_view(1, 1, 2, &data);
        let frame = decode(&raw, ReadoutDepth::Bit12LowNoise, UnknownFormatPolicy::default())
            .expect("decode");
        assert_eq!(frame.as_u16_slice(), Some(&[0xfff0u16][..]));
    }

    #[test]
    fn sixteen_bit_is_a_pass_through_copy() {
        let data = 0xabcdu16.to_le_bytes();
        let raw = mono16_view(1, 1, 2, &data);
        let frame = decode(&raw, ReadoutDepth::Bit16HighDynamic, UnknownFormatPolicy::default())
            .expect("decode");
        assert_eq!(frame.as_u16_slice(), Some(&[0xabcdu16][..]));
        // Owned copy, not a view into the source.
        assert_eq!(frame.data.len(), 2);
    }

    #[test]
    fn stride_padding_is_stripped() {
        // 2x2 Mono8 with stride 4: two padding bytes per row.
        let data = [1u8, 2, 0xee, 0xee, 3, 4, 0xee, 0xee];
        let raw = RawFrameView {
            width: 2,
            height: 2,
            stride: 4,
            pixel_format: PixelFormat::Mono8.code(),
            data: &data,
            block_id: 0,
            timestamp_ns: 0,
        };
        let frame = decode(&raw, ReadoutDepth::Bit16HighDynamic, UnknownFormatPolicy::default())
            .expect("decode");
        assert_eq!(frame.data, vec![1, 2, 3, 4]);
        assert_eq!(frame.channels, 1);
        assert_eq!(frame.sample_depth, SampleDepth::U8);
    }

    #[test]
    fn readout_depth_governs_over_nominal_format_depth() {
        // Mono12 format code but an 11-bit readout mode: the mode wins.
        let data = 0x0001u16.to_le_bytes();
        let raw = RawFrameView {
            width: 1,
            height: 1,
            stride: 2,
            pixel_format: PixelFormat::Mono12.code(),
            data: &data,
            block_id: 0,
            timestamp_ns: 0,
        };
        let frame = decode(&raw, ReadoutDepth::Bit11HighGain, UnknownFormatPolicy::default())
            .expect("decode");
        assert_eq!(frame.as_u16_slice(), Some(&[1u16 << 5][..]));
    }

    #[test]
    fn eight_bit_formats_are_never_shifted() {
        let data = [200u8];
        let raw = RawFrameView {
            width: 1,
            height: 1,
            stride: 1,
            pixel_format: PixelFormat::Mono8.code(),
            data: &data,
            block_id: 0,
            timestamp_ns: 0,
        };
        let frame = decode(&raw, ReadoutDepth::Bit11LowGain, UnknownFormatPolicy::default())
            .expect("decode");
        assert_eq!(frame.data, vec![200]);
    }

    #[test]
    fn zero_sized_dimensions_rejected() {
        // A degenerate header with a non-empty buffer must be a counted
        // error, never a panic on the driver thread.
        let data = [1u8];
        let raw = mono16_view(0, 1, 1, &data);
        assert_eq!(
            decode(&raw, ReadoutDepth::Bit16HighDynamic, UnknownFormatPolicy::default()),
            Err(DecodeError::EmptyDimensions {
                width: 0,
                height: 1
            })
        );

        let raw = mono16_view(4, 0, 8, &data);
        assert_eq!(
            decode(&raw, ReadoutDepth::Bit16HighDynamic, UnknownFormatPolicy::default()),
            Err(DecodeError::EmptyDimensions {
                width: 4,
                height: 0
            })
        );
    }

    #[test]
    fn empty_source_rejected() {
        let raw = mono16_view(1, 1, 2, &[]);
        assert_eq!(
            decode(&raw, ReadoutDepth::Bit16HighDynamic, UnknownFormatPolicy::default()),
            Err(DecodeError::EmptySource)
        );
    }

    #[test]
    fn stride_smaller_than_row_rejected() {
        let data = [0u8; 8];
        let raw = mono16_view(4, 1, 2, &data);
        assert_eq!(
            decode(&raw, ReadoutDepth::Bit16HighDynamic, UnknownFormatPolicy::default()),
            Err(DecodeError::StrideTooSmall {
                stride: 2,
                row_bytes: 8
            })
        );
    }

    #[test]
    fn truncated_source_rejected() {
        let data = [0u8; 6];
        let raw = mono16_view(2, 2, 4, &data);
        assert_eq!(
            decode(&raw, ReadoutDepth::Bit16HighDynamic, UnknownFormatPolicy::default()),
            Err(DecodeError::SourceTruncated {
                needed: 8,
                actual: 6
            })
        );
    }

    #[test]
    fn unknown_format_falls_back_to_mono8() {
        let data = [9u8, 8];
        let raw = RawFrameView {
            width: 2,
            height: 1,
            stride: 2,
            pixel_format: 0xdead_beef,
            data: &data,
            block_id: 0,
            timestamp_ns: 0,
        };
        let frame = decode(&raw, ReadoutDepth::Bit16HighDynamic, UnknownFormatPolicy::Mono8Fallback)
            .expect("decode");
        assert_eq!(frame.data, vec![9, 8]);
        assert_eq!(frame.sample_depth, SampleDepth::U8);
    }

    #[test]
    fn unknown_format_rejected_when_strict() {
        let data = [9u8, 8];
        let raw = RawFrameView {
            width: 2,
            height: 1,
            stride: 2,
            pixel_format: 0xdead_beef,
            data: &data,
            block_id: 0,
            timestamp_ns: 0,
        };
        assert_eq!(
            decode(&raw, ReadoutDepth::Bit16HighDynamic, UnknownFormatPolicy::Strict),
            Err(DecodeError::UnsupportedFormat(0xdead_beef))
        );
    }

    #[test]
    fn rgb8_keeps_three_channels() {
        let data = [10u8, 20, 30, 40, 50, 60];
        let raw = RawFrameView {
            width: 2,
            height: 1,
            stride: 6,
            pixel_format: PixelFormat::Rgb8.code(),
            data: &data,
            block_id: 0,
            timestamp_ns: 0,
        };
        let frame = decode(&raw, ReadoutDepth::Bit16HighDynamic, UnknownFormatPolicy::default())
            .expect("decode");
        assert_eq!(frame.channels, 3);
        assert_eq!(frame.data, data.to_vec());
    }

    #[test]
    fn metadata_carried_over() {
        let data = 0x0010u16.to_le_bytes();
        let raw = mono16_view(1, 1, 2, &data);
        let frame = decode(&raw, ReadoutDepth::Bit16HighDynamic, UnknownFormatPolicy::default())
            .expect("decode");
        assert_eq!(frame.block_id, 7);
        assert_eq!(frame.timestamp_ns, 1_000);
    }
}
