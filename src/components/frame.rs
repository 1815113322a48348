//! Frame types and sensor format descriptors.
//!
//! Two frame representations with very different lifetimes:
//!
//! - [`RawFrameView`] borrows driver-owned memory and is only valid for the
//!   duration of one callback invocation. The borrow lifetime enforces the
//!   "copy before returning" contract at compile time.
//! - [`DecodedFrame`] owns a densely packed, bit-normalized buffer and can
//!   be retained indefinitely.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Ephemeral view of one driver-owned raw frame.
///
/// Handed to the registered frame handler on the driver's callback thread.
/// The backing memory is reclaimed by the driver as soon as the handler
/// returns, which is why this type borrows rather than owns.
#[derive(Debug, Clone, Copy)]
pub struct RawFrameView<'a> {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row stride in bytes. May exceed `width * bytes_per_pixel` due to
    /// hardware alignment.
    pub stride: usize,
    /// Vendor pixel-format code (see [`PixelFormat::from_code`]).
    pub pixel_format: u32,
    /// Driver-owned pixel data.
    pub data: &'a [u8],
    /// Monotonically increasing capture sequence id.
    pub block_id: u64,
    /// Capture timestamp, nanoseconds.
    pub timestamp_ns: u64,
}

/// Storage depth of one decoded sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleDepth {
    U8,
    U16,
}

impl SampleDepth {
    /// Bytes per sample.
    pub fn bytes(self) -> usize {
        match self {
            SampleDepth::U8 => 1,
            SampleDepth::U16 => 2,
        }
    }
}

/// Pixel formats the decoder understands.
///
/// Codes follow the GenICam SFNC encoding the sensor reports
/// (`0xAABBCCDD`: color space, nominal bit depth, channels, format id).
/// Mono10/12/16 arrive as 16-bit-per-sample buffers; Mono8 and the 8-bit
/// color formats as one byte per sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Mono8,
    Mono10,
    Mono12,
    Mono16,
    Rgb8,
    Bgr8,
}

impl PixelFormat {
    /// Look up a vendor format code. Returns `None` for codes outside the
    /// fixed table; the decoder's policy decides what happens then.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0x0108_0001 => Some(PixelFormat::Mono8),
            0x0110_0003 => Some(PixelFormat::Mono10),
            0x0110_0005 => Some(PixelFormat::Mono12),
            0x0110_0007 => Some(PixelFormat::Mono16),
            0x0218_0014 => Some(PixelFormat::Rgb8),
            0x0218_0015 => Some(PixelFormat::Bgr8),
            _ => None,
        }
    }

    /// The wire code for this format.
    pub fn code(self) -> u32 {
        match self {
            PixelFormat::Mono8 => 0x0108_0001,
            PixelFormat::Mono10 => 0x0110_0003,
            PixelFormat::Mono12 => 0x0110_0005,
            PixelFormat::Mono16 => 0x0110_0007,
            PixelFormat::Rgb8 => 0x0218_0014,
            PixelFormat::Bgr8 => 0x0218_0015,
        }
    }

    /// (sample storage depth, channel count) for this format.
    pub fn layout(self) -> (SampleDepth, u8) {
        match self {
            PixelFormat::Mono8 => (SampleDepth::U8, 1),
            PixelFormat::Mono10 | PixelFormat::Mono12 | PixelFormat::Mono16 => {
                (SampleDepth::U16, 1)
            }
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => (SampleDepth::U8, 3),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PixelFormat::Mono8 => "Mono8",
            PixelFormat::Mono10 => "Mono10",
            PixelFormat::Mono12 => "Mono12",
            PixelFormat::Mono16 => "Mono16",
            PixelFormat::Rgb8 => "RGB8",
            PixelFormat::Bgr8 => "BGR8",
        }
    }
}

/// The sensor's configured readout mode, which governs the *effective*
/// bit depth of delivered samples.
///
/// The effective depth can disagree with the nominal pixel-format depth;
/// when it does, the readout mode wins and determines the left-shift
/// normalization applied by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadoutDepth {
    /// Mode 0: 11-bit high-speed, low gain (bright scenes).
    Bit11LowGain,
    /// Mode 1: 11-bit high-speed, high gain (low light).
    Bit11HighGain,
    /// Mode 6: 12-bit correlated multi-sampling, low noise.
    Bit12LowNoise,
    /// Mode 7: 16-bit high dynamic range.
    Bit16HighDynamic,
}

impl ReadoutDepth {
    /// Map the device's `ReadoutMode` enum value. Unknown modes are treated
    /// as full 16-bit (no normalization), matching the device default.
    pub fn from_mode(mode: u64) -> Self {
        match mode {
            0 => ReadoutDepth::Bit11LowGain,
            1 => ReadoutDepth::Bit11HighGain,
            6 => ReadoutDepth::Bit12LowNoise,
            7 => ReadoutDepth::Bit16HighDynamic,
            _ => ReadoutDepth::Bit16HighDynamic,
        }
    }

    /// Effective sample depth in bits: 11, 12 or 16.
    pub fn effective_bits(self) -> u32 {
        match self {
            ReadoutDepth::Bit11LowGain | ReadoutDepth::Bit11HighGain => 11,
            ReadoutDepth::Bit12LowNoise => 12,
            ReadoutDepth::Bit16HighDynamic => 16,
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        match s {
            "11-bit low gain" => ReadoutDepth::Bit11LowGain,
            "11-bit high gain" => ReadoutDepth::Bit11HighGain,
            "12-bit low noise" => ReadoutDepth::Bit12LowNoise,
            _ => ReadoutDepth::Bit16HighDynamic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReadoutDepth::Bit11LowGain => "11-bit low gain",
            ReadoutDepth::Bit11HighGain => "11-bit high gain",
            ReadoutDepth::Bit12LowNoise => "12-bit low noise",
            ReadoutDepth::Bit16HighDynamic => "16-bit high dynamic",
        }
    }

    pub fn all_choices() -> Vec<String> {
        vec![
            "11-bit low gain".into(),
            "11-bit high gain".into(),
            "12-bit low noise".into(),
            "16-bit high dynamic".into(),
        ]
    }
}

/// One fully-owned, densely packed, bit-normalized image frame.
///
/// # Storage
/// `data` holds exactly `width * height * channels * sample_depth.bytes()`
/// bytes with no row padding. 16-bit samples are Little Endian; use
/// [`as_u16_slice`](Self::as_u16_slice) to access them safely.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Channels per pixel (1 for mono, 3 for RGB/BGR).
    pub channels: u8,
    /// Storage depth of each sample.
    pub sample_depth: SampleDepth,
    /// Packed pixel data.
    pub data: Vec<u8>,
    /// Capture sequence id carried over from the raw frame.
    pub block_id: u64,
    /// Capture timestamp carried over from the raw frame, nanoseconds.
    pub timestamp_ns: u64,
}

impl DecodedFrame {
    /// Expected byte length for the frame's dimensions and layout.
    pub fn expected_len(&self) -> usize {
        self.width as usize
            * self.height as usize
            * self.channels as usize
            * self.sample_depth.bytes()
    }

    /// Sample value at `(x, y)` for channel 0, widened to `u32`.
    /// Returns `None` out of bounds.
    pub fn sample(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * self.channels as usize;
        match self.sample_depth {
            SampleDepth::U8 => self.data.get(idx).map(|&v| u32::from(v)),
            SampleDepth::U16 => {
                let start = idx * 2;
                let lo = *self.data.get(start)?;
                let hi = *self.data.get(start + 1)?;
                Some(u32::from(u16::from_le_bytes([lo, hi])))
            }
        }
    }

    /// Access the data as a `u16` slice when samples are 16-bit.
    ///
    /// Returns `None` for 8-bit frames, odd-length buffers or (unlikely)
    /// misaligned allocations.
    pub fn as_u16_slice(&self) -> Option<&[u16]> {
        if self.sample_depth != SampleDepth::U16 || self.data.len() % 2 != 0 {
            return None;
        }

        // SAFETY: casting [u8] to [u16] is valid when alignment holds;
        // align_to reports any misaligned prefix/suffix, which we reject.
        #[allow(unsafe_code)]
        let (prefix, mid, suffix) = unsafe { self.data.align_to::<u16>() };
        if !prefix.is_empty() || !suffix.is_empty() {
            return None;
        }
        Some(mid)
    }

    /// Wrap into a shared handle for fan-out to multiple consumers.
    pub fn into_shared(self) -> Arc<DecodedFrame> {
        Arc::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_format_round_trip() {
        for fmt in [
            PixelFormat::Mono8,
            PixelFormat::Mono10,
            PixelFormat::Mono12,
            PixelFormat::Mono16,
            PixelFormat::Rgb8,
            PixelFormat::Bgr8,
        ] {
            assert_eq!(PixelFormat::from_code(fmt.code()), Some(fmt));
        }
        assert_eq!(PixelFormat::from_code(0xdead_beef), None);
    }

    #[test]
    fn readout_mode_mapping() {
        assert_eq!(ReadoutDepth::from_mode(0).effective_bits(), 11);
        assert_eq!(ReadoutDepth::from_mode(1).effective_bits(), 11);
        assert_eq!(ReadoutDepth::from_mode(6).effective_bits(), 12);
        assert_eq!(ReadoutDepth::from_mode(7).effective_bits(), 16);
        // Unknown modes default to 16-bit pass-through.
        assert_eq!(ReadoutDepth::from_mode(42).effective_bits(), 16);
    }

    #[test]
    fn sample_access_u16() {
        let frame = DecodedFrame {
            width: 2,
            height: 1,
            channels: 1,
            sample_depth: SampleDepth::U16,
            data: vec![0x34, 0x12, 0xff, 0xff],
            block_id: 0,
            timestamp_ns: 0,
        };
        assert_eq!(frame.sample(0, 0), Some(0x1234));
        assert_eq!(frame.sample(1, 0), Some(0xffff));
        assert_eq!(frame.sample(2, 0), None);
        assert_eq!(frame.as_u16_slice(), Some(&[0x1234u16, 0xffff][..]));
    }

    #[test]
    fn u16_slice_rejected_for_u8_frames() {
        let frame = DecodedFrame {
            width: 2,
            height: 1,
            channels: 1,
            sample_depth: SampleDepth::U8,
            data: vec![1, 2],
            block_id: 0,
            timestamp_ns: 0,
        };
        assert!(frame.as_u16_slice().is_none());
        assert_eq!(frame.sample(1, 0), Some(2));
    }
}
