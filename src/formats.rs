// Copyright 2025 Dustin McAfee
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! IR output pixel formats and supported raw-frame resolutions.
//!
//! Mirrors `hiPIXEL_FORMAT_E`/`TStandardEx` in the original `RDC.c`, minus
//! the debug-from-file code path (`PIXEL_FORMAT_YUV_DEBUG = 88`), which
//! read a fixed `yuv.dat` off disk and is out of scope here.

use crate::error::{FusionError, Result};

const UV_FILLED_VALUE: u8 = 0x80;

/// Output pixel format for the IR-Preprocess stage's `ir_out` stream.
///
/// Numeric values match the device's `hiPIXEL_FORMAT_E` codes so a host
/// app configuring this crate from the same integer constants it already
/// uses for the camera driver gets the expected enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PixelFormat {
    /// YUV 4:2:2 semiplanar: full-resolution Y plane, full-resolution
    /// interleaved UV plane.
    YuvSemiplanar422 = 22,
    /// YUV 4:2:0 semiplanar: full-resolution Y plane, half-height
    /// interleaved UV plane.
    YuvSemiplanar420 = 23,
    /// Packed 8-bit RGB, 3 bytes per pixel.
    Rgb = 24,
    /// Packed 8-bit RGBA, 4 bytes per pixel (alpha is always 0).
    Rgba = 25,
}

impl PixelFormat {
    /// Decode a device format code, as used in `RDC_Init`'s `enVideoFmt`.
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            22 => Ok(PixelFormat::YuvSemiplanar422),
            23 => Ok(PixelFormat::YuvSemiplanar420),
            24 => Ok(PixelFormat::Rgb),
            25 => Ok(PixelFormat::Rgba),
            other => Err(FusionError::Config(format!(
                "unsupported pixel format code {other}"
            ))),
        }
    }

    /// Output byte length for a `width x height` Y8 source image.
    pub fn output_len(self, width: usize, height: usize) -> usize {
        let pixels = width * height;
        match self {
            PixelFormat::YuvSemiplanar422 => pixels * 2,
            PixelFormat::YuvSemiplanar420 => pixels * 3 / 2,
            PixelFormat::Rgb => pixels * 3,
            PixelFormat::Rgba => pixels * 4,
        }
    }

    /// Convert an 8-bit grayscale (Y8) source image to this format.
    /// `dst` must be at least `output_len(width, height)` bytes.
    pub fn convert_from_y8(self, src: &[u8], width: usize, height: usize, dst: &mut [u8]) {
        match self {
            PixelFormat::YuvSemiplanar422 => y8_to_yuv422(src, width, height, dst),
            PixelFormat::YuvSemiplanar420 => y8_to_yuv420(src, width, height, dst),
            PixelFormat::Rgb => y8_to_rgb(src, width, height, dst),
            PixelFormat::Rgba => y8_to_rgba(src, width, height, dst),
        }
    }
}

fn y8_to_yuv422(src: &[u8], width: usize, height: usize, dst: &mut [u8]) {
    let n = width * height;
    dst[..n].copy_from_slice(&src[..n]);
    for b in &mut dst[n..n * 2] {
        *b = UV_FILLED_VALUE;
    }
}

fn y8_to_yuv420(src: &[u8], width: usize, height: usize, dst: &mut [u8]) {
    let n = width * height;
    dst[..n].copy_from_slice(&src[..n]);
    let n_uv = width * (height / 2);
    for b in &mut dst[n..n + n_uv] {
        *b = UV_FILLED_VALUE;
    }
}

fn y8_to_rgb(src: &[u8], width: usize, height: usize, dst: &mut [u8]) {
    for (i, &y) in src[..width * height].iter().enumerate() {
        dst[3 * i] = y;
        dst[3 * i + 1] = y;
        dst[3 * i + 2] = y;
    }
}

fn y8_to_rgba(src: &[u8], width: usize, height: usize, dst: &mut [u8]) {
    for (i, &y) in src[..width * height].iter().enumerate() {
        dst[4 * i] = y;
        dst[4 * i + 1] = y;
        dst[4 * i + 2] = y;
        dst[4 * i + 3] = 0;
    }
}

/// Supported raw IR frame resolutions (`TStandardEx` codes 15/16).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Frame width in pixels.
    pub width: usize,
    /// Frame height in pixels.
    pub height: usize,
}

impl Resolution {
    /// The 384x288 raw frame resolution (`TStandardEx` code 15).
    pub const R384X288: Resolution = Resolution {
        width: 384,
        height: 288,
    };
    /// The 640x480 raw frame resolution (`TStandardEx` code 16).
    pub const R640X480: Resolution = Resolution {
        width: 640,
        height: 480,
    };

    /// Decode a device resolution code, as used in `RDC_Init`'s
    /// `enFrameResolution`.
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            15 => Ok(Resolution::R384X288),
            16 => Ok(Resolution::R640X480),
            other => Err(FusionError::Config(format!(
                "unsupported frame resolution code {other}"
            ))),
        }
    }

    /// Total pixel count.
    pub fn pixels(self) -> usize {
        self.width * self.height
    }

    /// Byte length of the raw (not yet recombined) frame: two bytes per
    /// 14-bit sample.
    pub fn raw_len(self) -> usize {
        self.pixels() * 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_codes_match_device_values() {
        assert_eq!(Resolution::from_code(15).unwrap(), Resolution::R384X288);
        assert_eq!(Resolution::from_code(16).unwrap(), Resolution::R640X480);
        assert!(Resolution::from_code(17).is_err());
    }

    #[test]
    fn pixel_format_codes_match_device_values() {
        assert_eq!(
            PixelFormat::from_code(22).unwrap(),
            PixelFormat::YuvSemiplanar422
        );
        assert_eq!(
            PixelFormat::from_code(23).unwrap(),
            PixelFormat::YuvSemiplanar420
        );
        assert!(PixelFormat::from_code(88).is_err());
    }

    #[test]
    fn yuv420_fills_neutral_chroma() {
        let src = vec![10u8; 4 * 4];
        let mut dst = vec![0u8; PixelFormat::YuvSemiplanar420.output_len(4, 4)];
        PixelFormat::YuvSemiplanar420.convert_from_y8(&src, 4, 4, &mut dst);
        assert!(dst[16..].iter().all(|&b| b == UV_FILLED_VALUE));
    }

    #[test]
    fn rgba_alpha_is_zero() {
        let src = vec![7u8; 2 * 2];
        let mut dst = vec![0u8; PixelFormat::Rgba.output_len(2, 2)];
        PixelFormat::Rgba.convert_from_y8(&src, 2, 2, &mut dst);
        for chunk in dst.chunks(4) {
            assert_eq!(chunk, [7, 7, 7, 0]);
        }
    }
}
