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

//! Pipeline configuration.
//!
//! Replaces the process-global `dataConverter` and scattered file-scope
//! thresholds of the original implementation with one value, owned by the
//! caller and passed by reference to every stage at construction time.

/// Whether the fused output carries color chroma from the registered VIS
/// frame, or a neutral gray fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorStyle {
    /// U/V planes filled with neutral gray (0x80).
    Gray,
    /// U/V planes copied from the registered VIS frame.
    Color,
}

/// All tunables named in the external-interfaces configuration table.
#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// Number of in-flight records each ring can hold before a producer
    /// starts dropping frames.
    pub caches: usize,
    /// Quadtree: blobs no wider than this are never split further.
    pub min_blob_w: u32,
    /// Quadtree: blobs no taller than this are never split further.
    pub min_blob_h: u32,
    /// Quadtree: blobs with a pixel range at or below this are leaves.
    pub min_gray_range: u8,
    /// Minimum-filter kernel size (must be odd).
    pub minf_ksize: u32,
    /// Gaussian-filter kernel size (must be odd; 5 or 9 per spec).
    pub gauss_ksize: u32,
    /// Gaussian-filter sigma.
    pub gauss_sigma: f64,
    /// CLAHE histogram bin count (14-bit raw space: 16384).
    pub n_bins: usize,
    /// CLAHE: bins with fewer than this many counts are collapsed.
    pub cut_thresh: u64,
    /// CLAHE: clip-limit multiplier used to derive `clip_level`.
    pub clip_limit: f64,
    /// Bright-feature suppression ratio ceiling.
    pub ssr: f64,
    /// Bright-feature-pixel ratio used to derive the suppression
    /// threshold (`bp_thresh = floor(bpr * W * H)`).
    pub bpr: f64,
    /// Chroma policy for the fused output.
    pub color_style: ColorStyle,
}

impl Default for FusionConfig {
    fn default() -> Self {
        FusionConfig {
            caches: 4,
            min_blob_w: 12,
            min_blob_h: 9,
            min_gray_range: 78,
            minf_ksize: 11,
            gauss_ksize: 5,
            gauss_sigma: 4.5,
            n_bins: 16384,
            cut_thresh: 4,
            clip_limit: 1.0,
            ssr: 0.8,
            bpr: 0.001,
            color_style: ColorStyle::Gray,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let cfg = FusionConfig::default();
        assert_eq!(cfg.min_blob_w, 12);
        assert_eq!(cfg.min_blob_h, 9);
        assert_eq!(cfg.min_gray_range, 78);
        assert_eq!(cfg.minf_ksize, 11);
        assert_eq!(cfg.n_bins, 16384);
        assert_eq!(cfg.cut_thresh, 4);
        assert_eq!(cfg.color_style, ColorStyle::Gray);
    }
}
