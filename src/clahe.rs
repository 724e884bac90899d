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

//! Raw IR recombine and global (single-tile) CLAHE.
//!
//! Grounded on `RDC.c`'s `RecombineRawFrame`/`CalHist`/`RearrangeHist`/
//! `ClipHist`/`StretchHist`/`CLAHE`. The recombine bit-packing here is the
//! 14-bit `(hi7<<7)|lo7` form the specification resolves the source's two
//! disagreeing code paths to (see DESIGN.md).

/// Recombine a raw byte buffer of 16-bit little-endian pairs into 14-bit
/// samples. `src.len()` must be even; the result has `src.len() / 2`
/// entries, each in `[0, 0x3FFF]`.
pub fn recombine(src: &[u8]) -> Vec<u16> {
    src.chunks_exact(2)
        .map(|pair| {
            let lo7 = (pair[0] & 0x7F) as u16;
            let hi7 = (pair[1] & 0x7F) as u16;
            (hi7 << 7) | lo7
        })
        .collect()
}

/// Histogram over `n_bins` raw 14-bit levels.
pub fn calc_hist(raw: &[u16], n_bins: usize) -> Vec<u64> {
    let mut hist = vec![0u64; n_bins];
    for &v in raw {
        hist[v as usize] += 1;
    }
    hist
}

/// Result of [`rearrange_hist`].
pub struct Rearranged {
    /// Densely packed histogram of kept bins, length `valid_bins`.
    pub rear_hist: Vec<u64>,
    /// Number of bins kept (never zero after this call — see below).
    pub valid_bins: usize,
    /// Sum of counts across the kept bins.
    pub valid_pixels: u64,
    /// `map[raw] -> index into rear_hist`, monotonically non-decreasing.
    pub map: Vec<u16>,
}

/// Collapse bins below `thresh` into their nearest kept neighbor and
/// densely pack the rest. If every bin is below threshold, `valid_bins`
/// is floored to 1 (spec.md §9: the source divides by `valid_bins` in the
/// clip step with no guard) with a single empty kept bin.
pub fn rearrange_hist(hist: &[u64], thresh: u64) -> Rearranged {
    let n_bins = hist.len();
    let mut map = vec![0u16; n_bins];
    let mut rear_hist = Vec::with_capacity(n_bins);
    let mut valid_bins = 0usize;
    let mut valid_pixels = 0u64;
    let mut max_valid_level = 0usize;

    for (i, &count) in hist.iter().enumerate() {
        if count < thresh {
            map[i] = valid_bins as u16;
            continue;
        }
        valid_bins += 1;
        rear_hist.push(count);
        map[i] = (valid_bins - 1) as u16;
        valid_pixels += count;
        max_valid_level = i;
    }

    for m in map.iter_mut().skip(max_valid_level + 1) {
        *m = valid_bins.saturating_sub(1) as u16;
    }

    if valid_bins == 0 {
        valid_bins = 1;
        rear_hist.push(0);
    }

    Rearranged {
        rear_hist,
        valid_bins,
        valid_pixels,
        map,
    }
}

/// Clip `rear_hist` (only its first `rear_hist.len()` entries, treated as
/// the valid-bins prefix) at `clip_level`, redistributing the excess.
pub fn clip_hist(rear_hist: &mut [u64], clip_level: u64) {
    let n_bins = rear_hist.len();
    if n_bins == 0 {
        return;
    }

    let mut n_clipped: u64 = rear_hist
        .iter()
        .map(|&v| v.saturating_sub(clip_level))
        .sum();

    let n_redist = n_clipped / n_bins as u64;
    let upper = clip_level.saturating_sub(n_redist);

    for v in rear_hist.iter_mut() {
        if *v > clip_level {
            *v = clip_level;
        } else if *v > upper {
            n_clipped -= clip_level - *v;
            *v = clip_level;
        } else {
            n_clipped -= n_redist;
            *v += n_redist;
        }
    }

    loop {
        let prev = n_clipped;
        let mut i = 0usize;
        while i < n_bins && n_clipped > 0 {
            let step = (n_clipped / n_bins as u64).max(1) as usize;
            let mut j = i;
            while j < n_bins && n_clipped > 0 {
                if rear_hist[j] < clip_level {
                    n_clipped -= 1;
                    rear_hist[j] += 1;
                }
                j += step;
            }
            i += 1;
        }
        if n_clipped == 0 || n_clipped >= prev {
            break;
        }
    }
}

/// Build the CDF-based stretch map from a (clipped) rearranged histogram
/// onto `[min, max]`.
pub fn stretch_hist(rear_hist: &[u64], min: u8, max: u8, n_pixels: u64) -> Vec<u8> {
    let mut stretch = Vec::with_capacity(rear_hist.len());
    let scale = (max as f64 - min as f64) / n_pixels.max(1) as f64;
    let mut accum = 0u64;
    for &count in rear_hist {
        accum += count;
        let val = (min as f64 + scale * accum as f64) as u32;
        stretch.push(val.min(max as u32) as u8);
    }
    stretch
}

/// Full CLAHE pass over one recombined 14-bit frame, producing an 8-bit
/// luminance image of the same pixel count.
pub struct Clahe {
    n_bins: usize,
    cut_thresh: u64,
    clip_limit: f64,
}

impl Clahe {
    /// Build a CLAHE stage from configuration constants.
    pub fn new(n_bins: usize, cut_thresh: u64, clip_limit: f64) -> Self {
        Clahe {
            n_bins,
            cut_thresh,
            clip_limit,
        }
    }

    /// Run the full histogram -> rearrange -> clip -> stretch -> apply
    /// pipeline on `raw` (already recombined 14-bit values), returning an
    /// 8-bit image.
    pub fn apply(&self, raw: &[u16], width: usize, height: usize) -> Vec<u8> {
        let n_pixels = (width * height) as u64;
        let hist = calc_hist(raw, self.n_bins);
        let Rearranged {
            mut rear_hist,
            valid_bins,
            valid_pixels,
            map,
        } = rearrange_hist(&hist, self.cut_thresh);

        let clip_level = (self.clip_limit * n_pixels as f64 / valid_bins as f64) as u64;
        clip_hist(&mut rear_hist, clip_level);

        let stretch = stretch_hist(&rear_hist, 0, 255, valid_pixels.max(1));

        raw.iter()
            .map(|&v| stretch[map[v as usize] as usize])
            .collect()
    }
}
