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

//! Minimum filter and direct-convolution Gaussian blur.
//!
//! Grounded on `minfilter.c`'s `min_filter` and `gaussfilter.c`'s
//! `gauss_filter_nsu`, which is the normative scalar path — the IIR
//! Deriche-recurrence SSE variant behind `gauss_filter`'s `#if 0` is not
//! carried forward (spec.md §4.4, §9).

/// 2-D minimum filter with edge replication.
///
/// `ksize` must be odd. Interior pixels take the min over a
/// `(2*krad+1)^2` window; the `krad`-pixel border is filled by
/// replicating the nearest interior row, then the nearest interior
/// column.
pub fn min_filter(image: &[u8], width: u32, height: u32, ksize: u32) -> Vec<u8> {
    let krad = ksize / 2;
    let w = width as usize;
    let h = height as usize;
    let mut out = vec![0u8; w * h];

    for y in krad..height - krad {
        for x in krad..width - krad {
            let mut minv = 0xFFu8;
            for ky in y - krad..=y + krad {
                for kx in x - krad..=x + krad {
                    minv = minv.min(image[(ky as usize) * w + kx as usize]);
                }
            }
            out[y as usize * w + x as usize] = minv;
        }
    }

    replicate_border(&mut out, width, height, krad);
    out
}

/// Separable-by-construction 2-D Gaussian blur, applied as a direct
/// convolution (not separated into two 1-D passes, matching the source's
/// `gauss_filter_nsu`). `ksize` must be odd (5 or 9 per configuration).
pub fn gauss_filter(image: &[u8], width: u32, height: u32, ksize: u32, sigma: f64) -> Vec<u8> {
    let krad = ksize / 2;
    let w = width as usize;
    let h = height as usize;
    let kernel = gauss_kernel(ksize, sigma);
    let mut out = vec![0u8; w * h];

    for y in krad..height - krad {
        for x in krad..width - krad {
            let mut sum = 0.0f64;
            let mut i = 0usize;
            for ky in y - krad..=y + krad {
                for kx in x - krad..=x + krad {
                    sum += image[(ky as usize) * w + kx as usize] as f64 * kernel[i];
                    i += 1;
                }
            }
            out[y as usize * w + x as usize] = sum as u8;
        }
    }

    replicate_border(&mut out, width, height, krad);
    out
}

/// Build a normalized Gaussian kernel of `ksize x ksize` taps, flattened
/// row-major. Separate from [`gauss_filter`] so tests can check
/// normalization directly.
pub fn gauss_kernel(ksize: u32, sigma: f64) -> Vec<f64> {
    let krad = (ksize / 2) as f64;
    let mut kernel = vec![0.0f64; (ksize * ksize) as usize];
    let mut sum = 0.0f64;

    for y in 0..ksize {
        for x in 0..ksize {
            let dx = x as f64 - krad;
            let dy = y as f64 - krad;
            let mut kval = (-(dx * dx + dy * dy) / 2.0 / sigma / sigma).exp();
            kval /= (2.0 * std::f64::consts::PI).sqrt() * sigma;
            kernel[(y * ksize + x) as usize] = kval;
            sum += kval;
        }
    }

    for k in kernel.iter_mut() {
        *k /= sum;
    }

    kernel
}

fn replicate_border(buf: &mut [u8], width: u32, height: u32, krad: u32) {
    let w = width as usize;
    let h = height as usize;
    let krad = krad as usize;
    if krad == 0 {
        return;
    }

    let top_row: Vec<u8> = buf[krad * w..(krad + 1) * w].to_vec();
    for y in 0..krad {
        buf[y * w..(y + 1) * w].copy_from_slice(&top_row);
    }

    let bottom_src = h - krad - 1;
    let bottom_row: Vec<u8> = buf[bottom_src * w..(bottom_src + 1) * w].to_vec();
    for y in h - krad..h {
        buf[y * w..(y + 1) * w].copy_from_slice(&bottom_row);
    }

    for y in 0..h {
        let row_start = y * w;
        let left_fill = buf[row_start + krad];
        let right_fill = buf[row_start + w - krad - 1];
        for x in 0..krad {
            buf[row_start + x] = left_fill;
        }
        for x in w - krad..w {
            buf[row_start + x] = right_fill;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_sums_to_one() {
        let kernel = gauss_kernel(5, 4.5);
        let sum: f64 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn min_filter_uniform_image_is_unchanged() {
        let image = vec![77u8; 32 * 32];
        let out = min_filter(&image, 32, 32, 11);
        assert!(out.iter().all(|&v| v == 77));
    }

    #[test]
    fn min_filter_picks_minimum_in_window() {
        let mut image = vec![200u8; 32 * 32];
        image[16 * 32 + 16] = 3;
        let out = min_filter(&image, 32, 32, 11);
        assert_eq!(out[16 * 32 + 16], 3);
        // a neighbor within radius 5 also sees the minimum.
        assert_eq!(out[16 * 32 + 18], 3);
    }

    #[test]
    fn gauss_filter_uniform_image_is_unchanged() {
        let image = vec![100u8; 32 * 32];
        let out = gauss_filter(&image, 32, 32, 5, 4.5);
        for y in 5..27 {
            for x in 5..27 {
                assert_eq!(out[y * 32 + x], 100);
            }
        }
    }

    #[test]
    fn border_is_replicated_not_zero() {
        let image = vec![50u8; 16 * 16];
        let out = min_filter(&image, 16, 16, 5);
        assert_eq!(out[0], 50);
        assert_eq!(out[15 * 16 + 15], 50);
    }
}
