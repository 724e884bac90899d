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

//! Fusion: composite the registered VIS frame and the suppressed IR
//! bright feature into one fused YUV420 frame.
//!
//! Grounded on `fusion_thread` and `suppress_bright_feature` in
//! `fusion.c`: bright feature extraction/refinement via
//! [`crate::imgops::subtract_kr`]/[`crate::imgops::add`], a 65536-bin
//! histogram-based suppression ratio, then overlay via
//! [`crate::imgops::add_kr`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::{ColorStyle, FusionConfig};
use crate::imgops::{add, add_kr, mul_s_kr, subtract_kr};
use crate::ring::Ring;

/// Histogram bin count, matching `ngls = 0xFFFF + 1` in `fusion.c`.
const NGLS: usize = 0x1_0000;

/// Derive the suppression ratio from the unsuppressed fused image's
/// brightness histogram and apply it to the refined bright feature.
///
/// `usfn` holds `width*height` widened (`u16`) unsuppressed fusion
/// values; `hist` is reused across calls like the original's
/// process-lifetime histogram buffer. Scans from the brightest bin down
/// until more than `bpr * npixels` pixels have been accounted for, then
/// sets the ratio to `min(255 / mean, ssr)`.
fn suppress_bright_feature(
    rfbf: &[u8],
    usfn: &[u16],
    hist: &mut [u32],
    ssr: f64,
    bpr: f64,
) -> Vec<u8> {
    let npixels = usfn.len();
    let bp_thresh = (bpr * npixels as f64) as u32;

    hist.iter_mut().for_each(|h| *h = 0);
    for &v in usfn {
        hist[v as usize] += 1;
    }

    let mut bpc: u32 = 0;
    let mut sum: f64 = 0.0;
    for i in (0..NGLS).rev() {
        let count = hist[i];
        if count == 0 {
            continue;
        }
        bpc += count;
        sum += count as f64 * i as f64;
        if bpc > bp_thresh {
            break;
        }
    }

    let mean = if bpc == 0 { 1.0 } else { sum / bpc as f64 };
    let sr = (255.0 / mean).min(ssr);

    mul_s_kr(rfbf, sr as f32)
}

/// Spawn the Fusion worker.
///
/// `gsci_ring`/`regt_ring` each carry `width*height*3/2`-byte YUV420
/// frames (only the Y plane, the first `width*height` bytes, is used in
/// the arithmetic); `bkg_ring` carries a `width*height`-byte
/// reconstructed background; `fusn_ring` receives the composited YUV420
/// frame and `brft_ring` the `width*height`-byte suppressed bright
/// feature.
#[allow(clippy::too_many_arguments)]
pub fn spawn(
    width: usize,
    height: usize,
    yuv_record_size: usize,
    bkg_record_size: usize,
    config: FusionConfig,
    gsci_ring: Arc<Ring>,
    regt_ring: Arc<Ring>,
    bkg_ring: Arc<Ring>,
    fusn_ring: Arc<Ring>,
    brft_ring: Arc<Ring>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let npixels = width * height;
        let mut gsci = vec![0u8; yuv_record_size];
        let mut regt = vec![0u8; yuv_record_size];
        let mut bkg = vec![0u8; bkg_record_size];
        let mut hist = vec![0u32; NGLS];
        let mut fusn = vec![0u8; yuv_record_size];

        while !stop.load(Ordering::Relaxed) {
            if !gsci_ring.get_record(&mut gsci) {
                thread::sleep(Duration::from_micros(200));
                continue;
            }
            if !regt_ring.get_record(&mut regt) {
                thread::sleep(Duration::from_micros(200));
                continue;
            }
            if !bkg_ring.get_record(&mut bkg) {
                thread::sleep(Duration::from_micros(200));
                continue;
            }

            let gsci_y = &gsci[..npixels];
            let regt_y = &regt[..npixels];
            let bkg_y = &bkg[..npixels];

            let bright = subtract_kr(gsci_y, bkg_y);
            let est_bg = subtract_kr(regt_y, gsci_y);
            let refined_bright = subtract_kr(&bright, &est_bg);
            let unsuppressed = add(regt_y, &refined_bright);

            let suppressed_bright = suppress_bright_feature(
                &refined_bright,
                &unsuppressed,
                &mut hist,
                config.ssr,
                config.bpr,
            );

            let fused_y = add_kr(regt_y, &suppressed_bright);
            fusn[..npixels].copy_from_slice(&fused_y);

            match config.color_style {
                ColorStyle::Color => {
                    fusn[npixels..].copy_from_slice(&regt[npixels..]);
                }
                ColorStyle::Gray => {
                    fusn[npixels..].iter_mut().for_each(|b| *b = 0x80);
                }
            }

            if !fusn_ring.put_record(&fusn) {
                log::debug!("fusion_stage: fusn_ring full, dropping frame");
            }
            if !brft_ring.put_record(&suppressed_bright) {
                log::debug!("fusion_stage: brft_ring full, dropping frame");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppression_ratio_is_capped_by_ssr() {
        let width = 4usize;
        let height = 4usize;
        let npixels = width * height;
        let rfbf = vec![100u8; npixels];
        let usfn = vec![10u16; npixels];
        let mut hist = vec![0u32; NGLS];

        let out = suppress_bright_feature(&rfbf, &usfn, &mut hist, 0.8, 0.001);
        assert!(out.iter().all(|&v| v <= 100));
    }

    #[test]
    fn uniform_frames_fuse_without_panic() {
        let width = 8usize;
        let height = 8usize;
        let npixels = width * height;
        let yuv_record_size = npixels * 3 / 2;
        let bkg_record_size = npixels.next_power_of_two();

        let mut gsci = vec![120u8; yuv_record_size];
        gsci[npixels..].iter_mut().for_each(|b| *b = 128);
        let mut regt = vec![140u8; yuv_record_size];
        regt[npixels..].iter_mut().for_each(|b| *b = 128);
        let bkg = vec![100u8; bkg_record_size];

        let gsci_ring = Arc::new(Ring::new(yuv_record_size));
        let regt_ring = Arc::new(Ring::new(yuv_record_size));
        let bkg_ring = Arc::new(Ring::new(bkg_record_size));
        let fusn_ring = Arc::new(Ring::new(yuv_record_size));
        let brft_ring = Arc::new(Ring::new(npixels.next_power_of_two()));
        let stop = Arc::new(AtomicBool::new(false));

        assert!(gsci_ring.put_record(&gsci));
        assert!(regt_ring.put_record(&regt));
        assert!(bkg_ring.put_record(&bkg));

        let config = FusionConfig::default();
        let handle = spawn(
            width,
            height,
            yuv_record_size,
            bkg_record_size,
            config,
            Arc::clone(&gsci_ring),
            Arc::clone(&regt_ring),
            Arc::clone(&bkg_ring),
            Arc::clone(&fusn_ring),
            Arc::clone(&brft_ring),
            Arc::clone(&stop),
        );

        let mut out = vec![0u8; yuv_record_size];
        let mut got = false;
        for _ in 0..200 {
            if fusn_ring.get_record(&mut out) {
                got = true;
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        stop.store(true, Ordering::Relaxed);
        let _ = handle.join();

        assert!(got);
        assert!(out[npixels..].iter().all(|&v| v == 0x80));
    }
}
