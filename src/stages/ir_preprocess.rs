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

//! IR-Preprocess: recombine raw 16-bit words, run CLAHE, and fan the
//! resulting Y8 frame out to the background-reconstruction rings, the
//! gray-scale-compressed output ring, and the IR output ring.
//!
//! Grounded on `preprocess_infrared_thread` in `fusion.c`, which chains
//! `RDC_SendRawData`/`RDC_GetFrame` (here: [`crate::clahe::recombine`] +
//! [`crate::clahe::Clahe::apply`] + [`crate::formats::PixelFormat`]) into
//! `bkgreconst_put` and two output rings.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::clahe::Clahe;
use crate::formats::PixelFormat;
use crate::ring::Ring;

/// Spawn the IR-Preprocess worker.
///
/// `rawi_ring` carries `2*width*height`-byte raw frames; `gsci_ring` and
/// `iout_ring` each receive the same `output_format`-encoded Y8 frame;
/// `bkg_input_rings` are `BkgReconst`'s two input rings (cloned via
/// [`crate::stages::bkg_reconst::BkgReconst::input_rings`]).
#[allow(clippy::too_many_arguments)]
pub fn spawn(
    width: usize,
    height: usize,
    raw_record_size: usize,
    yuv_record_size: usize,
    bkg_image_size: usize,
    clahe: Clahe,
    output_format: PixelFormat,
    rawi_ring: Arc<Ring>,
    gsci_ring: Arc<Ring>,
    iout_ring: Arc<Ring>,
    bkg_input_rings: (Arc<Ring>, Arc<Ring>),
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let (bkg_infd, bkg_infm) = bkg_input_rings;
        let mut raw_buf = vec![0u8; raw_record_size];

        while !stop.load(Ordering::Relaxed) {
            if !rawi_ring.get_record(&mut raw_buf) {
                thread::sleep(Duration::from_micros(200));
                continue;
            }

            let raw14 = crate::clahe::recombine(&raw_buf[..width * height * 2]);
            let y8 = clahe.apply(&raw14, width, height);

            let mut out_frame = vec![0u8; yuv_record_size];
            output_format.convert_from_y8(&y8, width, height, &mut out_frame);

            if !gsci_ring.put_record(&out_frame) {
                log::debug!("ir_preprocess: gsci_ring full, dropping frame");
            }
            if !iout_ring.put_record(&out_frame) {
                log::debug!("ir_preprocess: iout_ring full, dropping frame");
            }

            let mut y8_padded = vec![0u8; bkg_image_size];
            y8_padded[..y8.len()].copy_from_slice(&y8);
            if !bkg_infd.put_record(&y8_padded) {
                log::debug!("ir_preprocess: bkgreconst infd ring full, dropping frame");
            }
            if !bkg_infm.put_record(&y8_padded) {
                log::debug!("ir_preprocess: bkgreconst infm ring full, dropping frame");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FusionConfig;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn recombine_and_clahe_feed_rings() {
        let width = 4usize;
        let height = 4usize;
        let config = FusionConfig::default();
        let clahe = Clahe::new(config.n_bins, config.cut_thresh, config.clip_limit);

        let mut raw = Vec::new();
        for _ in 0..width * height {
            raw.push(0x01);
            raw.push(0x00);
        }

        let raw_record_size = raw.len();
        let yuv_record_size = PixelFormat::YuvSemiplanar420.output_len(width, height);
        let bkg_image_size = (width * height).next_power_of_two();

        let rawi_ring = Arc::new(Ring::new(raw_record_size));
        let gsci_ring = Arc::new(Ring::new(yuv_record_size));
        let iout_ring = Arc::new(Ring::new(yuv_record_size));
        let bkg_infd = Arc::new(Ring::new(bkg_image_size));
        let bkg_infm = Arc::new(Ring::new(bkg_image_size));
        let stop = Arc::new(AtomicBool::new(false));

        assert!(rawi_ring.put_record(&raw));

        let handle = spawn(
            width,
            height,
            raw_record_size,
            yuv_record_size,
            bkg_image_size,
            clahe,
            PixelFormat::YuvSemiplanar420,
            Arc::clone(&rawi_ring),
            Arc::clone(&gsci_ring),
            Arc::clone(&iout_ring),
            (Arc::clone(&bkg_infd), Arc::clone(&bkg_infm)),
            Arc::clone(&stop),
        );

        let mut out = vec![0u8; yuv_record_size];
        let mut got = false;
        for _ in 0..200 {
            if gsci_ring.get_record(&mut out) {
                got = true;
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        stop.store(true, Ordering::Relaxed);
        let _ = handle.join();

        assert!(got);
        assert!(out[..width * height].iter().all(|&v| v == 255));
    }
}
