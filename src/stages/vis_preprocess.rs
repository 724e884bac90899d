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

//! VIS-Preprocess: warp the raw visible-light frame onto IR geometry and
//! fan the result out to Fusion and the VIS output ring.
//!
//! Grounded on `preprocess_visual_thread` in `fusion.c`: `fifo_get(rawv_ring)`
//! -> `rm_regist_warp_image` -> `fifo_put(regt_ring)` + `fifo_put(vout_ring)`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::registration::InterpTables;
use crate::ring::Ring;

/// Spawn the VIS-Preprocess worker.
///
/// `rawv_ring` carries raw `unreg_w x unreg_h` YUV420 frames; `regt_ring`
/// and `vout_ring` each receive the warped `base_w x base_h` YUV420 frame.
/// The destination buffer is reused frame to frame and only partially
/// overwritten on each warp, so out-of-bounds pixels continue to show the
/// previous frame rather than stale garbage, matching `warp_image`'s
/// leave-untouched contract.
#[allow(clippy::too_many_arguments)]
pub fn spawn(
    unreg_w: u32,
    unreg_h: u32,
    base_w: u32,
    base_h: u32,
    raw_record_size: usize,
    warped_record_size: usize,
    tables: InterpTables,
    rawv_ring: Arc<Ring>,
    regt_ring: Arc<Ring>,
    vout_ring: Arc<Ring>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut raw_buf = vec![0u8; raw_record_size];
        let mut warped = vec![0u8; warped_record_size];

        while !stop.load(Ordering::Relaxed) {
            if !rawv_ring.get_record(&mut raw_buf) {
                thread::sleep(Duration::from_micros(200));
                continue;
            }

            crate::registration::warp_image(
                &tables, &raw_buf, unreg_w, unreg_h, base_w, base_h, &mut warped,
            );

            if !regt_ring.put_record(&warped) {
                log::debug!("vis_preprocess: regt_ring full, dropping frame");
            }
            if !vout_ring.put_record(&warped) {
                log::debug!("vis_preprocess: vout_ring full, dropping frame");
            }
        }
    })
}
