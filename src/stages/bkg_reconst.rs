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

//! Background reconstruction: minimum filter + quadtree decomposition feed
//! a Bezier interpolation pass, followed by a Gaussian blur.
//!
//! Grounded on `bkgreconstruct.c`: three worker threads
//! (`minimum_filter_thread`, `quadtree_decomp_thread`, `bkgreconst_thread`)
//! coupled by five internal rings (`infd_ring`/`infm_ring`/`blob_ring`/
//! `minf_ring`/`gfbr_ring`). These rings are private to this stage — they
//! are not among the eight top-level rings in spec.md §2/§6.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::bezier::bezier_interpolate;
use crate::config::FusionConfig;
use crate::filters::{gauss_filter, min_filter};
use crate::quadtree::{Blob, Quadrant, Quadtree};
use crate::ring::Ring;

use super::roundup_power_of_2;

const BLOB_RECORD_LEN: usize = 17; // 4 u32 + 1 u8

fn serialize_blobs(blobs: &[Blob], record_count: usize, out: &mut [u8]) {
    out.fill(0);
    out[0..4].copy_from_slice(&(blobs.len().min(record_count) as u32).to_le_bytes());
    let mut off = 4;
    for blob in blobs.iter().take(record_count) {
        out[off..off + 4].copy_from_slice(&blob.quad.top.to_le_bytes());
        out[off + 4..off + 8].copy_from_slice(&blob.quad.left.to_le_bytes());
        out[off + 8..off + 12].copy_from_slice(&blob.quad.bottom.to_le_bytes());
        out[off + 12..off + 16].copy_from_slice(&blob.quad.right.to_le_bytes());
        out[off + 16] = blob.range;
        off += BLOB_RECORD_LEN;
    }
}

fn deserialize_blobs(buf: &[u8]) -> Vec<Blob> {
    let count = u32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
    let mut blobs = Vec::with_capacity(count);
    let mut off = 4;
    for _ in 0..count {
        let top = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        let left = u32::from_le_bytes(buf[off + 4..off + 8].try_into().unwrap());
        let bottom = u32::from_le_bytes(buf[off + 8..off + 12].try_into().unwrap());
        let right = u32::from_le_bytes(buf[off + 12..off + 16].try_into().unwrap());
        let range = buf[off + 16];
        blobs.push(Blob {
            quad: Quadrant {
                top,
                left,
                bottom,
                right,
            },
            range,
        });
        off += BLOB_RECORD_LEN;
    }
    blobs
}

/// Background-reconstruction component: owns its internal rings and the
/// three worker threads, exposing `put`/`get` like `bkgreconst_put`/
/// `bkgreconst_get`.
pub struct BkgReconst {
    width: u32,
    height: u32,
    image_size: usize,
    blob_size: usize,
    mnbpi: usize,
    minf_ksize: u32,
    gauss_ksize: u32,
    gauss_sigma: f64,
    min_blob_w: u32,
    min_blob_h: u32,
    min_gray_range: u8,
    infd_ring: Arc<Ring>,
    infm_ring: Arc<Ring>,
    blob_ring: Arc<Ring>,
    minf_ring: Arc<Ring>,
    gfbr_ring: Arc<Ring>,
    stop: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl BkgReconst {
    /// Allocate rings and scratch state sized for a `width x height` IR
    /// image, per `config`'s quadtree/filter tunables. Does not start the
    /// worker threads — call [`BkgReconst::start`] for that.
    pub fn new(width: u32, height: u32, config: &FusionConfig) -> Self {
        let image_size = roundup_power_of_2((width * height) as usize).max(1);
        let mnbpi = ((width * height) as usize
            / (config.min_blob_w.max(1) * config.min_blob_h.max(1)) as usize)
            .max(1);
        let blob_size = roundup_power_of_2(4 + mnbpi * BLOB_RECORD_LEN).max(1);
        let caches = config.caches.max(1);

        BkgReconst {
            width,
            height,
            image_size,
            blob_size,
            mnbpi,
            minf_ksize: config.minf_ksize,
            gauss_ksize: config.gauss_ksize,
            gauss_sigma: config.gauss_sigma,
            min_blob_w: config.min_blob_w,
            min_blob_h: config.min_blob_h,
            min_gray_range: config.min_gray_range,
            infd_ring: Arc::new(Ring::new(caches * image_size)),
            infm_ring: Arc::new(Ring::new(caches * image_size)),
            blob_ring: Arc::new(Ring::new(caches * blob_size)),
            minf_ring: Arc::new(Ring::new(caches * image_size)),
            gfbr_ring: Arc::new(Ring::new(caches * image_size)),
            stop: Arc::new(AtomicBool::new(false)),
            handles: Vec::new(),
        }
    }

    /// Spawn the three internal worker threads: minimum filter, quadtree
    /// decomposition, and the Bezier/Gaussian-blur combiner.
    pub fn start(&mut self) {
        let width = self.width;
        let height = self.height;
        let image_size = self.image_size;

        {
            let infm_ring = Arc::clone(&self.infm_ring);
            let minf_ring = Arc::clone(&self.minf_ring);
            let stop = Arc::clone(&self.stop);
            let ksize = self.minf_ksize;
            self.handles.push(thread::spawn(move || {
                let mut buf = vec![0u8; image_size];
                while !stop.load(Ordering::Relaxed) {
                    if !infm_ring.get_record(&mut buf) {
                        thread::sleep(Duration::from_micros(200));
                        continue;
                    }
                    let filtered =
                        min_filter(&buf[..(width * height) as usize], width, height, ksize);
                    let mut padded = vec![0u8; image_size];
                    padded[..filtered.len()].copy_from_slice(&filtered);
                    if !minf_ring.put_record(&padded) {
                        log::debug!("bkg_reconst: minf_ring full, dropping frame");
                    }
                }
            }));
        }

        {
            let infd_ring = Arc::clone(&self.infd_ring);
            let blob_ring = Arc::clone(&self.blob_ring);
            let stop = Arc::clone(&self.stop);
            let blob_size = self.blob_size;
            let mnbpi = self.mnbpi;
            let (min_blob_w, min_blob_h, min_gray_range) =
                (self.min_blob_w, self.min_blob_h, self.min_gray_range);
            self.handles.push(thread::spawn(move || {
                let mut buf = vec![0u8; image_size];
                let mut qt = Quadtree::new(min_blob_w, min_blob_h, min_gray_range, width, height);
                while !stop.load(Ordering::Relaxed) {
                    if !infd_ring.get_record(&mut buf) {
                        thread::sleep(Duration::from_micros(200));
                        continue;
                    }
                    qt.decompose(&buf[..(width * height) as usize], width, height);
                    let leaves = qt.leaves();
                    if leaves.len() > mnbpi {
                        log::warn!(
                            "bkg_reconst: quadtree produced {} leaves, more than budgeted {}",
                            leaves.len(),
                            mnbpi
                        );
                    }
                    let mut record = vec![0u8; blob_size];
                    serialize_blobs(&leaves, mnbpi, &mut record);
                    qt.reset();
                    if !blob_ring.put_record(&record) {
                        log::debug!("bkg_reconst: blob_ring full, dropping frame");
                    }
                }
            }));
        }

        {
            let minf_ring = Arc::clone(&self.minf_ring);
            let blob_ring = Arc::clone(&self.blob_ring);
            let gfbr_ring = Arc::clone(&self.gfbr_ring);
            let stop = Arc::clone(&self.stop);
            let blob_size = self.blob_size;
            let gauss_ksize = self.gauss_ksize;
            let gauss_sigma = self.gauss_sigma;
            self.handles.push(thread::spawn(move || {
                let mut minf_buf = vec![0u8; image_size];
                let mut blob_buf = vec![0u8; blob_size];
                while !stop.load(Ordering::Relaxed) {
                    if !minf_ring.get_record(&mut minf_buf) {
                        thread::sleep(Duration::from_micros(200));
                        continue;
                    }
                    while !stop.load(Ordering::Relaxed) {
                        if blob_ring.get_record(&mut blob_buf) {
                            break;
                        }
                        thread::sleep(Duration::from_micros(200));
                    }
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }

                    let blobs = deserialize_blobs(&blob_buf);
                    let bkgr = bezier_interpolate(
                        &minf_buf[..(width * height) as usize],
                        width,
                        height,
                        &blobs,
                    );
                    let blurred = gauss_filter(&bkgr, width, height, gauss_ksize, gauss_sigma);

                    let mut padded = vec![0u8; image_size];
                    padded[..blurred.len()].copy_from_slice(&blurred);
                    if !gfbr_ring.put_record(&padded) {
                        log::debug!("bkg_reconst: gfbr_ring full, dropping frame");
                    }
                }
            }));
        }
    }

    /// Signal all three worker threads to stop and join them.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }

    /// Feed one IR Y8 frame into both the minimum-filter and quadtree
    /// pipelines. Returns `false` if either internal ring was full.
    pub fn put(&self, image: &[u8]) -> bool {
        let n = (self.width * self.height) as usize;
        let mut padded = vec![0u8; self.image_size];
        padded[..n].copy_from_slice(&image[..n]);

        let a = self.infd_ring.put_record(&padded);
        let b = self.infm_ring.put_record(&padded);
        a && b
    }

    /// Non-blocking dequeue of the latest reconstructed background.
    pub fn get(&self, bkg: &mut [u8]) -> bool {
        let mut padded = vec![0u8; self.image_size];
        if !self.gfbr_ring.get_record(&mut padded) {
            return false;
        }
        let n = (self.width * self.height) as usize;
        bkg[..n].copy_from_slice(&padded[..n]);
        true
    }

    /// The two rings IR-Preprocess feeds directly, bypassing `put`. Other
    /// stages share rings with this component by cloning the `Arc`
    /// handles rather than sharing `&BkgReconst` itself across threads.
    pub fn input_rings(&self) -> (Arc<Ring>, Arc<Ring>) {
        (Arc::clone(&self.infd_ring), Arc::clone(&self.infm_ring))
    }

    /// The ring Fusion reads the reconstructed background from.
    pub fn output_ring(&self) -> Arc<Ring> {
        Arc::clone(&self.gfbr_ring)
    }

    /// Record size (bytes) used on every internal image ring.
    pub fn image_size(&self) -> usize {
        self.image_size
    }
}

impl Drop for BkgReconst {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_record_roundtrips() {
        let blobs = vec![
            Blob {
                quad: Quadrant {
                    top: 0,
                    left: 0,
                    bottom: 16,
                    right: 16,
                },
                range: 5,
            },
            Blob {
                quad: Quadrant {
                    top: 16,
                    left: 16,
                    bottom: 32,
                    right: 32,
                },
                range: 200,
            },
        ];
        let mut buf = vec![0u8; 4 + 4 * BLOB_RECORD_LEN];
        serialize_blobs(&blobs, 4, &mut buf);
        let out = deserialize_blobs(&buf);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].range, 5);
        assert_eq!(out[1].quad.right, 32);
    }

    #[test]
    fn uniform_frame_produces_uniform_background() {
        let width = 32u32;
        let height = 32u32;
        let config = FusionConfig::default();
        let mut reconst = BkgReconst::new(width, height, &config);
        reconst.start();

        let image = vec![150u8; (width * height) as usize];
        assert!(reconst.put(&image));

        let mut bkg = vec![0u8; (width * height) as usize];
        let mut got = false;
        for _ in 0..200 {
            if reconst.get(&mut bkg) {
                got = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        reconst.stop();

        assert!(got, "background never arrived");
        assert!(bkg.iter().all(|&v| (v as i32 - 150).abs() <= 2));
    }
}
