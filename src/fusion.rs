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

//! The public pipeline API: owns the eight top-level rings, the
//! background-reconstruction component, and every worker thread.
//!
//! Grounded on `fusion_new`/`fusion_init`/`fusion_delete`/`fusion_start`/
//! `fusion_stop`/`fusion_put*`/`fusion_get*` in `fusion.c`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::clahe::Clahe;
use crate::config::FusionConfig;
use crate::error::{FusionError, Result};
use crate::formats::PixelFormat;
use crate::registration::{fit_affine, load_control_points, InterpTables};
use crate::ring::Ring;
use crate::stages::bkg_reconst::BkgReconst;
use crate::stages::{fusion_stage, ir_preprocess, vis_preprocess};

const INTERP_ROW_FILE: &str = "interpY.txt";
const INTERP_COL_FILE: &str = "interpX.txt";
const CONTROL_POINTS_FILE: &str = "control_points.txt";

fn roundup_power_of_2(a: usize) -> usize {
    crate::stages::roundup_power_of_2(a)
}

/// Owns every ring, worker thread, and piece of persisted state for one
/// running fusion pipeline. Construct with [`Fusion::init`], launch with
/// [`Fusion::start`], and drive it with the `put_*`/`get_*` methods.
pub struct Fusion {
    base_w: u32,
    base_h: u32,
    unreg_w: u32,
    unreg_h: u32,

    rawi_record_size: usize,
    rawv_record_size: usize,
    yuvf_record_size: usize,
    nmsc_record_size: usize,

    rawi_ring: Arc<Ring>,
    rawv_ring: Arc<Ring>,
    gsci_ring: Arc<Ring>,
    regt_ring: Arc<Ring>,
    fusn_ring: Arc<Ring>,
    iout_ring: Arc<Ring>,
    vout_ring: Arc<Ring>,
    brft_ring: Arc<Ring>,

    bkg_reconst: BkgReconst,
    tables: Option<InterpTables>,
    config: FusionConfig,
    output_format: PixelFormat,

    stop: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl Fusion {
    /// Allocate every ring and piece of scratch state for a `base_w x
    /// base_h` IR frame registered against a `unreg_w x unreg_h` VIS
    /// frame. Loads `interpY.txt`/`interpX.txt` from `table_dir` if
    /// present; otherwise fits an affine map from `table_dir`'s
    /// `control_points.txt` and persists the tables there. Does not
    /// start any worker thread — call [`Fusion::start`] for that.
    pub fn init(
        base_w: u32,
        base_h: u32,
        unreg_w: u32,
        unreg_h: u32,
        config: FusionConfig,
        output_format: PixelFormat,
        table_dir: &Path,
    ) -> Result<Fusion> {
        if base_w == 0 || base_h == 0 || unreg_w == 0 || unreg_h == 0 {
            return Err(FusionError::Config(
                "frame dimensions must be non-zero".into(),
            ));
        }
        if base_w % 2 != 0 || base_h % 2 != 0 || unreg_w % 2 != 0 || unreg_h % 2 != 0 {
            return Err(FusionError::Config(
                "frame dimensions must be even for 4:2:0 chroma subsampling".into(),
            ));
        }

        let tables = Self::load_or_fit_tables(base_w, base_h, table_dir)?;

        let rawi_record_size = roundup_power_of_2((base_w * base_h) as usize * 2);
        let rawv_record_size = roundup_power_of_2((unreg_w * unreg_h) as usize * 3 / 2);
        let yuvf_record_size =
            roundup_power_of_2(output_format.output_len(base_w as usize, base_h as usize));
        let nmsc_record_size = roundup_power_of_2((base_w * base_h) as usize);
        let caches = config.caches.max(1);

        let bkg_reconst = BkgReconst::new(base_w, base_h, &config);

        Ok(Fusion {
            base_w,
            base_h,
            unreg_w,
            unreg_h,
            rawi_record_size,
            rawv_record_size,
            yuvf_record_size,
            nmsc_record_size,
            rawi_ring: Arc::new(Ring::new(caches * rawi_record_size)),
            rawv_ring: Arc::new(Ring::new(caches * rawv_record_size)),
            gsci_ring: Arc::new(Ring::new(caches * yuvf_record_size)),
            regt_ring: Arc::new(Ring::new(caches * yuvf_record_size)),
            fusn_ring: Arc::new(Ring::new(caches * yuvf_record_size)),
            iout_ring: Arc::new(Ring::new(caches * yuvf_record_size)),
            vout_ring: Arc::new(Ring::new(caches * yuvf_record_size)),
            brft_ring: Arc::new(Ring::new(caches * nmsc_record_size)),
            bkg_reconst,
            tables: Some(tables),
            config,
            output_format,
            stop: Arc::new(AtomicBool::new(false)),
            handles: Vec::new(),
        })
    }

    fn load_or_fit_tables(base_w: u32, base_h: u32, table_dir: &Path) -> Result<InterpTables> {
        let row_path = table_dir.join(INTERP_ROW_FILE);
        let col_path = table_dir.join(INTERP_COL_FILE);

        if let Ok(tables) = InterpTables::load(&row_path, &col_path, base_w, base_h) {
            return Ok(tables);
        }

        let cp_path: PathBuf = table_dir.join(CONTROL_POINTS_FILE);
        let points = load_control_points(&cp_path)?;
        let affine = fit_affine(&points)?;
        let tables = InterpTables::from_affine(&affine, base_w, base_h);
        let _ = tables.save(&row_path, &col_path, base_w, base_h);
        Ok(tables)
    }

    /// Launch every worker thread: the three internal `BkgReconst`
    /// workers, then IR-Preprocess, VIS-Preprocess, and Fusion.
    pub fn start(&mut self) {
        self.bkg_reconst.start();

        let clahe = Clahe::new(
            self.config.n_bins,
            self.config.cut_thresh,
            self.config.clip_limit,
        );
        self.handles.push(ir_preprocess::spawn(
            self.base_w as usize,
            self.base_h as usize,
            self.rawi_record_size,
            self.yuvf_record_size,
            self.bkg_reconst.image_size(),
            clahe,
            self.output_format,
            Arc::clone(&self.rawi_ring),
            Arc::clone(&self.gsci_ring),
            Arc::clone(&self.iout_ring),
            self.bkg_reconst.input_rings(),
            Arc::clone(&self.stop),
        ));

        let tables = self
            .tables
            .take()
            .expect("Fusion::start called more than once");
        self.handles.push(vis_preprocess::spawn(
            self.unreg_w,
            self.unreg_h,
            self.base_w,
            self.base_h,
            self.rawv_record_size,
            self.yuvf_record_size,
            tables,
            Arc::clone(&self.rawv_ring),
            Arc::clone(&self.regt_ring),
            Arc::clone(&self.vout_ring),
            Arc::clone(&self.stop),
        ));

        self.handles.push(fusion_stage::spawn(
            self.base_w as usize,
            self.base_h as usize,
            self.yuvf_record_size,
            self.bkg_reconst.image_size(),
            self.config.clone(),
            Arc::clone(&self.gsci_ring),
            Arc::clone(&self.regt_ring),
            self.bkg_reconst.output_ring(),
            Arc::clone(&self.fusn_ring),
            Arc::clone(&self.brft_ring),
            Arc::clone(&self.stop),
        ));
    }

    /// Signal every worker to stop and join them, including
    /// `BkgReconst`'s own three internal threads.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        self.bkg_reconst.stop();
    }

    /// Enqueue one raw IR frame (`2*base_w*base_h` bytes). Drops the
    /// frame and returns `false` if the raw ring is full.
    pub fn put_ir(&self, data: &[u8]) -> bool {
        self.rawi_ring.put_record(&Self::pad(data, self.rawi_record_size))
    }

    /// Enqueue one raw VIS YUV420 frame (`unreg_w*unreg_h*3/2` bytes).
    /// Drops the frame and returns `false` if the raw ring is full.
    pub fn put_vis(&self, data: &[u8]) -> bool {
        self.rawv_ring.put_record(&Self::pad(data, self.rawv_record_size))
    }

    /// Non-blocking dequeue of one fused frame. `buf` must be at least
    /// `output_format.output_len(base_w, base_h)` bytes, per the format
    /// passed to [`Fusion::init`].
    pub fn get_fused(&self, buf: &mut [u8]) -> bool {
        Self::drain(&self.fusn_ring, self.yuvf_record_size, buf)
    }

    /// Non-blocking dequeue of one IR-compressed output frame, in the
    /// format passed to [`Fusion::init`].
    pub fn get_ir_out(&self, buf: &mut [u8]) -> bool {
        Self::drain(&self.iout_ring, self.yuvf_record_size, buf)
    }

    /// Non-blocking dequeue of one registered VIS output frame, in the
    /// format passed to [`Fusion::init`].
    pub fn get_vis_out(&self, buf: &mut [u8]) -> bool {
        Self::drain(&self.vout_ring, self.yuvf_record_size, buf)
    }

    /// Non-blocking dequeue of one suppressed bright-feature frame
    /// (`base_w*base_h` bytes, single channel).
    pub fn get_bright(&self, buf: &mut [u8]) -> bool {
        Self::drain(&self.brft_ring, self.nmsc_record_size, buf)
    }

    fn pad(data: &[u8], record_size: usize) -> Vec<u8> {
        let mut padded = vec![0u8; record_size];
        let n = data.len().min(record_size);
        padded[..n].copy_from_slice(&data[..n]);
        padded
    }

    fn drain(ring: &Ring, record_size: usize, buf: &mut [u8]) -> bool {
        let mut record = vec![0u8; record_size];
        if !ring.get_record(&mut record) {
            return false;
        }
        let n = buf.len().min(record_size);
        buf[..n].copy_from_slice(&record[..n]);
        true
    }
}

impl Drop for Fusion {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::ControlPoint;
    use std::io::Write as _;

    fn write_control_points(dir: &Path) {
        let path = dir.join(CONTROL_POINTS_FILE);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "0 0 0 0").unwrap();
        writeln!(file, "10 0 10 0").unwrap();
        writeln!(file, "0 10 0 10").unwrap();
    }

    #[test]
    fn init_fits_affine_when_tables_absent() {
        let dir = std::env::temp_dir().join("ir_vis_fusion_test_fit_affine");
        let _ = std::fs::create_dir_all(&dir);
        write_control_points(&dir);

        let config = FusionConfig::default();
        let fusion = Fusion::init(
            8,
            8,
            8,
            8,
            config,
            PixelFormat::YuvSemiplanar420,
            &dir,
        );
        assert!(fusion.is_ok());
        assert!(dir.join(INTERP_ROW_FILE).exists());
        assert!(dir.join(INTERP_COL_FILE).exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn init_rejects_odd_dimensions() {
        let dir = std::env::temp_dir().join("ir_vis_fusion_test_odd_dims");
        let _ = std::fs::create_dir_all(&dir);
        let config = FusionConfig::default();
        let err = Fusion::init(7, 8, 8, 8, config, PixelFormat::YuvSemiplanar420, &dir);
        assert!(err.is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn init_without_control_points_is_an_error() {
        let dir = std::env::temp_dir().join("ir_vis_fusion_test_missing_points");
        let _ = std::fs::create_dir_all(&dir);
        let _ = std::fs::remove_file(dir.join(CONTROL_POINTS_FILE));

        let config = FusionConfig::default();
        let result = Fusion::init(8, 8, 8, 8, config, PixelFormat::YuvSemiplanar420, &dir);
        assert!(result.is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn put_get_roundtrip_end_to_end() {
        let dir = std::env::temp_dir().join("ir_vis_fusion_test_e2e");
        let _ = std::fs::create_dir_all(&dir);
        write_control_points(&dir);

        let width = 16u32;
        let height = 16u32;
        let config = FusionConfig::default();
        let mut fusion = Fusion::init(
            width,
            height,
            width,
            height,
            config,
            PixelFormat::YuvSemiplanar420,
            &dir,
        )
        .unwrap();
        fusion.start();

        let raw_ir: Vec<u8> = (0..(width * height) as usize)
            .flat_map(|_| [0x01u8, 0x00u8])
            .collect();
        let raw_vis = vec![128u8; (width * height) as usize * 3 / 2];

        assert!(fusion.put_ir(&raw_ir));
        assert!(fusion.put_vis(&raw_vis));

        let mut fused = vec![0u8; (width * height) as usize * 3 / 2];
        let mut got = false;
        for _ in 0..400 {
            if fusion.get_fused(&mut fused) {
                got = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        fusion.stop();

        assert!(got, "fused frame never arrived");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
