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

//! Affine registration: control-point fit, interpolation tables, and the
//! VIS -> IR geometric warp.
//!
//! Grounded on `registration.c`'s `cal_affine_matrix`/`ge_solver`/
//! `cal_interp_table`/`rm_regist_warp_image`, plus `get_text_lines` in
//! `fusion.c` for the control-points text format.

use crate::error::{FusionError, Result};
use std::io::Write as _;
use std::path::Path;

/// A matched pair of pixel coordinates, one in each sensor's frame.
#[derive(Debug, Clone, Copy)]
pub struct ControlPoint {
    /// IR-frame X coordinate.
    pub ir_x: i32,
    /// IR-frame Y coordinate.
    pub ir_y: i32,
    /// VIS-frame X coordinate.
    pub vis_x: i32,
    /// VIS-frame Y coordinate.
    pub vis_y: i32,
}

/// `vis_x = a*ir_x + b*ir_y + c`, `vis_y = d*ir_x + e*ir_y + f`.
#[derive(Debug, Clone, Copy)]
pub struct AffineParams {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

const MIN_POINT_SIZE: usize = 3;

/// Fit affine parameters from control-point correspondences using the
/// normal-equations least-squares formulation: two independent 3x3
/// systems (one per output axis), each solved by Gaussian elimination
/// with partial pivoting.
pub fn fit_affine(points: &[ControlPoint]) -> Result<AffineParams> {
    if points.len() < MIN_POINT_SIZE {
        return Err(FusionError::Numeric(format!(
            "need at least {MIN_POINT_SIZE} control points, got {}",
            points.len()
        )));
    }

    // Row-major 3x4 augmented matrices: [Sxx Sxy Sx | Sx*target], etc.
    let mut abc = [0.0f64; 12];
    let mut def = [0.0f64; 12];

    for p in points {
        let (x1, y1) = (p.ir_x as f64, p.ir_y as f64);
        let (x2, y2) = (p.vis_x as f64, p.vis_y as f64);

        abc[0] += x1 * x1;
        abc[1] += x1 * y1;
        abc[2] += x1;
        abc[3] += x1 * x2;
        abc[4] += x1 * y1;
        abc[5] += y1 * y1;
        abc[6] += y1;
        abc[7] += x2 * y1;
        abc[8] += x1;
        abc[9] += y1;
        abc[10] += 1.0;
        abc[11] += x2;

        def[0] += x1 * x1;
        def[1] += x1 * y1;
        def[2] += x1;
        def[3] += x1 * y2;
        def[4] += x1 * y1;
        def[5] += y1 * y1;
        def[6] += y1;
        def[7] += y1 * y2;
        def[8] += x1;
        def[9] += y1;
        def[10] += 1.0;
        def[11] += y2;
    }

    ge_solve(&mut abc, 3)?;
    ge_solve(&mut def, 3)?;

    Ok(AffineParams {
        a: abc[3],
        b: abc[7],
        c: abc[11],
        d: def[3],
        e: def[7],
        f: def[11],
    })
}

/// Solve an `order`x`order` augmented system (row-major, `order+1`
/// columns per row) in place via Gaussian elimination with partial
/// pivoting. The solution lands in the last column of each row.
fn ge_solve(mat: &mut [f64], order: usize) -> Result<()> {
    let cols = order + 1;

    for x in 0..order {
        let mut primary_row = x;
        let mut primary_val = mat[primary_row * cols + x];
        for y in x..order {
            let val = mat[y * cols + x];
            if val.abs() > primary_val.abs() {
                primary_row = y;
                primary_val = val;
            }
        }
        if primary_row != x {
            for col in 0..cols {
                mat.swap(x * cols + col, primary_row * cols + col);
            }
        }

        let diag = mat[x * cols + x];
        if diag == 0.0 {
            return Err(FusionError::Numeric(
                "degenerate affine fit: control points are collinear".into(),
            ));
        }
        for y in x + 1..order {
            let k = mat[y * cols + x] / diag;
            for col in x + 1..cols {
                mat[y * cols + col] -= k * mat[x * cols + col];
            }
        }
    }

    for y in (0..order).rev() {
        for x in y + 1..order {
            let coeff = mat[y * cols + x];
            let rhs_x = mat[x * cols + order];
            mat[y * cols + order] -= coeff * rhs_x;
        }
        let diag = mat[y * cols + y];
        mat[y * cols + order] /= diag;
    }

    Ok(())
}

/// Two W*H float tables mapping each IR pixel to a fractional VIS source
/// coordinate.
#[derive(Debug, Clone)]
pub struct InterpTables {
    /// Per-IR-pixel fractional VIS row (y) coordinate, row-major.
    pub row: Vec<f64>,
    /// Per-IR-pixel fractional VIS column (x) coordinate, row-major.
    pub col: Vec<f64>,
}

impl InterpTables {
    /// Tabulate, for every IR pixel, its fractional VIS source coordinate
    /// under the given affine map.
    pub fn from_affine(affine: &AffineParams, base_w: u32, base_h: u32) -> Self {
        let mut row = vec![0.0f64; (base_w * base_h) as usize];
        let mut col = vec![0.0f64; (base_w * base_h) as usize];
        for y in 0..base_h {
            for x in 0..base_w {
                let rx = affine.a * x as f64 + affine.b * y as f64 + affine.c;
                let ry = affine.d * x as f64 + affine.e * y as f64 + affine.f;
                let idx = (y * base_w + x) as usize;
                col[idx] = rx;
                row[idx] = ry;
            }
        }
        InterpTables { row, col }
    }

    /// Load both tables from `interpY.txt`/`interpX.txt`-style ASCII
    /// files: one row per text line, space-separated floats.
    pub fn load(row_path: &Path, col_path: &Path, base_w: u32, base_h: u32) -> Result<Self> {
        let row = load_table(row_path, base_w, base_h)?;
        let col = load_table(col_path, base_w, base_h)?;
        Ok(InterpTables { row, col })
    }

    /// Persist both tables in the same ASCII format `load` expects.
    pub fn save(&self, row_path: &Path, col_path: &Path, base_w: u32, base_h: u32) -> Result<()> {
        save_table(&self.row, row_path, base_w, base_h)?;
        save_table(&self.col, col_path, base_w, base_h)?;
        Ok(())
    }
}

fn load_table(path: &Path, base_w: u32, base_h: u32) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)?;
    let values: Vec<f64> = text
        .split_whitespace()
        .map(|tok| tok.parse::<f64>().unwrap_or(0.0))
        .collect();
    let expected = (base_w * base_h) as usize;
    if values.len() < expected {
        return Err(FusionError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("interpolation table {path:?} has fewer than {expected} values"),
        )));
    }
    Ok(values)
}

fn save_table(values: &[f64], path: &Path, base_w: u32, base_h: u32) -> Result<()> {
    let mut out = String::new();
    for y in 0..base_h {
        for x in 0..base_w {
            out.push_str(&format!("{} ", values[(y * base_w + x) as usize]));
        }
        out.push('\n');
    }
    let mut file = std::fs::File::create(path)?;
    file.write_all(out.as_bytes())?;
    Ok(())
}

/// Parse a `control_points.txt`-style file: four ASCII integers per line,
/// `(ir_x, ir_y, vis_x, vis_y)`.
pub fn load_control_points(path: &Path) -> Result<Vec<ControlPoint>> {
    let text = std::fs::read_to_string(path)?;
    let mut points = Vec::new();
    for line in text.lines() {
        let nums: Vec<i32> = line
            .split_whitespace()
            .filter_map(|tok| tok.parse::<i32>().ok())
            .collect();
        if nums.len() < 4 {
            continue;
        }
        points.push(ControlPoint {
            ir_x: nums[0],
            ir_y: nums[1],
            vis_x: nums[2],
            vis_y: nums[3],
        });
    }
    Ok(points)
}

/// YUV420 semiplanar warp of a VIS frame onto IR geometry.
///
/// `src` is `unreg_w x unreg_h` YUV420 (Y plane, then U, then V, each
/// subsampled 2x2); `dst` is `base_w x base_h` YUV420. Output pixels
/// whose source footprint falls outside the VIS frame are left
/// untouched (the caller is expected to have pre-filled `dst`, e.g. from
/// a previous frame or zeroed).
pub fn warp_image(
    tables: &InterpTables,
    src: &[u8],
    unreg_w: u32,
    unreg_h: u32,
    base_w: u32,
    base_h: u32,
    dst: &mut [u8],
) {
    let src_uv_w = unreg_w / 2;
    let dst_uv_w = base_w / 2;
    let src_u = &src[(unreg_w * unreg_h) as usize..];
    let src_v = &src[(unreg_w * unreg_h + unreg_w * unreg_h / 4) as usize..];

    let (dst_y_len, dst_u_off, dst_v_off) = (
        (base_w * base_h) as usize,
        (base_w * base_h) as usize,
        (base_w * base_h + base_w * base_h / 4) as usize,
    );

    for y in 0..base_h {
        for x in 0..base_w {
            let idx = (y * base_w + x) as usize;
            let rx = tables.col[idx];
            let ry = tables.row[idx];

            let tlcx = rx.floor() as i64;
            let tlcy = ry.floor() as i64;
            if tlcx < 0 || tlcx > unreg_w as i64 - 1 {
                continue;
            }
            if tlcy < 0 || tlcy > unreg_h as i64 - 1 {
                continue;
            }
            let lrcx = tlcx + 1;
            let lrcy = tlcy + 1;
            if lrcx < 0 || lrcx > unreg_w as i64 - 1 {
                continue;
            }
            if lrcy < 0 || lrcy > unreg_h as i64 - 1 {
                continue;
            }

            let (tlcx, tlcy, lrcx, lrcy) = (tlcx as u32, tlcy as u32, lrcx as u32, lrcy as u32);
            let nw = src[(tlcy * unreg_w + tlcx) as usize] as f64;
            let sw = src[(lrcy * unreg_w + tlcx) as usize] as f64;
            let ne = src[(tlcy * unreg_w + lrcx) as usize] as f64;
            let se = src[(lrcy * unreg_w + lrcx) as usize] as f64;

            let fx = rx - tlcx as f64;
            let fy = ry - tlcy as f64;

            let nval = fx * ne + (1.0 - fx) * nw;
            let sval = fx * se + (1.0 - fx) * sw;
            let interp = (1.0 - fy) * nval + fy * sval;
            dst[idx] = interp.clamp(0.0, 255.0) as u8;

            if y % 2 == 0 && x % 2 == 0 {
                let src_uvx = tlcx / 2;
                let src_uvy = tlcy / 2;
                let dst_uvx = x / 2;
                let dst_uvy = y / 2;
                let d_idx = (dst_uvy * dst_uv_w + dst_uvx) as usize;
                let s_idx = (src_uvy * src_uv_w + src_uvx) as usize;
                dst[dst_u_off + d_idx] = src_u[s_idx];
                dst[dst_v_off + d_idx] = src_v[s_idx];
            }
        }
    }

    let _ = dst_y_len;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affine_fit_scenario_three() {
        let points = [
            ControlPoint {
                ir_x: 0,
                ir_y: 0,
                vis_x: 0,
                vis_y: 0,
            },
            ControlPoint {
                ir_x: 10,
                ir_y: 0,
                vis_x: 20,
                vis_y: 0,
            },
            ControlPoint {
                ir_x: 0,
                ir_y: 10,
                vis_x: 0,
                vis_y: 20,
            },
        ];
        let affine = fit_affine(&points).unwrap();
        assert!((affine.a - 2.0).abs() < 1e-6);
        assert!((affine.b - 0.0).abs() < 1e-6);
        assert!((affine.c - 0.0).abs() < 1e-6);
        assert!((affine.d - 0.0).abs() < 1e-6);
        assert!((affine.e - 2.0).abs() < 1e-6);
        assert!((affine.f - 0.0).abs() < 1e-6);

        let rx = affine.a * 5.0 + affine.b * 5.0 + affine.c;
        let ry = affine.d * 5.0 + affine.e * 5.0 + affine.f;
        assert!((rx - 10.0).abs() < 1e-6);
        assert!((ry - 10.0).abs() < 1e-6);
    }

    #[test]
    fn too_few_points_is_numeric_error() {
        let points = [ControlPoint {
            ir_x: 0,
            ir_y: 0,
            vis_x: 0,
            vis_y: 0,
        }];
        assert!(fit_affine(&points).is_err());
    }

    #[test]
    fn interp_table_roundtrips_through_ascii() {
        let affine = AffineParams {
            a: 1.5,
            b: 0.0,
            c: 1.0,
            d: 0.0,
            e: 1.5,
            f: 1.0,
        };
        let tables = InterpTables::from_affine(&affine, 4, 4);

        let dir = std::env::temp_dir();
        let row_path = dir.join("test_interp_row.txt");
        let col_path = dir.join("test_interp_col.txt");
        tables.save(&row_path, &col_path, 4, 4).unwrap();
        let reloaded = InterpTables::load(&row_path, &col_path, 4, 4).unwrap();

        for (a, b) in tables.row.iter().zip(reloaded.row.iter()) {
            assert!((a - b).abs() < 1e-4);
        }
        let _ = std::fs::remove_file(&row_path);
        let _ = std::fs::remove_file(&col_path);
    }
}
