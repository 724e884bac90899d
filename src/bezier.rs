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

//! Bezier surface interpolation over quadtree blobs.
//!
//! Grounded on `bkgreconstruct.c`'s `bezier_interpolate` and its helpers
//! (`bezier_interp_coeff`, `bezier_trans_matrix`, `bezier_mul_matrix`,
//! `bezier_cpoint_feature`, `bezier_set_surf`). Matrices are represented
//! as flat row-major `Vec<f64>` with an explicit width, same layout as
//! the source's flat float arrays.

use crate::quadtree::Blob;

/// Constant Bezier basis matrix, row-major 4x4.
const M: [f64; 16] = [
    1.0, 0.0, 0.0, 0.0, -3.0, 3.0, 0.0, 0.0, 3.0, -6.0, 3.0, 0.0, -1.0, 3.0, -3.0, 1.0,
];

/// Transpose of [`M`].
const MT: [f64; 16] = [
    1.0, -3.0, 3.0, -1.0, 0.0, 3.0, -6.0, 3.0, 0.0, 0.0, 3.0, -3.0, 0.0, 0.0, 0.0, 1.0,
];

/// Build the `dim x 4` interpolation-coefficient matrix with rows
/// `[1, t, t^2, t^3]`, `t = i / (dim - 1)`.
fn interp_coeff(dim: usize) -> Vec<f64> {
    let mut out = vec![0.0f64; dim * 4];
    let denom = (dim.max(2) - 1) as f64;
    for i in 0..dim {
        let t = i as f64 / denom;
        out[i * 4] = 1.0;
        out[i * 4 + 1] = t;
        out[i * 4 + 2] = t * t;
        out[i * 4 + 3] = t * t * t;
    }
    out
}

fn transpose(a: &[f64], aw: usize, ah: usize) -> Vec<f64> {
    let mut out = vec![0.0f64; aw * ah];
    for y in 0..aw {
        for x in 0..ah {
            out[y * ah + x] = a[x * aw + y];
        }
    }
    out
}

fn mul_matrix(a: &[f64], aw: usize, ah: usize, b: &[f64], bw: usize, bh: usize) -> Vec<f64> {
    assert_eq!(aw, bh, "matrix dimensions must agree");
    let mut out = vec![0.0f64; ah * bw];
    for y in 0..ah {
        for x in 0..bw {
            let mut sum = 0.0f64;
            for i in 0..aw {
                sum += a[y * aw + i] * b[i * bw + x];
            }
            out[y * bw + x] = sum;
        }
    }
    out
}

/// Sample a 4x4 control grid from `image` at the blob's quadrant, rows
/// `top + y*bh/4`, columns `left + x*bw/4`, `y,x in [0,4)`.
fn cpoint_feature(image: &[u8], width: u32, blob: &Blob) -> [f64; 16] {
    let bw = (blob.quad.right - blob.quad.left) as f64;
    let bh = (blob.quad.bottom - blob.quad.top) as f64;
    let mut feat = [0.0f64; 16];
    let mut i = 0;
    for y in 0..4u32 {
        let row = blob.quad.top + (y as f64 * bh / 4.0) as u32;
        for x in 0..4u32 {
            let col = blob.quad.left + (x as f64 * bw / 4.0) as u32;
            feat[i] = image[(row * width + col) as usize] as f64;
            i += 1;
        }
    }
    feat
}

fn set_surf(image: &mut [u8], width: u32, blob: &Blob, surf: &[f64], dimx: u32, dimy: u32) {
    let mut i = 0usize;
    for y in blob.quad.top..blob.quad.top + dimy {
        for x in blob.quad.left..blob.quad.left + dimx {
            image[(y * width + x) as usize] = surf[i] as u8;
            i += 1;
        }
    }
}

/// Run Bezier surface interpolation over every blob, writing the
/// reconstructed background into a `width x height` image. The leaves
/// from [`crate::quadtree::Quadtree::leaves`] tile the image exactly, so
/// every pixel is covered by exactly one blob's surface.
pub fn bezier_interpolate(image: &[u8], width: u32, height: u32, blobs: &[Blob]) -> Vec<u8> {
    let mut bkg = vec![0u8; (width * height) as usize];

    for blob in blobs {
        let dimx = blob.quad.right - blob.quad.left;
        let dimy = blob.quad.bottom - blob.quad.top;
        if dimx == 0 || dimy == 0 {
            continue;
        }

        let u = interp_coeff(dimy as usize);
        let v = interp_coeff(dimx as usize);
        let vt = transpose(&v, 4, dimx as usize);

        let p = cpoint_feature(image, width, blob);

        let um = mul_matrix(&u, 4, dimy as usize, &M, 4, 4);
        let ump = mul_matrix(&um, 4, dimy as usize, &p, 4, 4);
        let umpmt = mul_matrix(&ump, 4, dimy as usize, &MT, 4, 4);
        let surf = mul_matrix(&umpmt, 4, dimy as usize, &vt, dimx as usize, 4);

        set_surf(&mut bkg, width, blob, &surf, dimx, dimy);
    }

    bkg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quadtree::Quadrant;

    #[test]
    fn uniform_control_grid_yields_uniform_surface() {
        let image = vec![200u8; 16 * 16];
        let blob = Blob {
            quad: Quadrant {
                top: 0,
                left: 0,
                bottom: 16,
                right: 16,
            },
            range: 0,
        };
        let bkg = bezier_interpolate(&image, 16, 16, &[blob]);
        assert!(bkg.iter().all(|&v| (v as i32 - 200).abs() <= 1));
    }

    #[test]
    fn interp_coeff_endpoints_are_zero_and_one() {
        let c = interp_coeff(5);
        assert_eq!(c[1], 0.0);
        assert_eq!(c[4 * 4 + 1], 1.0);
    }

    #[test]
    fn multiple_blobs_tile_without_gaps() {
        let image = vec![100u8; 32 * 32];
        let blobs = vec![
            Blob {
                quad: Quadrant {
                    top: 0,
                    left: 0,
                    bottom: 16,
                    right: 16,
                },
                range: 0,
            },
            Blob {
                quad: Quadrant {
                    top: 0,
                    left: 16,
                    bottom: 16,
                    right: 32,
                },
                range: 0,
            },
            Blob {
                quad: Quadrant {
                    top: 16,
                    left: 0,
                    bottom: 32,
                    right: 16,
                },
                range: 0,
            },
            Blob {
                quad: Quadrant {
                    top: 16,
                    left: 16,
                    bottom: 32,
                    right: 32,
                },
                range: 0,
            },
        ];
        let bkg = bezier_interpolate(&image, 32, 32, &blobs);
        assert!(bkg.iter().all(|&v| (v as i32 - 100).abs() <= 1));
    }
}
