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

//! Elementwise image arithmetic used by the bright-feature pipeline.
//!
//! Grounded on `imgsubtract.c`'s `img_subtract_kr`/`img_subtract`,
//! `imgadd.h`'s `img_add_kr`/`img_add`, and `imgmul.c`'s `img_mul_s_kr`.
//! Only the scalar `_nsu` paths are carried forward; the SIMD variants
//! behind `__WIN_SSE__`/`__WIN_AVX__` are not (spec.md §9).

/// `c[i] = a[i] > b[i] ? a[i] - b[i] : 0`, keeping the 8-bit range.
pub fn subtract_kr(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b).map(|(&x, &y)| x.saturating_sub(y)).collect()
}

/// `c[i] = a[i] - b[i]` widened to a signed 16-bit difference.
pub fn subtract(a: &[u8], b: &[u8]) -> Vec<i16> {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| x as i16 - y as i16)
        .collect()
}

/// `c[i] = min(255, a[i] + b[i])`, keeping the 8-bit range.
pub fn add_kr(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b).map(|(&x, &y)| x.saturating_add(y)).collect()
}

/// `c[i] = a[i] + b[i]` widened to an unsigned 16-bit sum.
pub fn add(a: &[u8], b: &[u8]) -> Vec<u16> {
    a.iter().zip(b).map(|(&x, &y)| x as u16 + y as u16).collect()
}

/// `b[i] = (k * a[i]) as u8`, truncating (not rounding or clamping, to
/// match the source's plain cast).
pub fn mul_s_kr(a: &[u8], k: f32) -> Vec<u8> {
    a.iter().map(|&x| (k * x as f32) as u8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtract_kr_floors_at_zero() {
        let a = [10u8, 200, 50];
        let b = [20u8, 50, 50];
        assert_eq!(subtract_kr(&a, &b), vec![0, 150, 0]);
    }

    #[test]
    fn add_kr_saturates_at_255() {
        let a = [250u8, 10, 0];
        let b = [10u8, 10, 0];
        assert_eq!(add_kr(&a, &b), vec![255, 20, 0]);
    }

    #[test]
    fn add_widens_without_saturation() {
        let a = [250u8, 10];
        let b = [10u8, 20];
        assert_eq!(add(&a, &b), vec![260, 30]);
    }

    #[test]
    fn mul_s_kr_truncates() {
        let a = [100u8, 10];
        let out = mul_s_kr(&a, 0.8);
        assert_eq!(out, vec![80, 8]);
    }
}
