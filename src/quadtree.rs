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

//! Quadtree decomposition of an 8-bit image into homogeneous blobs.
//!
//! Grounded on `quadtree.c`, but rewritten as an arena-and-index tree
//! instead of individually malloc'd nodes with four child pointers each,
//! per the systems-rewrite note in spec.md §9: nodes live in one
//! preallocated `Vec`, children are indices, and a reset is a truncation
//! rather than a recursive free.

/// An axis-aligned rectangle, half-open on bottom/right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quadrant {
    /// Y position of the top side.
    pub top: u32,
    /// X position of the left side.
    pub left: u32,
    /// Y position of the bottom side (exclusive).
    pub bottom: u32,
    /// X position of the right side (exclusive).
    pub right: u32,
}

impl Quadrant {
    fn width(&self) -> u32 {
        self.right - self.left
    }

    fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// A quadtree leaf or internal node: a quadrant plus its pixel range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blob {
    /// The blob's rectangle.
    pub quad: Quadrant,
    /// `max - min` pixel value within the rectangle.
    pub range: u8,
}

struct Node {
    blob: Blob,
    children: [Option<u32>; 4],
}

/// A quadtree over one image, decomposed once per `decompose` call and
/// reusable across frames via [`Quadtree::reset`].
pub struct Quadtree {
    nodes: Vec<Node>,
    root: Option<u32>,
    min_blob_w: u32,
    min_blob_h: u32,
    min_gray_range: u8,
}

impl Quadtree {
    /// Build an empty quadtree with the given split thresholds, arena
    /// preallocated to the worst case `width*height/(min_blob_w*min_blob_h)`.
    pub fn new(min_blob_w: u32, min_blob_h: u32, min_gray_range: u8, width: u32, height: u32) -> Self {
        let worst_case = ((width * height) / (min_blob_w.max(1) * min_blob_h.max(1))).max(1) as usize;
        Quadtree {
            nodes: Vec::with_capacity(worst_case * 4),
            root: None,
            min_blob_w,
            min_blob_h,
            min_gray_range,
        }
    }

    /// Drop all nodes from a previous decomposition. O(1): the arena is
    /// truncated, not freed node-by-node.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.root = None;
    }

    /// Decompose `image` (row-major, `width x height`) into a quadtree.
    /// Discards any prior decomposition first.
    pub fn decompose(&mut self, image: &[u8], width: u32, height: u32) {
        self.reset();
        let quad = Quadrant {
            top: 0,
            left: 0,
            bottom: height,
            right: width,
        };
        self.root = Some(self.split_blob(quad, image, width));
    }

    fn split_blob(&mut self, quad: Quadrant, image: &[u8], width: u32) -> u32 {
        let mut minval = 0xFFu8;
        let mut maxval = 0u8;
        for y in quad.top..quad.bottom {
            let row = &image[(y * width) as usize..];
            for x in quad.left..quad.right {
                let val = row[x as usize];
                minval = minval.min(val);
                maxval = maxval.max(val);
            }
        }
        let range = maxval - minval;

        let idx = self.nodes.len() as u32;
        self.nodes.push(Node {
            blob: Blob { quad, range },
            children: [None; 4],
        });

        if quad.width() > self.min_blob_w
            && quad.height() > self.min_blob_h
            && range > self.min_gray_range
        {
            let horizon_middle = (quad.top + quad.bottom) / 2;
            let vertical_middle = (quad.left + quad.right) / 2;

            let tl = Quadrant {
                top: quad.top,
                left: quad.left,
                bottom: horizon_middle,
                right: vertical_middle,
            };
            let tr = Quadrant {
                top: quad.top,
                left: vertical_middle,
                bottom: horizon_middle,
                right: quad.right,
            };
            let bl = Quadrant {
                top: horizon_middle,
                left: quad.left,
                bottom: quad.bottom,
                right: vertical_middle,
            };
            let br = Quadrant {
                top: horizon_middle,
                left: vertical_middle,
                bottom: quad.bottom,
                right: quad.right,
            };

            let c0 = self.split_blob(tl, image, width);
            let c1 = self.split_blob(tr, image, width);
            let c2 = self.split_blob(bl, image, width);
            let c3 = self.split_blob(br, image, width);
            self.nodes[idx as usize].children = [Some(c0), Some(c1), Some(c2), Some(c3)];
        }

        idx
    }

    /// Collect leaves depth-first in TL, TR, BL, BR order.
    pub fn leaves(&self) -> Vec<Blob> {
        let mut out = Vec::new();
        if let Some(root) = self.root {
            self.collect_leaves(root, &mut out);
        }
        out
    }

    fn collect_leaves(&self, idx: u32, out: &mut Vec<Blob>) {
        let node = &self.nodes[idx as usize];
        if node.children.iter().all(Option::is_none) {
            out.push(node.blob);
            return;
        }
        for child in node.children.into_iter().flatten() {
            self.collect_leaves(child, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_image_is_one_leaf() {
        let image = vec![42u8; 64 * 48];
        let mut qt = Quadtree::new(12, 9, 78, 64, 48);
        qt.decompose(&image, 64, 48);
        let leaves = qt.leaves();
        assert_eq!(leaves.len(), 1);
        assert_eq!(
            leaves[0].quad,
            Quadrant {
                top: 0,
                left: 0,
                bottom: 48,
                right: 64
            }
        );
    }

    #[test]
    fn leaves_tile_the_image_exactly() {
        let mut image = vec![0u8; 64 * 48];
        for y in 0..48u32 {
            for x in 32..64u32 {
                image[(y * 64 + x) as usize] = 255;
            }
        }
        let mut qt = Quadtree::new(12, 9, 78, 64, 48);
        qt.decompose(&image, 64, 48);
        let leaves = qt.leaves();

        let total_area: u64 = leaves
            .iter()
            .map(|b| (b.quad.width() as u64) * (b.quad.height() as u64))
            .sum();
        assert_eq!(total_area, 64 * 48);
    }

    #[test]
    fn vertical_step_splits_into_four_leaves() {
        let mut image = vec![0u8; 64 * 48];
        for y in 0..48u32 {
            for x in 32..64u32 {
                image[(y * 64 + x) as usize] = 128;
            }
        }
        let mut qt = Quadtree::new(12, 9, 78, 64, 48);
        qt.decompose(&image, 64, 48);
        let leaves = qt.leaves();
        assert_eq!(leaves.len(), 4);
    }

    #[test]
    fn reset_clears_prior_decomposition() {
        let image = vec![10u8; 16 * 16];
        let mut qt = Quadtree::new(12, 9, 78, 16, 16);
        qt.decompose(&image, 16, 16);
        qt.reset();
        assert!(qt.leaves().is_empty());
    }
}
