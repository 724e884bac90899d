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

//! The six worker stages, each a long-running loop over one or more
//! [`crate::ring::Ring`]s, matching the stage table in spec.md §2.

pub mod bkg_reconst;
pub mod fusion_stage;
pub mod ir_preprocess;
pub mod vis_preprocess;

/// Round a byte count up to the next power of two, matching every
/// `roundup_power_of_2` call in the original sources (`fifo.c`,
/// `fusion.c`, `bkgreconstruct.c`). `0` stays `0`.
pub(crate) fn roundup_power_of_2(a: usize) -> usize {
    if a == 0 {
        0
    } else {
        a.next_power_of_two()
    }
}
