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

//! Real-time IR/visible-light image fusion.
//!
//! The pipeline is a fixed-topology dataflow graph: six worker stages
//! connected by single-producer/single-consumer bounded byte rings.
//!
//! ```text
//!           rawi_ring                    bkg (internal, BkgReconst)
//! ir_raw -----------> IR-Preprocess ---+----------------+
//!                          |           |                |
//!                       gsci_ring      infd/infm_ring   |
//!                          |           |                |
//!                          |      Minfilter/Quadtree/Bezier
//!                          |           |                |
//!                          |        gfbr (bkg) ---------+
//!                          v                             v
//!                        Fusion <--- regt_ring <--- VIS-Preprocess <-- rawv_ring <- vis_raw
//!                          |
//!                  fusn_ring / brft_ring
//! ```
//!
//! [`Fusion`] is the entry point: [`Fusion::init`] allocates every ring
//! and loads (or fits) the registration tables, [`Fusion::start`]
//! launches the workers, and `put_ir`/`put_vis`/`get_fused`/`get_ir_out`/
//! `get_vis_out`/`get_bright` drive frames through the pipeline.

mod bezier;
mod clahe;
mod config;
mod error;
mod filters;
mod formats;
mod fusion;
mod imgops;
mod quadtree;
mod registration;
mod ring;
mod stages;

pub use clahe::Clahe;
pub use config::{ColorStyle, FusionConfig};
pub use error::{FusionError, Result};
pub use formats::{PixelFormat, Resolution};
pub use fusion::Fusion;
pub use quadtree::{Blob, Quadrant};
pub use registration::{AffineParams, ControlPoint, InterpTables};
pub use ring::Ring;
