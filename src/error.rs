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

//! Error types for the fusion pipeline.

use std::io;
use thiserror::Error;

/// Result type for fusion pipeline operations.
pub type Result<T> = std::result::Result<T, FusionError>;

/// Errors that can occur while configuring or driving the pipeline.
///
/// Transient conditions (a full ring on `put`, an empty ring on `get`)
/// are never surfaced here — worker loops absorb them internally per the
/// concurrency model (dropped frame + log line). This enum only carries
/// the error kinds that are fatal at `init`/`start`, or that a caller
/// otherwise needs to react to.
#[derive(Debug, Error)]
pub enum FusionError {
    /// Invalid resolution, pixel format, or other construction-time
    /// parameter.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Allocation, ring initialization, or worker-spawn failure.
    #[error("resource allocation failed: {0}")]
    Resource(String),

    /// A persisted table or control-point file could not be read.
    /// Callers see this only when the IO failure is not locally
    /// recoverable (e.g. control points are required but absent);
    /// missing interpolation tables alone are recovered by recomputing
    /// them, per spec, and never reach this variant.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Fewer than three non-collinear control-point correspondences were
    /// supplied, so the affine fit is degenerate.
    #[error("degenerate affine fit: {0}")]
    Numeric(String),
}
