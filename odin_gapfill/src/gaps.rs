/*
 * Copyright © 2024, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

//! gap detection (sentinel values), gap fraction and the overlay of aligned reference data

use std::path::PathBuf;
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, config_error, alignment_failure};

/// cloud and cloud shadow codes of the Landsat vegetation cover product
pub const DEFAULT_SENTINELS: [f64;2] = [210.0, 211.0];

/// the (non-empty) set of cell values that mark gaps
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct SentinelValues (Vec<f64>);

impl SentinelValues {
    pub fn new (values: Vec<f64>) -> Result<SentinelValues> {
        if values.is_empty() {
            Err( config_error("no sentinel values"))
        } else if values.iter().any(|v| v.is_nan()) {
            Err( config_error("sentinel values cannot be NaN"))
        } else {
            Ok( SentinelValues(values) )
        }
    }

    #[inline]
    pub fn contains (&self, v: f64) -> bool {
        self.0.iter().any( |s| *s == v)
    }

    pub fn values (&self) -> &[f64] { &self.0 }
}

impl Default for SentinelValues {
    fn default() -> Self { SentinelValues( DEFAULT_SENTINELS.to_vec()) }
}

impl TryFrom<Vec<f64>> for SentinelValues {
    type Error = crate::errors::OdinGapFillError;
    fn try_from (values: Vec<f64>) -> Result<Self> { SentinelValues::new(values) }
}

impl From<SentinelValues> for Vec<f64> {
    fn from (sv: SentinelValues) -> Self { sv.0 }
}

/// where gap cells are detected. Gap fraction and overlay always use the same source
#[derive(Debug,Clone,PartialEq)]
pub enum GapSource {
    /// sentinel values within the primary raster
    Primary,
    /// sentinel values within an auxiliary (alpha) raster of the same size as the primary
    Alpha(PathBuf),
}

impl GapSource {
    pub fn from_alpha (alpha: Option<PathBuf>) -> GapSource {
        match alpha {
            Some(path) => GapSource::Alpha(path),
            None => GapSource::Primary
        }
    }
}

pub fn count_value (data: &Array2<f64>, value: f64) -> usize {
    data.iter().filter( |v| **v == value).count()
}

/// ratio of the summed per-sentinel cell counts to the total number of cells.
/// Counts are not de-duplicated, i.e. repeated sentinel values are counted repeatedly
pub fn gap_fraction (mask_src: &Array2<f64>, sentinels: &SentinelValues) -> f64 {
    let n_cells = mask_src.len();
    if n_cells == 0 { return 0.0 }

    let n_gaps: usize = sentinels.values().iter().map( |s| count_value( mask_src, *s)).sum();
    n_gaps as f64 / n_cells as f64
}

#[derive(Debug,Copy,Clone,PartialEq,Eq,Default)]
pub struct OverlayStats {
    /// number of gap cells that received a reference value
    pub filled: usize,
    /// number of gap cells without reference coverage (keeping their primary value)
    pub unfilled: usize,
}

/// saturating conversion into the u8 output cell type
#[inline]
pub fn to_u8 (v: f64) -> u8 {
    v.round().clamp( 0.0, 255.0) as u8
}

/// merge `primary` and the (aligned) `reference`: gap cells of `mask_src` take the reference value, all other
/// cells keep the primary value. Reference cells with the `no_coverage` value leave the primary value untouched
pub fn overlay (primary: &Array2<f64>, mask_src: &Array2<f64>, reference: &Array2<f64>,
                sentinels: &SentinelValues, no_coverage: f64) -> Result<(Array2<u8>,OverlayStats)>
{
    let shape = primary.dim();
    if mask_src.dim() != shape || reference.dim() != shape {
        return Err( alignment_failure( format!("overlay shape mismatch: primary {:?}, mask {:?}, reference {:?}",
                                               shape, mask_src.dim(), reference.dim())))
    }

    let mut out: Array2<u8> = Array2::zeros( shape);
    let mut stats = OverlayStats::default();

    Zip::from( &mut out).and( primary).and( mask_src).and( reference).for_each( |o, &p, &m, &r| {
        if sentinels.contains(m) {
            if r != no_coverage && !r.is_nan() {
                *o = to_u8(r);
                stats.filled += 1;
            } else {
                *o = to_u8(p);
                stats.unfilled += 1;
            }
        } else {
            *o = to_u8(p);
        }
    });

    Ok( (out,stats) )
}

/// number of cells in `reference` that carry data
pub fn covered_cells (reference: &Array2<f64>, no_coverage: f64) -> usize {
    reference.iter().filter( |v| **v != no_coverage && !v.is_nan()).count()
}
