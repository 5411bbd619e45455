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

//! warping (reprojection + resampling) of one or more source datasets onto a given target grid

use std::{ffi::c_int, ptr::{null, null_mut}};
use clap::ValueEnum;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::{Dataset, RasterGrid, create_mem_dataset, read_band, to_csl_string_list};
use crate::errors::{Result, misc_error, last_gdal_error};

/// the subset of GDAL resampling algorithms that makes sense for categorical or percentage products
#[derive(Debug,Copy,Clone,PartialEq,Eq,Serialize,Deserialize,ValueEnum,Default)]
pub enum ResampleAlg {
    #[default]
    Nearest,
    Bilinear,
    Cubic,
    Average,
    Mode,
}

impl ResampleAlg {
    /// the name used for the gdalwarp `-r` option
    pub fn gdal_name (&self) -> &'static str {
        match *self {
            ResampleAlg::Nearest => "near",
            ResampleAlg::Bilinear => "bilinear",
            ResampleAlg::Cubic => "cubic",
            ResampleAlg::Average => "average",
            ResampleAlg::Mode => "mode",
        }
    }
}

/// owning wrapper for GDALWarpAppOptions so that we release them on all return paths
struct WarpAppOptions {
    c_options: *mut gdal_sys::GDALWarpAppOptions,
}

impl WarpAppOptions {
    fn new (args: &[String]) -> Result<Self> {
        let c_args = to_csl_string_list( args)?;
        let c_options = unsafe { gdal_sys::GDALWarpAppOptionsNew( c_args.as_ptr(), null_mut()) };
        if c_options.is_null() {
            Err( last_gdal_error())
        } else {
            Ok( WarpAppOptions { c_options } )
        }
    }
}

impl Drop for WarpAppOptions {
    fn drop (&mut self) {
        unsafe { gdal_sys::GDALWarpAppOptionsFree( self.c_options); }
    }
}

/// the gdalwarp arguments we use to warp into an existing (pre-initialized) target dataset
pub fn warp_args (alg: ResampleAlg, no_data: f64) -> Vec<String> {
    vec![
        "-r".to_string(), alg.gdal_name().to_string(),
        "-dstnodata".to_string(), no_data.to_string(),
    ]
}

/// warp (mosaic) all `sources` into an in-memory dataset with the given `grid` and return the values of its band.
/// Target cells that are not covered by any source keep the `no_data` value, which therefore has to lie outside
/// the value range of the sources
pub fn warp_onto_grid (sources: &[&Dataset], grid: &RasterGrid, no_data: f64, alg: ResampleAlg) -> Result<Array2<f64>> {
    if sources.is_empty() {
        return Err( misc_error("no source datasets to warp"))
    }

    let tgt_ds = create_mem_dataset::<f64>( grid, no_data)?;
    let options = WarpAppOptions::new( &warp_args( alg, no_data))?;
    let mut usage_error: c_int = 0;

    let res = unsafe {
        let mut src_handles: Vec<gdal_sys::GDALDatasetH> = Vec::with_capacity( sources.len());
        for ds in sources {
            src_handles.push( ds.c_dataset());
        }

        gdal_sys::GDALWarp( null(), tgt_ds.c_dataset(), src_handles.len() as c_int, src_handles.as_mut_ptr(),
                            options.c_options, &mut usage_error)
    };

    if usage_error != 0 {
        return Err( misc_error("invalid warp arguments"))
    }
    if res.is_null() {
        return Err( last_gdal_error())
    }

    // res is the handle of tgt_ds, which is still owned (and eventually closed) by the Dataset
    read_band::<f64>( &tgt_ds, 1)
}
