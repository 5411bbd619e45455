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

use std::ffi::CStr;
use thiserror::Error;
use gdal::errors::GdalError;

pub type Result<T> = std::result::Result<T, OdinGdalError>;

#[derive(Error,Debug)]
pub enum OdinGdalError {

    // pass through for errors reported by the gdal crate
    #[error("GDAL error: {0}")]
    Error(#[from] GdalError),

    #[error("GDAL IO error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("raster shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),

    #[error("unsupported raster format: {0}")]
    UnsupportedFormat(String),

    #[error("raster grid mismatch: {0}")]
    GridMismatch(String),

    // error message retrieved from CPLGetLastErrorMsg after a failed gdal_sys call
    #[error("last GDAL error: {0}")]
    LastGdalError(String),

    // generic self-created error
    #[error("GDAL operation failed: {0}")]
    MiscError(String),
}

pub fn misc_error<S: ToString> (msg: S)->OdinGdalError {
    OdinGdalError::MiscError(msg.to_string())
}

pub fn grid_mismatch<S: ToString> (msg: S)->OdinGdalError {
    OdinGdalError::GridMismatch(msg.to_string())
}

pub fn gdal_error (e: GdalError)->OdinGdalError {
    OdinGdalError::Error(e)
}

/// get (and reset) the last error GDAL recorded for the current thread
pub fn last_gdal_error ()->OdinGdalError {
    let msg = unsafe {
        let p = gdal_sys::CPLGetLastErrorMsg();
        let msg = if p.is_null() { String::new() } else { CStr::from_ptr(p).to_string_lossy().into_owned() };
        gdal_sys::CPLErrorReset();
        msg
    };

    if msg.is_empty() {
        OdinGdalError::LastGdalError("unknown error".into())
    } else {
        OdinGdalError::LastGdalError(msg)
    }
}
