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

use std::fmt;
use thiserror::Error;
use odin_gdal::errors::OdinGdalError;

pub type Result<T> = std::result::Result<T, OdinGapFillError>;

#[derive(Error,Debug)]
pub enum OdinGapFillError {

    #[error("input not readable: {0}")]
    InputUnreadable(String),

    #[error("granule acquisition failed: {0}")]
    AcquisitionFailure(String),

    #[error("alignment failed: {0}")]
    AlignmentFailure(String),

    #[error("output not writable: {0}")]
    WriteFailure(String),

    #[error("config error: {0}")]
    ConfigError(String),

    // pass through for IO errors
    #[error("IO error: {0}")]
    IOError( #[from] std::io::Error),

    #[error("http error: {0}")]
    HttpError( #[from] reqwest::Error),

    #[error("config parse error: {0}")]
    RonError( #[from] ron::error::SpannedError),

    // pass through for OdinGdalErrors
    #[error("ODIN gdal error: {0}")]
    OdinGdalError( #[from] OdinGdalError),
}

/// the error taxonomy callers can dispatch on
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub enum ErrorKind {
    InputUnreadable,
    AcquisitionFailure,
    AlignmentFailure,
    WriteFailure,
    Config,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt (&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InputUnreadable => "input unreadable",
            ErrorKind::AcquisitionFailure => "acquisition failure",
            ErrorKind::AlignmentFailure => "alignment failure",
            ErrorKind::WriteFailure => "write failure",
            ErrorKind::Config => "config",
            ErrorKind::Other => "other",
        };
        f.write_str(s)
    }
}

impl OdinGapFillError {
    pub fn kind (&self) -> ErrorKind {
        use OdinGapFillError::*;
        match self {
            InputUnreadable(_) => ErrorKind::InputUnreadable,
            AcquisitionFailure(_) | HttpError(_) => ErrorKind::AcquisitionFailure,
            AlignmentFailure(_) => ErrorKind::AlignmentFailure,
            WriteFailure(_) => ErrorKind::WriteFailure,
            ConfigError(_) | RonError(_) => ErrorKind::Config,
            IOError(_) | OdinGdalError(_) => ErrorKind::Other,
        }
    }
}

pub fn input_unreadable<S: ToString> (msg: S)->OdinGapFillError {
    OdinGapFillError::InputUnreadable(msg.to_string())
}

pub fn acquisition_failure<S: ToString> (msg: S)->OdinGapFillError {
    OdinGapFillError::AcquisitionFailure(msg.to_string())
}

pub fn alignment_failure<S: ToString> (msg: S)->OdinGapFillError {
    OdinGapFillError::AlignmentFailure(msg.to_string())
}

pub fn write_failure<S: ToString> (msg: S)->OdinGapFillError {
    OdinGapFillError::WriteFailure(msg.to_string())
}

pub fn config_error<S: ToString> (msg: S)->OdinGapFillError {
    OdinGapFillError::ConfigError(msg.to_string())
}
