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

use clap::Parser;
use anyhow::{Result, anyhow};
use odin_gdal::{Dataset, open_raster, write_raster, warp::{ResampleAlg, warp_onto_grid}};

/// warp one or more source rasters onto the grid of a template raster
#[derive(Parser,Debug)]
#[command(about = "warp source rasters onto the grid (extent, resolution, SRS) of a template raster")]
struct CliOpts {
    /// resampling algorithm
    #[arg(short,long,value_enum,default_value="nearest")]
    resample_alg: ResampleAlg,

    /// value for target cells that are not covered by any source
    #[arg(long,allow_hyphen_values=true,default_value="-9999")]
    no_data: f64,

    /// optional target create options (KEY=VALUE)
    #[arg(long)]
    co: Vec<String>,

    /// raster that defines the target grid
    #[arg(short,long)]
    template: String,

    /// output filename
    #[arg(short,long)]
    output: String,

    /// source filenames
    sources: Vec<String>,
}

fn main()->Result<()> {
    let opts = CliOpts::parse();
    if opts.sources.is_empty() { return Err( anyhow!("no source rasters")) }

    let (_,grid) = open_raster( &opts.template)?;
    let sources: Vec<Dataset> = opts.sources.iter().map( |p| Dataset::open(p)).collect::<Result<Vec<_>,_>>()?;
    let src_refs: Vec<&Dataset> = sources.iter().collect();

    let data = warp_onto_grid( &src_refs, &grid, opts.no_data, opts.resample_alg)?;
    write_raster::<f64>( &opts.output, &opts.output, &grid, &data, &opts.co)?;

    println!("warped {} source(s) onto {}x{} grid of {} -> {}", sources.len(), grid.width, grid.height, opts.template, opts.output);
    Ok(())
}
