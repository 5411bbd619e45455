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
use anyhow::Result;
use odin_gdal::{open_raster, read_band};

/// print the grid (size, geotransform, extent and SRS) of a raster file
#[derive(Parser,Debug)]
#[command(about = "show the grid of a GDAL raster file")]
struct CliOpts {
    /// also print the value range of the first band
    #[arg(short,long)]
    values: bool,

    /// raster filename
    filename: String,
}

fn main()->Result<()> {
    let opts = CliOpts::parse();
    let (ds,grid) = open_raster( &opts.filename)?;
    let bounds = grid.bounds();
    let (dx,dy) = grid.pixel_size();

    println!("size:          {} x {}", grid.width, grid.height);
    println!("pixel size:    {dx} x {dy}");
    println!("geotransform:  {:?}", grid.geo_transform);
    println!("extent:        [{}, {}, {}, {}]", bounds.min().x, bounds.min().y, bounds.max().x, bounds.max().y);
    println!("srs:           {}", if grid.projection.is_empty() { "<none>" } else { grid.projection.as_str() });

    if opts.values {
        let data = read_band::<f64>( &ds, 1)?;
        let (min,max) = data.iter().fold( (f64::MAX,f64::MIN), |(lo,hi),v| (lo.min(*v), hi.max(*v)));
        println!("values:        {min} .. {max}");
    }

    Ok(())
}
