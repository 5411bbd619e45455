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

use std::path::Path;
use clap::Parser;
use anyhow::Result;

use odin_gdal::open_raster;
use odin_gapfill::{GapFillConfig, load_config, tiles::tiles_for_grid, granule::{GranuleCache, GranuleKey}};

/// list the MODIS tiles that cover a raster
#[derive(Parser,Debug)]
#[command(about = "list the MODIS sinusoidal tiles (and cached reference granules) that cover a raster")]
struct CliOpts {
    /// year of the reference product
    #[arg(short,long)]
    year: Option<i32>,

    /// reference directory to check for cached granules
    #[arg(short,long)]
    reference_dir: Option<String>,

    /// optional RON config file for the reference product
    #[arg(short,long)]
    config: Option<String>,

    /// raster filename
    raster: String,
}

fn main()->Result<()> {
    let opts = CliOpts::parse();
    let config = match &opts.config {
        Some(path) => load_config( path)?,
        None => GapFillConfig::default()
    };

    let (_,grid) = open_raster( &opts.raster)?;
    let tiles = tiles_for_grid( &grid)?;

    // this is a query, don't create the reference dir
    let cache = match &opts.reference_dir {
        Some(dir) if Path::new(dir).is_dir() => Some( GranuleCache::open_existing( dir, config.day_of_year)?),
        Some(dir) => {
            eprintln!("reference dir {dir} does not exist, not checking for cached granules");
            None
        }
        None => None
    };

    for tile in &tiles {
        match opts.year {
            Some(year) => {
                let key = GranuleKey::new( &config.product, year, *tile);
                let cached = cache.as_ref().and_then( |c| c.lookup( &key));
                match cached {
                    Some(path) => println!("{tile}  {}*  -> {}", key.filename_prefix( config.day_of_year), path.display()),
                    None => println!("{tile}  {}*", key.filename_prefix( config.day_of_year)),
                }
            }
            None => println!("{tile}")
        }
    }

    Ok(())
}
