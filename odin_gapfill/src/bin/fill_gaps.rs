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
use tracing_subscriber::EnvFilter;

use odin_gapfill::{FillRequest, FillStatus, GapFillConfig, GapFiller, ResampleAlg, load_config, gaps::SentinelValues};

/// fill cloud gaps of a vegetation cover raster with MODIS MOD44B data
#[derive(Parser,Debug)]
#[command(about = "fill gaps (sentinel valued cells) of a raster with warped MODIS reference data")]
struct CliOpts {
    /// fill only if the gap fraction exceeds this threshold [0..1]
    #[arg(short,long,default_value="0.005")]
    threshold: f64,

    /// year of the MODIS reference product
    #[arg(short,long)]
    year: i32,

    /// directory where reference granules are looked up and stored
    #[arg(short,long)]
    reference_dir: String,

    /// optional raster that locates gaps instead of the input raster
    #[arg(short,long)]
    alpha: Option<String>,

    /// cell value that marks a gap (can be repeated, defaults to the configured sentinels)
    #[arg(short,long,allow_hyphen_values=true)]
    sentinel: Vec<f64>,

    /// optional output create options (KEY=VALUE)
    #[arg(long)]
    co: Vec<String>,

    /// optional RON config file for the reference product
    #[arg(short,long)]
    config: Option<String>,

    /// override of the configured resampling algorithm
    #[arg(long,value_enum)]
    resample_alg: Option<ResampleAlg>,

    /// output filename
    #[arg(short,long)]
    output: String,

    /// the raster to fill
    primary: String,
}

#[tokio::main]
async fn main()->Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter( EnvFilter::try_from_default_env().unwrap_or_else( |_| EnvFilter::new("info")))
        .init();

    let opts = CliOpts::parse();

    let mut config = match &opts.config {
        Some(path) => load_config( path)?,
        None => GapFillConfig::default()
    };
    if let Some(alg) = opts.resample_alg { config.resample_alg = alg }

    let sentinels = if opts.sentinel.is_empty() {
        config.default_sentinels.clone()
    } else {
        SentinelValues::new( opts.sentinel.clone())?
    };

    let mut req = FillRequest::new( &opts.primary, opts.threshold, opts.year, &opts.reference_dir)
        .with_output( &opts.output)
        .with_sentinels( sentinels)
        .with_create_options( opts.co.clone());
    if let Some(alpha) = &opts.alpha {
        req = req.with_alpha( alpha);
    }

    let filler = GapFiller::with_lp_daac( config)?;
    let status = filler.fill_gaps_status( &req).await;
    println!("{status}");

    match status {
        FillStatus::Failed { kind, .. } => Err( anyhow!("gap fill failed: {kind}")),
        _ => Ok(())
    }
}
