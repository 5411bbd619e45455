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

//! odin_gapfill fills cloud gaps of a (Landsat derived) vegetation cover raster with data of the coarser
//! MODIS vegetation continuous fields product (MOD44B). Missing MODIS granules are downloaded into a
//! local reference directory, warped onto the grid of the input raster and then used to replace gap cells.

use std::{fmt, fs, path::{Path,PathBuf}, sync::Arc};
use dashmap::DashMap;
use ndarray::Array2;
use serde::{Deserialize,Serialize};
use tracing::{debug, info, warn};

use odin_gdal::{Dataset, RasterGrid, read_raster_f64, write_raster, rename_raster, delete_raster};
pub use odin_gdal::warp::ResampleAlg;

mod errors;
pub use errors::*;

pub mod tiles;
pub mod gaps;
pub mod granule;
pub mod download;

use tiles::{ModisTile, tiles_for_grid};
use gaps::{GapSource, SentinelValues, gap_fraction, overlay, covered_cells};
use granule::{GranuleCache, GranuleKey, GranuleSource, granule_dataset_name};
use download::LpDaacSource;

/// value of aligned reference cells that are not covered by any granule. This has to be outside of the
/// value range of the reference product (MOD44B uses 0..255)
pub const NO_COVERAGE: f64 = -1.0;

/// reference product and data source configuration
#[derive(Clone,Serialize,Deserialize,Debug)]
#[serde(default)]
pub struct GapFillConfig {
    /// MODIS product short name
    pub product: String,

    /// product collection version
    pub version: String,

    /// acquisition day of year encoded in granule names (MOD44B is an annual product dated on day 65)
    pub day_of_year: u16,

    /// HDF-EOS grid and field to use as reference values
    pub layer: String,

    /// data pool URL from where to retrieve missing granules
    pub base_url: String,

    /// Earthdata login token (if not set we use the EARTHDATA_TOKEN env var)
    pub access_token: Option<String>,

    pub resample_alg: ResampleAlg,

    /// gap codes used if the caller does not specify any
    pub default_sentinels: SentinelValues,
}

impl Default for GapFillConfig {
    fn default() -> Self {
        GapFillConfig {
            product: "MOD44B".to_string(),
            version: "061".to_string(),
            day_of_year: 65,
            layer: "MOD44B_250m_GRID:Percent_Tree_Cover".to_string(),
            base_url: "https://e4ftl01.cr.usgs.gov/MOLT".to_string(),
            access_token: None,
            resample_alg: ResampleAlg::Nearest,
            default_sentinels: SentinelValues::default(),
        }
    }
}

/// load a RON config file
pub fn load_config (path: impl AsRef<Path>) -> Result<GapFillConfig> {
    let path = path.as_ref();
    let data = fs::read( path).map_err(|e| config_error( format!("cannot read config {path:?}: {e}")))?;
    Ok( ron::de::from_bytes( data.as_slice())? )
}

/* #region request and result types *********************************************************************************/

/// the parameters of a single gap fill operation
#[derive(Clone,Debug)]
pub struct FillRequest {
    /// the raster to fill
    pub primary: PathBuf,

    /// fill only if the gap fraction exceeds this value [0..1]
    pub threshold: f64,

    /// year of the reference product to use
    pub year: i32,

    /// where to look for (and store) reference granules
    pub reference_dir: PathBuf,

    /// optional raster that locates gaps instead of the primary
    pub alpha: Option<PathBuf>,

    pub sentinels: SentinelValues,

    /// required if we fill
    pub output: Option<PathBuf>,

    /// GDAL creation options for the output (e.g. "COMPRESS=DEFLATE")
    pub create_options: Vec<String>,
}

impl FillRequest {
    pub fn new (primary: impl AsRef<Path>, threshold: f64, year: i32, reference_dir: impl AsRef<Path>) -> Self {
        FillRequest {
            primary: primary.as_ref().to_path_buf(),
            threshold,
            year,
            reference_dir: reference_dir.as_ref().to_path_buf(),
            alpha: None,
            sentinels: SentinelValues::default(),
            output: None,
            create_options: Vec::new()
        }
    }

    pub fn with_output (mut self, output: impl AsRef<Path>) -> Self {
        self.output = Some( output.as_ref().to_path_buf());
        self
    }

    pub fn with_alpha (mut self, alpha: impl AsRef<Path>) -> Self {
        self.alpha = Some( alpha.as_ref().to_path_buf());
        self
    }

    pub fn with_sentinels (mut self, sentinels: SentinelValues) -> Self {
        self.sentinels = sentinels;
        self
    }

    pub fn with_create_options (mut self, create_options: Vec<String>) -> Self {
        self.create_options = create_options;
        self
    }

    pub fn gap_source (&self) -> GapSource {
        GapSource::from_alpha( self.alpha.clone())
    }
}

/// the (successful) result of a fill operation
#[derive(Clone,Debug,PartialEq)]
pub enum FillOutcome {
    Skipped { fraction: f64, threshold: f64 },
    Filled {
        input: PathBuf,
        output: PathBuf,
        fraction: f64,
        tiles: Vec<ModisTile>,
        filled: usize,
        unfilled: usize
    },
}

impl FillOutcome {
    pub fn is_filled (&self) -> bool {
        matches!( self, FillOutcome::Filled{..})
    }
}

impl fmt::Display for FillOutcome {
    fn fmt (&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillOutcome::Skipped { fraction, threshold } => {
                write!( f, "gap fraction {fraction:.3} does not exceed threshold {threshold} - no fill required")
            }
            FillOutcome::Filled { input, output, .. } => {
                write!( f, "filled gaps of {}, output written to {}", input.display(), output.display())
            }
        }
    }
}

/// tagged status of a fill operation that also covers failures
#[derive(Clone,Debug,PartialEq)]
pub enum FillStatus {
    Skipped { fraction: f64, threshold: f64 },
    Filled { input: PathBuf, output: PathBuf },
    Failed { kind: ErrorKind, detail: String },
}

impl From<Result<FillOutcome>> for FillStatus {
    fn from (res: Result<FillOutcome>) -> Self {
        match res {
            Ok(FillOutcome::Skipped { fraction, threshold }) => FillStatus::Skipped { fraction, threshold },
            Ok(FillOutcome::Filled { input, output, .. }) => FillStatus::Filled { input, output },
            Err(e) => FillStatus::Failed { kind: e.kind(), detail: e.to_string() }
        }
    }
}

impl fmt::Display for FillStatus {
    fn fmt (&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillStatus::Skipped { fraction, threshold } => {
                write!( f, "gap fraction {fraction:.3} does not exceed threshold {threshold} - no fill required")
            }
            FillStatus::Filled { input, output } => {
                write!( f, "filled gaps of {}, output written to {}", input.display(), output.display())
            }
            FillStatus::Failed { kind, detail } => write!( f, "gap fill failed ({kind}): {detail}")
        }
    }
}

/* #endregion request and result types */

/* #region the fill pipeline ****************************************************************************************/

/// the primary raster together with its gap statistics
pub struct GapMeasurement {
    pub grid: RasterGrid,
    pub primary: Array2<f64>,
    /// the alpha layer values, if gaps are not located by the primary itself
    pub alpha: Option<Array2<f64>>,
    pub fraction: f64,
}

impl GapMeasurement {
    /// the values that locate gaps
    pub fn mask (&self) -> &Array2<f64> {
        self.alpha.as_ref().unwrap_or( &self.primary)
    }
}

fn check_threshold (threshold: f64) -> Result<()> {
    if (0.0..=1.0).contains( &threshold) {
        Ok(())
    } else {
        Err( config_error( format!("threshold {threshold} not in [0,1]")))
    }
}

/// read the primary raster (and alpha layer if any) and compute the gap fraction
pub fn measure_gaps (req: &FillRequest) -> Result<GapMeasurement> {
    check_threshold( req.threshold)?;

    let (primary,grid) = read_raster_f64( &req.primary)
        .map_err(|e| input_unreadable( format!("{:?}: {e}", req.primary)))?;

    let alpha = match req.gap_source() {
        GapSource::Primary => None,
        GapSource::Alpha(path) => {
            let (alpha,alpha_grid) = read_raster_f64( &path)
                .map_err(|e| input_unreadable( format!("alpha layer {path:?}: {e}")))?;
            grid.check_same_size( &alpha_grid)
                .map_err(|e| input_unreadable( format!("alpha layer {path:?}: {e}")))?;
            Some(alpha)
        }
    };

    let fraction = gap_fraction( alpha.as_ref().unwrap_or( &primary), &req.sentinels);
    info!("gap fraction of {:?} is {:.4} (threshold {})", req.primary, fraction, req.threshold);

    Ok( GapMeasurement { grid, primary, alpha, fraction } )
}

// keep already classified errors, wrap the rest
fn classify (e: OdinGapFillError, wrap: impl FnOnce(String)->OdinGapFillError) -> OdinGapFillError {
    if e.kind() == ErrorKind::Other { wrap( e.to_string()) } else { e }
}

/// fill the gaps of an already measured primary (this does not check the threshold)
pub async fn fill_measured (m: &GapMeasurement, req: &FillRequest, config: &GapFillConfig,
                            cache: &GranuleCache, source: &dyn GranuleSource) -> Result<FillOutcome>
{
    let output = req.output.as_ref().ok_or_else( || config_error("no output path for filled raster"))?;

    let tiles = tiles_for_grid( &m.grid)
        .map_err(|e| alignment_failure( format!("cannot compute MODIS tiles for {:?}: {e}", req.primary)))?;
    if tiles.is_empty() {
        return Err( alignment_failure( format!("extent of {:?} does not intersect the MODIS tile grid", req.primary)))
    }
    info!("{:?} is covered by MODIS tiles {:?}", req.primary, tiles.iter().map(|t| t.to_string()).collect::<Vec<_>>());

    let mut granules: Vec<PathBuf> = Vec::with_capacity( tiles.len());
    for tile in &tiles {
        let key = GranuleKey::new( &config.product, req.year, *tile);
        let path = cache.resolve( &key, source).await.map_err(|e| classify( e, acquisition_failure))?;
        granules.push( path);
    }

    let datasets: Vec<Dataset> = granules.iter().map( |path| {
        Dataset::open( granule_dataset_name( path, &config.layer))
            .map_err(|e| acquisition_failure( format!("cannot open granule {path:?}: {e}")))
    }).collect::<Result<Vec<_>>>()?;
    let sources: Vec<&Dataset> = datasets.iter().collect();

    debug!("warping {} granule(s) onto {}x{} grid", sources.len(), m.grid.width, m.grid.height);
    let reference = odin_gdal::warp::warp_onto_grid( &sources, &m.grid, NO_COVERAGE, config.resample_alg)
        .map_err(|e| alignment_failure( format!("cannot warp granules onto grid of {:?}: {e}", req.primary)))?;
    if covered_cells( &reference, NO_COVERAGE) == 0 {
        return Err( alignment_failure( format!("reference granules do not overlap {:?}", req.primary)))
    }

    let (data,stats) = overlay( &m.primary, m.mask(), &reference, &req.sentinels, NO_COVERAGE)?;
    if stats.unfilled > 0 {
        warn!("{} gap cells of {:?} are not covered by reference data and remain unfilled", stats.unfilled, req.primary);
    }

    write_output( output, &m.grid, &data, &req.create_options)?;
    info!("filled {} gap cells, output written to {:?}", stats.filled, output);

    Ok( FillOutcome::Filled {
        input: req.primary.clone(),
        output: output.clone(),
        fraction: m.fraction,
        tiles,
        filled: stats.filled,
        unfilled: stats.unfilled
    })
}

/// write the u8 output raster. We write into a hidden temporary dataset next to `output` and only rename it (with
/// all its sidecar files) once it is complete, i.e. a failed write does not leave a (partial) output behind
pub fn write_output (output: &Path, grid: &RasterGrid, data: &Array2<u8>, create_options: &[String]) -> Result<()> {
    let tmp_path = temp_output_path( output)?;

    let res = write_raster::<u8>( &tmp_path, output, grid, data, create_options)
        .and_then( |_| rename_raster( output, &tmp_path, output))
        .map_err(|e| write_failure( format!("{output:?}: {e}")));

    if res.is_err() && tmp_path.exists() {
        // the dataset might not be readable if the write failed, in which case we can only remove the main file
        if delete_raster( output, &tmp_path).is_err() {
            if let Err(e) = fs::remove_file( &tmp_path) {
                warn!("failed to remove temporary output {:?}: {}", tmp_path, e);
            }
        }
    }

    res
}

/// `<dir>/out.tif` -> `<dir>/.out.part.tif`. We keep the extension last so that drivers derive sidecar names
/// (e.g. ENVI `.hdr`) from the same stem, which is what a dataset rename maps to the final name
pub fn temp_output_path (output: &Path) -> Result<PathBuf> {
    let stem = output.file_stem().and_then( |f| f.to_str())
        .ok_or_else( || write_failure( format!("invalid output path {output:?}")))?;

    let fname = match output.extension().and_then( |e| e.to_str()) {
        Some(ext) => format!(".{stem}.part.{ext}"),
        None => format!(".{stem}.part")
    };
    Ok( output.with_file_name( fname) )
}

/// single shot gap fill that indexes `req.reference_dir` on demand
pub async fn fill_gaps (req: &FillRequest, config: &GapFillConfig, source: &dyn GranuleSource) -> Result<FillOutcome> {
    let m = measure_gaps( req)?;
    if m.fraction <= req.threshold {
        return Ok( FillOutcome::Skipped { fraction: m.fraction, threshold: req.threshold })
    }

    let cache = GranuleCache::open( &req.reference_dir, config.day_of_year)
        .map_err(|e| classify( e, acquisition_failure))?;
    fill_measured( &m, req, config, &cache, source).await
}

/// the long lived gap filler, which keeps the granule index of each reference directory it has seen so that
/// concurrent requests for the same granule only download it once
pub struct GapFiller {
    config: GapFillConfig,
    source: Box<dyn GranuleSource>,
    caches: DashMap<PathBuf,Arc<GranuleCache>>,
}

impl GapFiller {
    pub fn new (config: GapFillConfig, source: impl GranuleSource + 'static) -> Self {
        GapFiller { config, source: Box::new(source), caches: DashMap::new() }
    }

    /// a gap filler that retrieves missing granules from the LP DAAC data pool
    pub fn with_lp_daac (config: GapFillConfig) -> Result<Self> {
        let source = LpDaacSource::new( &config)?;
        Ok( GapFiller::new( config, source) )
    }

    pub fn config (&self) -> &GapFillConfig { &self.config }

    /// get the (shared) granule index for `dir`, creating and scanning the directory on first use
    pub fn cache (&self, dir: &Path) -> Result<Arc<GranuleCache>> {
        fs::create_dir_all( dir)?;
        let dir = dir.canonicalize()?;

        if let Some(cache) = self.caches.get( &dir) {
            return Ok( cache.value().clone() )
        }

        let cache = Arc::new( GranuleCache::open( &dir, self.config.day_of_year)?);
        Ok( self.caches.entry( dir).or_insert( cache).value().clone() )
    }

    pub async fn fill_gaps (&self, req: &FillRequest) -> Result<FillOutcome> {
        let m = measure_gaps( req)?;
        if m.fraction <= req.threshold {
            return Ok( FillOutcome::Skipped { fraction: m.fraction, threshold: req.threshold })
        }

        let cache = self.cache( &req.reference_dir).map_err(|e| classify( e, acquisition_failure))?;
        fill_measured( &m, req, &self.config, &cache, self.source.as_ref()).await
    }

    pub async fn fill_gaps_status (&self, req: &FillRequest) -> FillStatus {
        self.fill_gaps( req).await.into()
    }
}

/* #endregion the fill pipeline */
