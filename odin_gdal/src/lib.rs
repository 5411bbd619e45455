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

pub mod errors;
pub mod warp;

use lazy_static::lazy_static;
use std::{collections::HashMap, path::Path};
use geo::{coord, Rect};
use ndarray::Array2;

// we re-export these so that other crates don't have to use a direct gdal depedency to import.
// this is to ensure we run bindgen for new GDAL versions that don't yet have pre-computed bindings in gdal-sys
pub use gdal::{self, Driver, DriverManager, Metadata, Dataset, errors::GdalError, GeoTransform, GeoTransformEx, cpl::CslStringList};
pub use gdal::raster::{GdalType,GdalDataType,RasterBand,Buffer};
pub use gdal::spatial_ref::{CoordTransform, CoordTransformOptions, SpatialRef};

use crate::errors::{Result, OdinGdalError, misc_error, grid_mismatch, gdal_error};

/// the GDAL driver we use if we can't infer one from the output filename
pub const DEFAULT_DRIVER: &str = "GTiff";

lazy_static! {
    // note that we can't automatically populate this by iterating over DriverManager since some
    // drivers use the same file extension. Only drivers that support Create() belong here
    static ref EXT_MAP: HashMap<&'static str, &'static str> = HashMap::from( [ // file extension -> driver short name
        ("tif", "GTiff"),
        ("tiff", "GTiff"),
        ("img", "HFA"),
        ("nc", "netCDF"),
        ("hdf", "HDF4Image"),
        ("kea", "KEA"),
        ("rst", "RST"),
        ("envi", "ENVI"),

        //... and many more to follow (see http://gdal.org/drivers
    ]);
}

/// Note that filename extension has to be lowercase
pub fn get_driver_name_for_extension (ext: &str) -> Option<&'static str> {
    EXT_MAP.get( ext).map(|v| &**v)
}

/// case insensitive lookup of the driver short name for the extension of `path`
pub fn get_driver_name_from_path (path: impl AsRef<Path>) -> Option<&'static str> {
    path.as_ref().extension()
        .and_then( |ext| ext.to_str())
        .and_then( |ext| get_driver_name_for_extension( ext.to_ascii_lowercase().as_str()))
}

pub fn to_csl_string_list (strings: &[String]) -> Result<CslStringList> {
    let mut co_list =  CslStringList::new();
    for s in strings {
        co_list.add_string(s.as_str())?;
    }
    Ok(co_list)
}

/* #region raster grids *********************************************************************************************/

/// the spatial frame of a raster: pixel dimensions, affine geotransform and SRS (as WKT)
#[derive(Debug,Clone,PartialEq)]
pub struct RasterGrid {
    pub width: usize,
    pub height: usize,
    pub geo_transform: GeoTransform,
    pub projection: String,
}

impl RasterGrid {
    pub fn from_dataset (ds: &Dataset) -> Result<RasterGrid> {
        let (width,height) = ds.raster_size();
        if width == 0 || height == 0 {
            return Err( misc_error( format!("raster has invalid dimensions {width}x{height}")))
        }

        Ok( RasterGrid {
            width,
            height,
            geo_transform: ds.geo_transform()?,
            projection: ds.projection()
        })
    }

    #[inline]
    pub fn n_cells (&self) -> usize { self.width * self.height }

    /// (rows,cols) as used by ndarray
    #[inline]
    pub fn shape (&self) -> (usize,usize) { (self.height, self.width) }

    pub fn pixel_size (&self) -> (f64,f64) {
        (self.geo_transform[1].abs(), self.geo_transform[5].abs())
    }

    pub fn spatial_ref (&self) -> Result<SpatialRef> {
        if self.projection.is_empty() {
            Err( misc_error("raster has no spatial reference system"))
        } else {
            Ok( SpatialRef::from_wkt( &self.projection)? )
        }
    }

    /// the extent of the grid in SRS units, computed from all four corners so that rotated grids are covered
    pub fn bounds (&self) -> Rect<f64> {
        let gt = &self.geo_transform;
        let w = self.width as f64;
        let h = self.height as f64;
        let corners = [ gt.apply(0.0, 0.0), gt.apply(w, 0.0), gt.apply(0.0, h), gt.apply(w, h) ];

        let (mut x_min, mut y_min) = (f64::MAX, f64::MAX);
        let (mut x_max, mut y_max) = (f64::MIN, f64::MIN);
        for (x,y) in corners {
            x_min = x_min.min(x); x_max = x_max.max(x);
            y_min = y_min.min(y); y_max = y_max.max(y);
        }

        Rect::new( coord!{ x: x_min, y: y_min }, coord!{ x: x_max, y: y_max })
    }

    pub fn check_same_size (&self, other: &RasterGrid) -> Result<()> {
        if self.width == other.width && self.height == other.height {
            Ok(())
        } else {
            Err( grid_mismatch( format!("{}x{} != {}x{}", self.width, self.height, other.width, other.height)))
        }
    }
}

/* #endregion raster grids */

/* #region generic Dataset/Rasterband access ************************************************************************/

pub fn open_raster (path: impl AsRef<Path>) -> Result<(Dataset,RasterGrid)> {
    let ds = Dataset::open( path.as_ref())?;
    if ds.raster_count() < 1 {
        return Err( misc_error( format!("no raster bands in {:?}", path.as_ref())))
    }
    let grid = RasterGrid::from_dataset(&ds)?;
    Ok( (ds,grid) )
}

/// read a whole rasterband into a (rows,cols) array
pub fn read_band<T> (ds: &Dataset, band_index: usize) -> Result<Array2<T>> where T: Copy + GdalType {
    let band = ds.rasterband(band_index)?;
    let (w,h) = band.size();
    let buf: Buffer<T> = band.read_as( (0,0), (w,h), (w,h), None)?;
    Ok( Array2::from_shape_vec( (h,w), buf.data().to_vec())? )
}

/// open `path` and read its first band as f64 values, returning the data together with the grid it is defined on
pub fn read_raster_f64 (path: impl AsRef<Path>) -> Result<(Array2<f64>,RasterGrid)> {
    let (ds,grid) = open_raster( path)?;
    let data = read_band::<f64>( &ds, 1)?;
    Ok( (data,grid) )
}

pub fn write_band<T> (ds: &Dataset, band_index: usize, data: &Array2<T>) -> Result<()> where T: Copy + GdalType {
    let mut band = ds.rasterband(band_index)?;
    let (h,w) = data.dim();
    let (bw,bh) = band.size();
    if bw != w || bh != h {
        return Err( grid_mismatch( format!("data {w}x{h} does not fit band {bw}x{bh}")))
    }

    let mut buf = Buffer::new( (w,h), data.iter().copied().collect());
    band.write( (0,0), (w,h), &mut buf)?;
    Ok(())
}

/// create a single band dataset of type T that has the same grid as `grid`
pub fn create_dataset_for_grid<T,P> (driver: &Driver, path: P, grid: &RasterGrid, create_opts: &[String]) -> Result<Dataset>
    where T: Copy + GdalType, P: AsRef<Path>
{
    let mut ds = if create_opts.is_empty() {
        driver.create_with_band_type::<T,P>( path, grid.width, grid.height, 1)?
    } else {
        let co = to_csl_string_list( create_opts)?;
        driver.create_with_band_type_with_options::<T,P>( path, grid.width, grid.height, 1, &co)?
    };

    ds.set_geo_transform( &grid.geo_transform)?;
    if !grid.projection.is_empty() {
        ds.set_projection( grid.projection.as_str())?;
    }

    Ok(ds)
}

/// create an in-memory dataset for `grid` with all cells initialized to `no_data`
pub fn create_mem_dataset<T> (grid: &RasterGrid, no_data: f64) -> Result<Dataset> where T: Copy + GdalType {
    let driver = DriverManager::get_driver_by_name("MEM")?;
    let ds = create_dataset_for_grid::<T,_>( &driver, "", grid, &[])?;
    {
        let mut band = ds.rasterband(1)?;
        band.set_no_data_value( Some(no_data))?;
        band.fill( no_data, None)?;
    }
    Ok(ds)
}

/// the driver we use to create raster files for the extension of `driver_path`
pub fn get_write_driver (driver_path: impl AsRef<Path>) -> Result<Driver> {
    let driver_name = get_driver_name_from_path( driver_path.as_ref()).unwrap_or( DEFAULT_DRIVER);
    DriverManager::get_driver_by_name( driver_name)
        .map_err(|_| OdinGdalError::UnsupportedFormat( driver_name.to_string()))
}

/// write `data` as a single band raster file of type T with the given grid. The driver is chosen by
/// the extension of `driver_path` (which allows to write to temporary files with non-standard extensions)
pub fn write_raster<T> (path: impl AsRef<Path>, driver_path: impl AsRef<Path>, grid: &RasterGrid, data: &Array2<T>, create_opts: &[String]) -> Result<()>
    where T: Copy + GdalType
{
    if data.dim() != grid.shape() {
        return Err( grid_mismatch( format!("data shape {:?} does not match grid shape {:?}", data.dim(), grid.shape())))
    }

    let driver = get_write_driver( driver_path)?;
    let ds = create_dataset_for_grid::<T,_>( &driver, path.as_ref(), grid, create_opts)?;
    write_band( &ds, 1, data)?;

    Ok(()) // dataset gets flushed and closed when dropped
}

/// rename a closed raster dataset including all its sidecar files (headers, .aux.xml etc.)
pub fn rename_raster (driver_path: impl AsRef<Path>, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
    let driver = get_write_driver( driver_path)?;
    Ok( driver.rename( to.as_ref(), from.as_ref())? )
}

/// delete a closed raster dataset including all its sidecar files
pub fn delete_raster (driver_path: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<()> {
    let driver = get_write_driver( driver_path)?;
    Ok( driver.delete( path.as_ref())? )
}

/* #endregion generic Dataset/Rasterband access */

/* #region SpatialRef based coordinate transformations **************************************************************/

// watch out - if source or target are geographic we might have to swap axis order
// (we don't want to change axis_mapping_strategy in the provided SpatialRefs though)
pub fn transform_bounds_2d (s_srs: &SpatialRef, t_srs: &SpatialRef, bounds: &Rect<f64>, opt_densify_pts: Option<i32>) -> Result<Rect<f64>> {
    let s_is_geo = s_srs.is_geographic();
    let t_is_geo = t_srs.is_geographic();

    let (x_min, y_min) = bounds.min().x_y();
    let (x_max, y_max) = bounds.max().x_y();

    let bounds: [f64;4] = if s_is_geo && !t_is_geo { [y_min,x_min,y_max,x_max] } else { [x_min,y_min,x_max,y_max] };
    let densify_pts: i32 = opt_densify_pts.unwrap_or(21); // default recommended by GDAL OCTTransformBounds doc

    let mut ct_options = CoordTransformOptions::new()?;
    ct_options.desired_accuracy( 0.0);
    ct_options.set_ballpark_allowed(false);

    let a = CoordTransform::new_with_options( s_srs, t_srs, &ct_options)
        .and_then( |transform| transform.transform_bounds( &bounds, densify_pts))
        .map_err( gdal_error)?;

    let (x0,y0,x1,y1) = if t_is_geo && !s_is_geo { (a[1], a[0], a[3], a[2]) } else { (a[0], a[1], a[2], a[3]) };
    Ok( Rect::new( coord!{ x: x0, y: y0 }, coord!{ x: x1, y: y1 }) )
}

/* #endregion SpatialRef based coordinate transformations */
