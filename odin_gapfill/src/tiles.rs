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

//! the fixed global tile grid of MODIS land products in sinusoidal projection.
//! The grid consists of 36 x 18 tiles of 10x10 degrees (at the equator), numbered h00..h35 (west to east)
//! and v00..v17 (north to south). See https://modis-land.gsfc.nasa.gov/MODLAND_grid.html

use std::{fmt, str::FromStr};
use geo::{coord, Rect};
use serde::{Deserialize, Serialize};
use odin_gdal::{RasterGrid, SpatialRef, transform_bounds_2d};

use crate::errors::{OdinGapFillError, Result, config_error};

/// radius of the authalic sphere used by the MODIS sinusoidal projection
pub const EARTH_RADIUS: f64 = 6371007.181;

/// tile edge length in meters
pub const TILE_SIZE: f64 = 1111950.5197665;

/// upper left corner of the tile grid
pub const X_MIN: f64 = -20015109.354;
pub const Y_MAX: f64 = 10007554.677;

pub const H_TILES: u8 = 36;
pub const V_TILES: u8 = 18;

pub const SINUSOIDAL_PROJ4: &str = "+proj=sinu +lon_0=0 +x_0=0 +y_0=0 +R=6371007.181 +units=m +no_defs";

pub fn sinusoidal_srs () -> Result<SpatialRef> {
    Ok( SpatialRef::from_proj4( SINUSOIDAL_PROJ4).map_err( odin_gdal::errors::gdal_error)? )
}

#[derive(Debug,Copy,Clone,PartialEq,Eq,Hash,PartialOrd,Ord,Serialize,Deserialize)]
pub struct ModisTile {
    pub h: u8,
    pub v: u8,
}

impl ModisTile {
    pub fn new (h: u8, v: u8) -> Option<ModisTile> {
        if h < H_TILES && v < V_TILES { Some( ModisTile{h,v} ) } else { None }
    }

    /// extent of the tile in sinusoidal meters
    pub fn bounds (&self) -> Rect<f64> {
        let west = X_MIN + self.h as f64 * TILE_SIZE;
        let north = Y_MAX - self.v as f64 * TILE_SIZE;
        Rect::new( coord!{ x: west, y: north - TILE_SIZE }, coord!{ x: west + TILE_SIZE, y: north })
    }

    /// does any part of the tile fall within the valid (ellipse shaped) area of the sinusoidal projection.
    /// Tiles outside of it do not exist as MODIS products
    pub fn in_projection_domain (&self) -> bool {
        let b = self.bounds();
        let (west,south) = b.min().x_y();
        let (east,north) = b.max().x_y();

        let y = if south <= 0.0 && north >= 0.0 { 0.0 } else { south.abs().min( north.abs()) };
        let x = if west <= 0.0 && east >= 0.0 { 0.0 } else { west.abs().min( east.abs()) };

        let lat = (y / EARTH_RADIUS).min( std::f64::consts::FRAC_PI_2);
        x <= EARTH_RADIUS * std::f64::consts::PI * lat.cos()
    }
}

impl fmt::Display for ModisTile {
    fn fmt (&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!( f, "h{:02}v{:02}", self.h, self.v)
    }
}

impl FromStr for ModisTile {
    type Err = OdinGapFillError;

    fn from_str (s: &str) -> Result<Self> {
        let invalid = || config_error( format!("invalid MODIS tile id '{s}'"));

        if s.len() != 6 || !s.is_ascii() || !s.starts_with('h') || s.as_bytes()[3] != b'v' { return Err( invalid()) }
        let h: u8 = s[1..3].parse().map_err(|_| invalid())?;
        let v: u8 = s[4..6].parse().map_err(|_| invalid())?;
        ModisTile::new( h, v).ok_or_else( invalid)
    }
}

// tolerance (in tile units) for bounds that fall on tile edges
const EDGE_EPS: f64 = 1e-9;

fn tile_index_range (lo: f64, hi: f64, n: u8) -> Option<(u8,u8)> {
    let i0 = (lo + EDGE_EPS).floor();
    let i1 = ((hi - EDGE_EPS).ceil() - 1.0).max(i0); // an upper bound on a tile edge does not include the next tile
    let max = (n - 1) as f64;

    if i1 < 0.0 || i0 > max {
        None
    } else {
        Some( (i0.clamp( 0.0, max) as u8, i1.clamp( 0.0, max) as u8) )
    }
}

/// all (existing) tiles that intersect the given extent in sinusoidal meters, ordered by row and column
pub fn tiles_for_sinusoidal_bounds (bounds: &Rect<f64>) -> Vec<ModisTile> {
    let (west,south) = bounds.min().x_y();
    let (east,north) = bounds.max().x_y();
    let mut tiles = Vec::new();

    let h_range = tile_index_range( (west - X_MIN) / TILE_SIZE, (east - X_MIN) / TILE_SIZE, H_TILES);
    let v_range = tile_index_range( (Y_MAX - north) / TILE_SIZE, (Y_MAX - south) / TILE_SIZE, V_TILES);

    if let (Some((h0,h1)), Some((v0,v1))) = (h_range, v_range) {
        for v in v0..=v1 {
            for h in h0..=h1 {
                let tile = ModisTile{h,v};
                if tile.in_projection_domain() { tiles.push( tile) }
            }
        }
    }

    tiles
}

/// all tiles that intersect the extent of `grid`, which can be in any SRS GDAL can transform into sinusoidal
pub fn tiles_for_grid (grid: &RasterGrid) -> Result<Vec<ModisTile>> {
    let s_srs = grid.spatial_ref()?;
    let t_srs = sinusoidal_srs()?;
    let bounds = transform_bounds_2d( &s_srs, &t_srs, &grid.bounds(), None)?;
    Ok( tiles_for_sinusoidal_bounds( &bounds) )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sinusoidal (lon_deg: f64, lat_deg: f64) -> (f64,f64) {
        let lat = lat_deg.to_radians();
        (EARTH_RADIUS * lon_deg.to_radians() * lat.cos(), EARTH_RADIUS * lat)
    }

    #[test]
    fn test_tile_bounds () {
        let b = ModisTile::new(18,9).unwrap().bounds();
        assert!( b.min().x.abs() < 1.0);         // h18 starts at the prime meridian
        assert!( (b.max().y).abs() < 1.0);       // v09 starts at the equator
        assert!( (b.width() - TILE_SIZE).abs() < 1e-6);
    }

    #[test]
    fn test_tile_for_point () {
        let (x,y) = sinusoidal( -120.0, 37.0); // central California
        let bounds = Rect::new( coord!{x: x, y: y}, coord!{x: x + 1000.0, y: y + 1000.0});
        let tiles = tiles_for_sinusoidal_bounds( &bounds);
        assert_eq!( tiles, vec![ ModisTile{h:8, v:5} ]);
    }

    #[test]
    fn test_tiles_across_boundary () {
        let edge = X_MIN + 9.0 * TILE_SIZE;
        let north = Y_MAX - 5.5 * TILE_SIZE;
        let bounds = Rect::new( coord!{x: edge - 5000.0, y: north - 5000.0}, coord!{x: edge + 5000.0, y: north});
        let tiles = tiles_for_sinusoidal_bounds( &bounds);
        assert_eq!( tiles, vec![ ModisTile{h:8, v:5}, ModisTile{h:9, v:5} ]);
    }

    #[test]
    fn test_upper_bound_on_edge () {
        let edge = X_MIN + 9.0 * TILE_SIZE;
        let north = Y_MAX - 5.5 * TILE_SIZE;
        let bounds = Rect::new( coord!{x: edge - 5000.0, y: north - 5000.0}, coord!{x: edge, y: north});
        assert_eq!( tiles_for_sinusoidal_bounds( &bounds), vec![ ModisTile{h:8, v:5} ]);
    }

    #[test]
    fn test_outside_grid () {
        let bounds = Rect::new( coord!{x: X_MIN - 3e6, y: 0.0}, coord!{x: X_MIN - 2e6, y: 1000.0});
        assert!( tiles_for_sinusoidal_bounds( &bounds).is_empty());
    }

    #[test]
    fn test_projection_domain () {
        assert!( !ModisTile{h:0, v:0}.in_projection_domain());
        assert!( ModisTile{h:17, v:0}.in_projection_domain());
        assert!( ModisTile{h:0, v:8}.in_projection_domain());
        assert!( ModisTile{h:8, v:5}.in_projection_domain());
    }

    #[test]
    fn test_parse_tile () {
        let tile: ModisTile = "h08v05".parse().unwrap();
        assert_eq!( tile, ModisTile{h:8, v:5});
        assert_eq!( tile.to_string(), "h08v05");

        assert!( "h36v05".parse::<ModisTile>().is_err());
        assert!( "x08v05".parse::<ModisTile>().is_err());
        assert!( "h8v5".parse::<ModisTile>().is_err());
    }
}
