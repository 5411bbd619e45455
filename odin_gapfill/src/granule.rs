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

//! local granule store. Granules are kept in a reference directory (tree) under their original
//! product filenames `<product>.A<year><doy>.<tile>.<version>.<production-time>.<ext>`, which we
//! index by (product,year,tile)

use std::{fmt, fs, io, path::{Path,PathBuf}, sync::Arc};
use async_trait::async_trait;
use dashmap::DashMap;
use lazy_static::lazy_static;
use regex::Regex;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::tiles::ModisTile;
use crate::errors::{Result, acquisition_failure};

lazy_static! {
    // [product, year, doy, tile, remainder]
    static ref GRANULE_RE: Regex = Regex::new( r"^([A-Za-z0-9]+)\.A(\d{4})(\d{3})\.(h\d{2}v\d{2})\.(.+)$").unwrap();
}

/// file extensions of granule data files (this excludes metadata and browse images with the same prefix)
const GRANULE_EXTS: &[&str] = &["hdf", "tif", "tiff", "vrt", "nc", "img"];

/// the cache key of a reference granule
#[derive(Debug,Clone,PartialEq,Eq,Hash)]
pub struct GranuleKey {
    pub product: String,
    pub year: i32,
    pub tile: ModisTile,
}

impl GranuleKey {
    pub fn new (product: impl ToString, year: i32, tile: ModisTile) -> Self {
        GranuleKey { product: product.to_string(), year, tile }
    }

    /// the filename prefix of all granules for this key and the given acquisition day
    pub fn filename_prefix (&self, day_of_year: u16) -> String {
        format!("{}.A{:04}{:03}.{}.", self.product, self.year, day_of_year, self.tile)
    }
}

impl fmt::Display for GranuleKey {
    fn fmt (&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!( f, "{}.A{}.{}", self.product, self.year, self.tile)
    }
}

/// parse a granule filename into its key and acquisition day of year
pub fn parse_granule_filename (fname: &str) -> Option<(GranuleKey,u16)> {
    let ext = fname.rsplit_once('.').map( |(_,ext)| ext.to_ascii_lowercase())?;
    if !GRANULE_EXTS.contains( &ext.as_str()) { return None }

    let cap = GRANULE_RE.captures( fname)?;
    let year: i32 = cap.get(2)?.as_str().parse().ok()?;
    let doy: u16 = cap.get(3)?.as_str().parse().ok()?;
    let tile: ModisTile = cap.get(4)?.as_str().parse().ok()?;

    Some( (GranuleKey::new( cap.get(1)?.as_str(), year, tile), doy) )
}

/// the name under which GDAL can open the data layer of a granule. HDF-EOS granules contain several grids and
/// fields so we have to address the sub-dataset, all other formats are opened directly
pub fn granule_dataset_name (path: &Path, layer: &str) -> String {
    let is_hdf = path.extension().and_then(|e| e.to_str()).map( |e| e.eq_ignore_ascii_case("hdf")).unwrap_or(false);
    if is_hdf && !layer.is_empty() {
        format!("HDF4_EOS:EOS_GRID:\"{}\":{}", path.display(), layer)
    } else {
        path.display().to_string()
    }
}

/// the abstraction for something that can retrieve missing granules (usually from a remote server)
#[async_trait]
pub trait GranuleSource: Send + Sync {
    /// obtain the granule for `key` and store it in `dir`, returning the path of the new file.
    /// Implementors should not expose partially written files under a granule name
    async fn acquire (&self, key: &GranuleKey, dir: &Path) -> Result<PathBuf>;
}

/// an index of the granules in a reference directory, for a specific acquisition day of the year
pub struct GranuleCache {
    dir: PathBuf,
    day_of_year: u16,
    index: DashMap<GranuleKey,PathBuf>,
    locks: DashMap<GranuleKey,Arc<Mutex<()>>>,
}

impl GranuleCache {
    /// open (and if required create) the reference directory and index all granules in it
    pub fn open (dir: impl AsRef<Path>, day_of_year: u16) -> Result<GranuleCache> {
        fs::create_dir_all( dir.as_ref())?;
        GranuleCache::open_existing( dir, day_of_year)
    }

    /// index the granules of an existing reference directory without creating it
    pub fn open_existing (dir: impl AsRef<Path>, day_of_year: u16) -> Result<GranuleCache> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err( acquisition_failure( format!("reference dir {dir:?} does not exist")))
        }

        let cache = GranuleCache { dir, day_of_year, index: DashMap::new(), locks: DashMap::new() };
        let n = cache.scan()?;
        debug!("indexed {} granules in {:?}", n, cache.dir);

        Ok(cache)
    }

    pub fn dir (&self) -> &Path { &self.dir }

    pub fn day_of_year (&self) -> u16 { self.day_of_year }

    pub fn len (&self) -> usize { self.index.len() }

    pub fn is_empty (&self) -> bool { self.index.is_empty() }

    /// (re-)index the directory tree. If there are several granules for the same key (e.g. different
    /// production runs) we use the one with the lexicographically largest filename, i.e. the latest
    pub fn scan (&self) -> Result<usize> {
        let mut files: Vec<PathBuf> = Vec::new();
        collect_files( &self.dir, &mut files)?;

        for path in files {
            let Some(fname) = path.file_name().and_then(|f| f.to_str()) else { continue };
            if let Some((key,doy)) = parse_granule_filename( fname) {
                if doy != self.day_of_year { continue }

                let mut e = self.index.entry(key).or_insert_with( || path.clone());
                if e.value().file_name() < path.file_name() {
                    *e.value_mut() = path;
                }
            }
        }

        Ok( self.index.len() )
    }

    /// the path of an existing granule file for `key`
    pub fn lookup (&self, key: &GranuleKey) -> Option<PathBuf> {
        self.index.get( key).map( |e| e.value().clone()).filter( |p| p.is_file())
    }

    pub fn insert (&self, key: GranuleKey, path: PathBuf) {
        self.index.insert( key, path);
    }

    /// get the path of the granule for `key`, acquiring it through `source` if it is not in the cache yet.
    /// Concurrent resolves for the same key are serialized so that only the first one acquires
    pub async fn resolve (&self, key: &GranuleKey, source: &dyn GranuleSource) -> Result<PathBuf> {
        if let Some(path) = self.lookup( key) {
            debug!("using cached granule {:?}", path);
            return Ok(path)
        }

        let lock = self.locks.entry( key.clone()).or_default().clone();
        let res = {
            let _guard = lock.lock().await;
            self.resolve_locked( key, source).await
        };

        // nobody else is waiting for this key
        drop( lock);
        self.locks.remove_if( key, |_,l| Arc::strong_count(l) == 1);

        res
    }

    /// number of keys that currently have acquisitions in flight
    pub fn pending (&self) -> usize { self.locks.len() }

    async fn resolve_locked (&self, key: &GranuleKey, source: &dyn GranuleSource) -> Result<PathBuf> {
        // somebody else might have stored it while we were waiting for the lock
        if let Some(path) = self.lookup( key) {
            return Ok(path)
        }
        self.scan()?;
        if let Some(path) = self.lookup( key) {
            debug!("granule {:?} appeared in cache dir", path);
            return Ok(path)
        }

        info!("acquiring granule {} into {:?}", key, self.dir);
        let path = source.acquire( key, &self.dir).await?;
        if !path.is_file() {
            return Err( acquisition_failure( format!("acquired granule {key} not found at {path:?}")))
        }

        self.insert( key.clone(), path.clone());
        Ok(path)
    }
}

fn collect_files (dir: &Path, list: &mut Vec<PathBuf>) -> io::Result<()> {
    if dir.is_dir() {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                collect_files( &path, list)?;
            } else {
                list.push( path);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filename () {
        let (key,doy) = parse_granule_filename("MOD44B.A2015065.h08v05.061.2021216143251.hdf").unwrap();
        assert_eq!( key, GranuleKey::new("MOD44B", 2015, ModisTile{h:8, v:5}));
        assert_eq!( doy, 65);
        assert_eq!( key.filename_prefix(doy), "MOD44B.A2015065.h08v05.");

        assert!( parse_granule_filename("MOD44B.A2015065.h08v05.061.2021216143251.hdf.xml").is_none());
        assert!( parse_granule_filename("MOD44B.A2015065.h08v05.061.jpg").is_none());
        assert!( parse_granule_filename("MOD44B.2015065.h08v05.061.hdf").is_none());
        assert!( parse_granule_filename("MOD44B.A2015065.h40v05.061.hdf").is_none());
    }

    #[test]
    fn test_dataset_name () {
        let p = Path::new("/data/MOD44B.A2015065.h08v05.061.1.hdf");
        assert_eq!( granule_dataset_name( p, "MOD44B_250m_GRID:Percent_Tree_Cover"),
                    "HDF4_EOS:EOS_GRID:\"/data/MOD44B.A2015065.h08v05.061.1.hdf\":MOD44B_250m_GRID:Percent_Tree_Cover");

        let p = Path::new("/data/MOD44B.A2015065.h08v05.061.tif");
        assert_eq!( granule_dataset_name( p, "MOD44B_250m_GRID:Percent_Tree_Cover"), "/data/MOD44B.A2015065.h08v05.061.tif");
    }

    struct FileSource;

    #[async_trait]
    impl GranuleSource for FileSource {
        async fn acquire (&self, key: &GranuleKey, dir: &Path) -> Result<PathBuf> {
            let path = dir.join( format!("{}061.2021216143251.hdf", key.filename_prefix(65)));
            fs::write( &path, b"x")?;
            Ok(path)
        }
    }

    #[tokio::test]
    async fn test_resolve_releases_locks () {
        let tmp = tempfile::tempdir().unwrap();
        let cache = GranuleCache::open( tmp.path(), 65).unwrap();

        for h in 8..12 {
            let key = GranuleKey::new("MOD44B", 2015, ModisTile{h, v:5});
            let path = cache.resolve( &key, &FileSource).await.unwrap();
            assert!( path.is_file());
        }
        assert_eq!( cache.len(), 4);
        assert_eq!( cache.pending(), 0);
    }

    #[test]
    fn test_open_existing () {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("not_there");
        assert!( GranuleCache::open_existing( &dir, 65).is_err());
        assert!( !dir.exists());

        assert!( GranuleCache::open( &dir, 65).unwrap().is_empty());
        assert!( dir.is_dir());
    }

    #[test]
    fn test_scan () {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("2015");
        fs::create_dir_all( &sub).unwrap();
        fs::write( sub.join("MOD44B.A2015065.h08v05.061.2016001000000.hdf"), b"x").unwrap();
        fs::write( sub.join("MOD44B.A2015065.h08v05.061.2021216143251.hdf"), b"x").unwrap();
        fs::write( sub.join("MOD44B.A2015065.h08v05.061.2021216143251.hdf.xml"), b"x").unwrap();
        fs::write( tmp.path().join("MOD44B.A2015065.h09v05.061.2021216143251.hdf"), b"x").unwrap();
        fs::write( tmp.path().join("MOD44B.A2015097.h10v05.061.2021216143251.hdf"), b"x").unwrap(); // wrong day

        let cache = GranuleCache::open( tmp.path(), 65).unwrap();
        assert_eq!( cache.len(), 2);

        let path = cache.lookup( &GranuleKey::new("MOD44B", 2015, ModisTile{h:8,v:5})).unwrap();
        assert!( path.ends_with("2015/MOD44B.A2015065.h08v05.061.2021216143251.hdf"));
        assert!( cache.lookup( &GranuleKey::new("MOD44B", 2016, ModisTile{h:8,v:5})).is_none());
        assert!( cache.lookup( &GranuleKey::new("MOD44B", 2015, ModisTile{h:10,v:5})).is_none());
    }
}
