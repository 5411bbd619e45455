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

//! granule retrieval from the LP DAAC data pool (https://e4ftl01.cr.usgs.gov), which organizes
//! granules as `<base_url>/<product>.<version>/<yyyy.MM.dd>/<granule-file>`

use std::{io::Write, path::{Path,PathBuf}};
use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use reqwest::{Client, StatusCode, header::{HeaderMap, HeaderValue, AUTHORIZATION}};
use tracing::{debug, info};

use crate::GapFillConfig;
use crate::granule::{GranuleKey, GranuleSource};
use crate::errors::{Result, acquisition_failure, config_error};

/// env var that can provide the Earthdata login token if it is not in the config
pub const TOKEN_ENV_VAR: &str = "EARTHDATA_TOKEN";

pub struct LpDaacSource {
    client: Client,
    base_url: String,
    version: String,
    day_of_year: u16,
    headers: HeaderMap,
}

impl LpDaacSource {
    pub fn new (config: &GapFillConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();

        let token = config.access_token.clone().or_else( || std::env::var( TOKEN_ENV_VAR).ok());
        if let Some(token) = token {
            let hv = HeaderValue::from_str( format!("Bearer {token}").as_str())
                .map_err(|_| config_error("invalid access token"))?;
            headers.insert( AUTHORIZATION, hv);
        }

        Ok( LpDaacSource {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            version: config.version.clone(),
            day_of_year: config.day_of_year,
            headers
        })
    }

    /// the data pool directory that holds all tiles of a product for a given year
    pub fn dir_url (&self, key: &GranuleKey) -> Result<String> {
        let date = NaiveDate::from_yo_opt( key.year, self.day_of_year as u32)
            .ok_or_else( || config_error( format!("invalid acquisition date {}/{}", key.year, self.day_of_year)))?;
        Ok( format!("{}/{}.{}/{}/", self.base_url, key.product, self.version, date.format("%Y.%m.%d")) )
    }

    async fn get_text (&self, url: &str) -> Result<String> {
        let response = self.client.get(url).headers( self.headers.clone()).send().await?;
        match response.status() {
            StatusCode::OK => Ok( response.text().await? ),
            other => Err( acquisition_failure( format!("{url} response status {other:?}")))
        }
    }

    async fn download (&self, url: &str, path: &Path) -> Result<u64> {
        let dir = path.parent().ok_or_else( || acquisition_failure( format!("no parent dir for {path:?}")))?;
        let mut file = tempfile::NamedTempFile::new_in( dir)?; // don't use path yet as that would expose partial downloads to the world
        let mut len: u64 = 0;

        let mut response = self.client.get(url).headers( self.headers.clone()).send().await?;
        if response.status() != StatusCode::OK {
            return Err( acquisition_failure( format!("{url} response status {:?}", response.status())))
        }

        while let Some(chunk) = response.chunk().await? {
            len += chunk.len() as u64;
            file.write_all( &chunk)?;
        }
        file.flush()?;

        if len == 0 {
            return Err( acquisition_failure( format!("empty granule file {url}")))
        }

        file.persist( path).map_err( |e| e.error)?; // now make it visible as a permanent file
        Ok(len)
    }
}

/// find the granule filename for `key` in a data pool directory listing
pub fn find_granule_in_listing (listing: &str, key: &GranuleKey, day_of_year: u16, version: &str) -> Option<String> {
    let pattern = format!(r#"href="({}{}\.\d+\.hdf)""#, regex::escape( key.filename_prefix( day_of_year).as_str()), regex::escape( version));
    let re = Regex::new( pattern.as_str()).ok()?;

    // if there are several production runs use the latest one
    re.captures_iter( listing)
        .filter_map( |cap| cap.get(1).map( |m| m.as_str().to_string()))
        .max()
}

#[async_trait]
impl GranuleSource for LpDaacSource {
    async fn acquire (&self, key: &GranuleKey, dir: &Path) -> Result<PathBuf> {
        let dir_url = self.dir_url( key)?;
        debug!("retrieving granule listing {}", dir_url);
        let listing = self.get_text( &dir_url).await?;

        let fname = find_granule_in_listing( &listing, key, self.day_of_year, &self.version)
            .ok_or_else( || acquisition_failure( format!("no granule {key} in {dir_url}")))?;

        let url = format!("{dir_url}{fname}");
        let path = dir.join( fname.as_str());

        info!("downloading {}..", url);
        let len = self.download( &url, &path).await?;
        info!("{} kB saved to {:?}", len / 1024, path);

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::ModisTile;

    const LISTING: &str = r#"
<a href="MOD44B.A2015065.h08v04.061.2021216143250.hdf">MOD44B.A2015065.h08v04.061.2021216143250.hdf</a>
<a href="MOD44B.A2015065.h08v05.061.2021216143251.hdf">MOD44B.A2015065.h08v05.061.2021216143251.hdf</a>
<a href="MOD44B.A2015065.h08v05.061.2021216143251.hdf.xml">MOD44B.A2015065.h08v05.061.2021216143251.hdf.xml</a>
<a href="BROWSE.MOD44B.A2015065.h08v05.061.2021216143251.1.jpg">BROWSE.MOD44B.A2015065.h08v05.061.2021216143251.1.jpg</a>
"#;

    #[test]
    fn test_find_in_listing () {
        let key = GranuleKey::new("MOD44B", 2015, ModisTile{h:8, v:5});
        assert_eq!( find_granule_in_listing( LISTING, &key, 65, "061").as_deref(), Some("MOD44B.A2015065.h08v05.061.2021216143251.hdf"));

        let key = GranuleKey::new("MOD44B", 2015, ModisTile{h:9, v:5});
        assert!( find_granule_in_listing( LISTING, &key, 65, "061").is_none());
    }

    #[test]
    fn test_dir_url () {
        let config = GapFillConfig { base_url: "https://e4ftl01.cr.usgs.gov/MOLT/".into(), access_token: Some("x".into()), ..GapFillConfig::default() };
        let src = LpDaacSource::new( &config).unwrap();
        let key = GranuleKey::new("MOD44B", 2015, ModisTile{h:8, v:5});
        assert_eq!( src.dir_url( &key).unwrap(), "https://e4ftl01.cr.usgs.gov/MOLT/MOD44B.061/2015.03.06/");
    }
}
