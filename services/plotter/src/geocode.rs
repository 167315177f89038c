//! City coordinates with a local CSV cache in front of the Mapbox
//! geocoding API.
//!
//! The cache has an index column holding the city and `lon`/`lat` columns:
//!
//! ```text
//! ,lon,lat
//! Hamburg,9.99302,53.55073
//! ```
//!
//! Only one process is expected to append to it at a time.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

use forecast_common::{ForecastError, ForecastResult};
use serde::Deserialize;
use tracing::{debug, info, instrument};

const PLACES_URL: &str = "https://api.mapbox.com/geocoding/v5/mapbox.places";

/// Resolves a place name to `(lon, lat)`.
pub trait Geocoder {
    fn lookup(&self, city: &str) -> ForecastResult<(f64, f64)>;
}

#[derive(Debug, Deserialize)]
struct PlacesResponse {
    #[serde(default)]
    features: Vec<PlaceFeature>,
}

#[derive(Debug, Deserialize)]
struct PlaceFeature {
    center: [f64; 2],
}

/// Centre of the first feature of a places response.
pub fn parse_places_response(city: &str, body: &str) -> ForecastResult<(f64, f64)> {
    let response: PlacesResponse = serde_json::from_str(body)
        .map_err(|e| ForecastError::Geocoding(format!("bad response for {}: {}", city, e)))?;
    response
        .features
        .first()
        .map(|f| (f.center[0], f.center[1]))
        .ok_or_else(|| ForecastError::Geocoding(format!("no place found for {}", city)))
}

/// Forward geocoding through `mapbox.places`.
pub struct MapboxGeocoder {
    api_key: Option<String>,
    client: reqwest::blocking::Client,
}

impl MapboxGeocoder {
    pub fn new(api_key: Option<String>) -> ForecastResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ForecastError::Geocoding(format!("cannot create HTTP client: {}", e)))?;
        Ok(Self { api_key, client })
    }

    fn url(city: &str, key: &str) -> String {
        format!("{}/{}.json?&access_token={}", PLACES_URL, city, key)
    }
}

impl Geocoder for MapboxGeocoder {
    fn lookup(&self, city: &str) -> ForecastResult<(f64, f64)> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ForecastError::Geocoding("MAPBOX_KEY is not set".to_string()))?;
        let body = self
            .client
            .get(Self::url(city, key))
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .map_err(|e| ForecastError::Geocoding(format!("request for {} failed: {}", city, e)))?;
        parse_places_response(city, &body)
    }
}

/// City, lon, lat; the city sits under the unnamed index column.
type CacheRow = (String, f64, f64);

/// Coordinates looked up once and remembered on disk.
pub struct CityCache<G = MapboxGeocoder> {
    path: PathBuf,
    geocoder: G,
}

impl CityCache<MapboxGeocoder> {
    pub fn new(path: impl Into<PathBuf>, api_key: Option<String>) -> ForecastResult<Self> {
        Ok(Self::with_geocoder(path, MapboxGeocoder::new(api_key)?))
    }
}

impl<G: Geocoder> CityCache<G> {
    pub fn with_geocoder(path: impl Into<PathBuf>, geocoder: G) -> Self {
        Self {
            path: path.into(),
            geocoder,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn cached(&self, city: &str) -> ForecastResult<Option<(f64, f64)>> {
        if !self.path.is_file() {
            return Ok(None);
        }
        let mut reader = csv::Reader::from_path(&self.path).map_err(csv_error)?;
        for row in reader.deserialize::<CacheRow>() {
            let (name, lon, lat) = row.map_err(csv_error)?;
            if name == city {
                return Ok(Some((lon, lat)));
            }
        }
        Ok(None)
    }

    fn append(&self, city: &str, lon: f64, lat: f64) -> ForecastResult<()> {
        let new_file = !self.path.exists();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if new_file {
            writer.write_record(["", "lon", "lat"]).map_err(csv_error)?;
        }
        writer
            .write_record([city.to_string(), lon.to_string(), lat.to_string()])
            .map_err(csv_error)?;
        writer.flush()?;
        Ok(())
    }

    /// `(lon, lat)` of `city`, from the cache when present, otherwise from
    /// the geocoder and then added to the cache.
    #[instrument(skip(self), fields(cache = %self.path.display()))]
    pub fn get_city_coordinates(&self, city: &str) -> ForecastResult<(f64, f64)> {
        if let Some(coords) = self.cached(city)? {
            debug!(lon = coords.0, lat = coords.1, "City found in cache");
            return Ok(coords);
        }
        let (lon, lat) = self.geocoder.lookup(city)?;
        self.append(city, lon, lat)?;
        info!(lon, lat, "City geocoded and cached");
        Ok((lon, lat))
    }
}

fn csv_error(e: csv::Error) -> ForecastError {
    ForecastError::Csv(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_places_response() {
        let body = r#"{"type":"FeatureCollection","features":[
            {"place_name":"Hamburg, Germany","center":[9.99302,53.55073]},
            {"place_name":"Hamburg, New York","center":[-78.83,42.72]}]}"#;
        let (lon, lat) = parse_places_response("Hamburg", body).unwrap();
        assert_eq!((lon, lat), (9.99302, 53.55073));
    }

    #[test]
    fn test_empty_features_is_an_error() {
        let err = parse_places_response("Atlantis", r#"{"features":[]}"#).unwrap_err();
        assert!(matches!(err, ForecastError::Geocoding(_)));
        assert_eq!(err.category(), "geocoding");
    }

    #[test]
    fn test_missing_key_is_an_error() {
        let geocoder = MapboxGeocoder::new(None).unwrap();
        assert!(matches!(geocoder.lookup("Milano"), Err(ForecastError::Geocoding(_))));
    }

    #[test]
    fn test_url() {
        assert_eq!(
            MapboxGeocoder::url("Milano", "pk.abc"),
            "https://api.mapbox.com/geocoding/v5/mapbox.places/Milano.json?&access_token=pk.abc"
        );
    }
}
