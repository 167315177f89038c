//! Named map definitions.

use forecast_common::{BoundingBox, ForecastError, ForecastResult};

use crate::cylindrical::{Miller, PlateCarree};
use crate::kavrayskiy::Kavrayskiy7;
use crate::perspective::Perspective;
use crate::polar::PolarAzimuthalEqualArea;
use crate::traits::MapProjection;

/// Name used when a program gets no projection argument.
pub const DEFAULT_PROJECTION: &str = "nh";

/// Coastline detail of the basemap layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoastlineResolution {
    Crude,
    Low,
    Intermediate,
}

impl CoastlineResolution {
    /// Single-letter code used in basemap file names.
    pub fn code(&self) -> char {
        match self {
            CoastlineResolution::Crude => 'c',
            CoastlineResolution::Low => 'l',
            CoastlineResolution::Intermediate => 'i',
        }
    }
}

/// Projection family and its parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProjectionFamily {
    Perspective { lon_0: f64, lat_0: f64, height: f64 },
    Kavrayskiy7 { lon_0: f64 },
    PolarAzimuthalEqualArea { bounding_lat: f64, lon_0: f64 },
    Miller { bbox: BoundingBox },
    PlateCarree { bbox: BoundingBox },
}

/// A map that can be requested by name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionDef {
    pub name: &'static str,
    pub family: ProjectionFamily,
    pub resolution: CoastlineResolution,
}

const fn bbox(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> BoundingBox {
    BoundingBox {
        min_x,
        min_y,
        max_x,
        max_y,
    }
}

pub const PROJ_DEFS: [ProjectionDef; 9] = [
    ProjectionDef {
        name: "nh",
        family: ProjectionFamily::Perspective { lon_0: -15.0, lat_0: 50.0, height: 4.0e6 },
        resolution: CoastlineResolution::Low,
    },
    ProjectionDef {
        name: "nh_shift",
        family: ProjectionFamily::Perspective { lon_0: 0.0, lat_0: 50.0, height: 4.0e6 },
        resolution: CoastlineResolution::Low,
    },
    ProjectionDef {
        name: "us",
        family: ProjectionFamily::Perspective { lon_0: -100.0, lat_0: 45.0, height: 4.0e6 },
        resolution: CoastlineResolution::Low,
    },
    ProjectionDef {
        name: "world",
        family: ProjectionFamily::Kavrayskiy7 { lon_0: 0.0 },
        resolution: CoastlineResolution::Crude,
    },
    ProjectionDef {
        name: "nh_polar",
        family: ProjectionFamily::PolarAzimuthalEqualArea { bounding_lat: 30.0, lon_0: 10.0 },
        resolution: CoastlineResolution::Crude,
    },
    ProjectionDef {
        name: "euratl",
        family: ProjectionFamily::Miller { bbox: bbox(-23.5, 29.5, 45.0, 70.5) },
        resolution: CoastlineResolution::Low,
    },
    ProjectionDef {
        name: "it",
        family: ProjectionFamily::Miller { bbox: bbox(6.0, 36.0, 19.0, 48.0) },
        resolution: CoastlineResolution::Intermediate,
    },
    ProjectionDef {
        name: "de",
        family: ProjectionFamily::PlateCarree { bbox: bbox(5.0, 46.5, 16.0, 56.0) },
        resolution: CoastlineResolution::Intermediate,
    },
    ProjectionDef {
        name: "mexico",
        family: ProjectionFamily::PlateCarree { bbox: bbox(-102.66, 20.84, -77.61, 36.74) },
        resolution: CoastlineResolution::Intermediate,
    },
];

/// Look up a map by name.
pub fn lookup(name: &str) -> ForecastResult<&'static ProjectionDef> {
    PROJ_DEFS
        .iter()
        .find(|def| def.name == name)
        .ok_or_else(|| ForecastError::UnknownProjection(name.to_string()))
}

/// All known map names in table order.
pub fn names() -> impl Iterator<Item = &'static str> {
    PROJ_DEFS.iter().map(|def| def.name)
}

impl ProjectionDef {
    /// Geographic cut-out of the regional maps; `None` for the globe views.
    pub fn bbox(&self) -> Option<BoundingBox> {
        match self.family {
            ProjectionFamily::Miller { bbox } | ProjectionFamily::PlateCarree { bbox } => Some(bbox),
            _ => None,
        }
    }

    /// Spacing of parallels and meridians on the map, in degrees.
    pub fn graticule_step(&self) -> f64 {
        match self.name {
            "it" | "de" => 5.0,
            _ => 10.0,
        }
    }

    /// Build the forward transform.
    pub fn build(&self) -> Box<dyn MapProjection> {
        match self.family {
            ProjectionFamily::Perspective { lon_0, lat_0, height } => {
                Box::new(Perspective::new(lon_0, lat_0, height))
            }
            ProjectionFamily::Kavrayskiy7 { lon_0 } => Box::new(Kavrayskiy7::new(lon_0)),
            ProjectionFamily::PolarAzimuthalEqualArea { bounding_lat, lon_0 } => {
                Box::new(PolarAzimuthalEqualArea::new(bounding_lat, lon_0))
            }
            ProjectionFamily::Miller { bbox } => Box::new(Miller::new(bbox)),
            ProjectionFamily::PlateCarree { bbox } => Box::new(PlateCarree::new(bbox)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let def = lookup("euratl").unwrap();
        assert_eq!(def.bbox(), Some(BoundingBox::new(-23.5, 29.5, 45.0, 70.5)));
        assert_eq!(def.resolution.code(), 'l');
        assert!(lookup("nh").unwrap().bbox().is_none());
    }

    #[test]
    fn test_unknown_projection() {
        assert!(matches!(
            lookup("mars"),
            Err(ForecastError::UnknownProjection(name)) if name == "mars"
        ));
    }

    #[test]
    fn test_names_are_unique() {
        let mut all: Vec<_> = names().collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), PROJ_DEFS.len());
        assert!(all.contains(&DEFAULT_PROJECTION));
    }

    #[test]
    fn test_global_maps_match_loader() {
        for def in PROJ_DEFS.iter() {
            let global = grib_loader::GLOBAL_PROJECTIONS.contains(&def.name);
            assert_eq!(global, def.bbox().is_none(), "{}", def.name);
        }
    }

    #[test]
    fn test_graticule_step() {
        assert_eq!(lookup("it").unwrap().graticule_step(), 5.0);
        assert_eq!(lookup("world").unwrap().graticule_step(), 10.0);
    }
}
