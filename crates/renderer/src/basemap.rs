//! Static map layers: boundary, land, graticule, coastlines and borders.
//!
//! Shapes come from GeoJSON files in the shapefile directory, named after
//! the coastline resolution of the map (`land_l.geojson`,
//! `coastline_l.geojson`, `borders_l.geojson`), plus the administrative
//! lines some regional maps add. Those are ESRI shapefiles
//! (`ITA_adm/ITA_adm1.shp`). A missing file only costs its layer.

use std::fs;
use std::path::Path;

use projection::MapSetup;
use serde_json::Value;
use shapefile::{PolygonRing, Shape, ShapeReader};
use tiny_skia::{FillRule, Mask, Path as SkPath, PathBuilder, Pixmap, Stroke, Transform};
use tracing::{debug, info, warn};

use crate::canvas::Canvas;
use crate::color::Color;
use crate::error::{RenderError, RenderResult};

type Ring = Vec<(f64, f64)>;

/// Geometry of one GeoJSON file, as lon/lat pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shapes {
    /// Polygons as outer ring followed by holes
    pub polygons: Vec<Vec<Ring>>,
    pub lines: Vec<Ring>,
}

impl Shapes {
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty() && self.lines.is_empty()
    }

    /// Every polygon ring and line, for drawing outlines.
    pub fn outlines(&self) -> impl Iterator<Item = &Ring> {
        self.polygons.iter().flatten().chain(self.lines.iter())
    }
}

fn positions(value: &Value) -> Option<Ring> {
    value
        .as_array()?
        .iter()
        .map(|p| {
            let p = p.as_array()?;
            Some((p.first()?.as_f64()?, p.get(1)?.as_f64()?))
        })
        .collect()
}

fn rings(value: &Value) -> Option<Vec<Ring>> {
    value.as_array()?.iter().map(positions).collect()
}

fn collect_geometry(geometry: &Value, shapes: &mut Shapes) -> Result<(), String> {
    let kind = geometry
        .get("type")
        .and_then(Value::as_str)
        .ok_or("geometry without type")?;
    let coords = geometry.get("coordinates");
    let bad = || format!("malformed {} coordinates", kind);
    match kind {
        "Polygon" => shapes.polygons.push(coords.and_then(rings).ok_or_else(bad)?),
        "MultiPolygon" => {
            let parts = coords.and_then(Value::as_array).ok_or_else(bad)?;
            for part in parts {
                shapes.polygons.push(rings(part).ok_or_else(bad)?);
            }
        }
        "LineString" => shapes.lines.push(coords.and_then(positions).ok_or_else(bad)?),
        "MultiLineString" => shapes.lines.extend(coords.and_then(rings).ok_or_else(bad)?),
        "GeometryCollection" => {
            let members = geometry
                .get("geometries")
                .and_then(Value::as_array)
                .ok_or_else(bad)?;
            for member in members {
                collect_geometry(member, shapes)?;
            }
        }
        // points carry nothing to draw
        "Point" | "MultiPoint" => {}
        other => return Err(format!("unsupported geometry type {}", other)),
    }
    Ok(())
}

/// Parse a FeatureCollection, a single Feature or a bare geometry.
pub fn parse_geojson(text: &str, origin: &str) -> RenderResult<Shapes> {
    let fail = |reason: String| RenderError::GeoJson {
        path: origin.to_string(),
        reason,
    };
    let root: Value = serde_json::from_str(text).map_err(|e| fail(e.to_string()))?;

    let mut shapes = Shapes::default();
    match root.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {
            let features = root
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| fail("FeatureCollection without features".to_string()))?;
            for feature in features {
                if let Some(geometry) = feature.get("geometry").filter(|g| !g.is_null()) {
                    collect_geometry(geometry, &mut shapes).map_err(fail)?;
                }
            }
        }
        Some("Feature") => {
            if let Some(geometry) = root.get("geometry").filter(|g| !g.is_null()) {
                collect_geometry(geometry, &mut shapes).map_err(fail)?;
            }
        }
        Some(_) => collect_geometry(&root, &mut shapes).map_err(fail)?,
        None => return Err(fail("missing type".to_string())),
    }
    Ok(shapes)
}

fn xy<P>(points: &[P], coords: impl Fn(&P) -> (f64, f64)) -> Ring {
    points.iter().map(coords).collect()
}

fn push_rings<P>(rings: &[PolygonRing<P>], coords: impl Fn(&P) -> (f64, f64), shapes: &mut Shapes) {
    for ring in rings {
        match ring {
            PolygonRing::Outer(points) => shapes.polygons.push(vec![xy(points, &coords)]),
            PolygonRing::Inner(points) => match shapes.polygons.last_mut() {
                Some(polygon) => polygon.push(xy(points, &coords)),
                None => shapes.polygons.push(vec![xy(points, &coords)]),
            },
        }
    }
}

fn collect_shape(shape: &Shape, shapes: &mut Shapes) {
    match shape {
        Shape::Polyline(line) => {
            shapes.lines.extend(line.parts().iter().map(|p| xy(p, |q| (q.x, q.y))))
        }
        Shape::PolylineM(line) => {
            shapes.lines.extend(line.parts().iter().map(|p| xy(p, |q| (q.x, q.y))))
        }
        Shape::PolylineZ(line) => {
            shapes.lines.extend(line.parts().iter().map(|p| xy(p, |q| (q.x, q.y))))
        }
        Shape::Polygon(polygon) => push_rings(polygon.rings(), |q| (q.x, q.y), shapes),
        Shape::PolygonM(polygon) => push_rings(polygon.rings(), |q| (q.x, q.y), shapes),
        Shape::PolygonZ(polygon) => push_rings(polygon.rings(), |q| (q.x, q.y), shapes),
        // points and patches carry nothing to draw
        _ => {}
    }
}

/// Read the geometry of an ESRI shapefile. Attributes in the `.dbf` are
/// not needed and not read.
pub fn read_shapefile(path: &Path) -> RenderResult<Shapes> {
    let fail = |e: shapefile::Error| RenderError::Shapefile {
        path: path.display().to_string(),
        reason: e.to_string(),
    };
    let reader = ShapeReader::from_path(path).map_err(fail)?;
    let mut shapes = Shapes::default();
    for shape in reader.read().map_err(fail)? {
        collect_shape(&shape, &mut shapes);
    }
    Ok(shapes)
}

/// Read a layer file, GeoJSON or `.shp` by extension; `None` when it does
/// not exist.
pub fn load_shapes(path: &Path) -> RenderResult<Option<Shapes>> {
    if !path.exists() {
        warn!(path = %path.display(), "Basemap layer not found, skipping");
        return Ok(None);
    }
    let is_shp = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("shp"));
    let shapes = if is_shp {
        read_shapefile(path)?
    } else {
        let text = fs::read_to_string(path)?;
        parse_geojson(&text, &path.display().to_string())?
    };
    debug!(
        path = %path.display(),
        polygons = shapes.polygons.len(),
        lines = shapes.lines.len(),
        "Loaded basemap layer"
    );
    Ok(Some(shapes))
}

/// Administrative boundaries drawn on top of the regional maps.
pub fn admin_layer(projection: &str) -> Option<&'static str> {
    match projection {
        "us" => Some("states.geojson"),
        "it" => Some("ITA_adm/ITA_adm1.shp"),
        "de" => Some("DEU_adm/DEU_adm1.shp"),
        _ => None,
    }
}

/// Which optional parts of the basemap to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasemapLayers {
    /// Fill the map region whitesmoke; without it the ocean stays white
    pub boundary_fill: bool,
}

impl Default for BasemapLayers {
    fn default() -> Self {
        Self { boundary_fill: true }
    }
}

/// Project a lon/lat line to pixels. The pen lifts at points the map cannot
/// show and across jumps wider than half the map, which is where a line
/// wraps around the dateline.
fn line_path(setup: &MapSetup, line: &[(f64, f64)], closed: bool, pb: &mut PathBuilder) {
    let max_jump = setup.viewport.map.width / 2.0;
    let mut last: Option<(f64, f64)> = None;
    let mut first: Option<(f64, f64)> = None;
    let mut unbroken = true;

    for &(lon, lat) in line {
        let Some((x, y)) = setup.projection.forward(lon, lat) else {
            last = None;
            unbroken = false;
            continue;
        };
        let (px, py) = setup.viewport.to_pixel(x, y);
        match last {
            Some((lx, ly)) if (px - lx).abs() <= max_jump && (py - ly).abs() <= max_jump => {
                pb.line_to(px as f32, py as f32);
            }
            Some(_) => {
                unbroken = false;
                pb.move_to(px as f32, py as f32);
            }
            None => pb.move_to(px as f32, py as f32),
        }
        first.get_or_insert((px, py));
        last = Some((px, py));
    }
    if closed && unbroken && first.is_some() {
        pb.close();
    }
}

fn polygons_path(setup: &MapSetup, shapes: &Shapes) -> Option<SkPath> {
    let mut pb = PathBuilder::new();
    for polygon in &shapes.polygons {
        for ring in polygon {
            line_path(setup, ring, true, &mut pb);
        }
    }
    pb.finish()
}

fn lines_path<'a>(setup: &MapSetup, lines: impl Iterator<Item = &'a Ring>) -> Option<SkPath> {
    let mut pb = PathBuilder::new();
    for line in lines {
        line_path(setup, line, false, &mut pb);
    }
    pb.finish()
}

/// Meridians and parallels every `step` degrees, sampled finely enough to
/// follow curved projections.
fn graticule_lines(step: f64) -> Vec<Ring> {
    const SAMPLE: f64 = 0.5;
    let mut lines = Vec::new();

    let n_lon = (360.0 / step).round() as i64;
    for k in 0..n_lon {
        let lon = -180.0 + k as f64 * step;
        let n = (180.0 / SAMPLE) as i64;
        lines.push((0..=n).map(|s| (lon, -90.0 + s as f64 * SAMPLE)).collect());
    }

    let n_lat = (180.0 / step).round() as i64;
    for k in 1..n_lat {
        let lat = -90.0 + k as f64 * step;
        let n = (360.0 / SAMPLE) as i64;
        lines.push((0..=n).map(|s| (-180.0 + s as f64 * SAMPLE, lat)).collect());
    }
    lines
}

fn boundary_path(setup: &MapSetup) -> Option<SkPath> {
    let outline = setup.projection.boundary();
    let mut pb = PathBuilder::new();
    for (k, &(x, y)) in outline.iter().enumerate() {
        let (px, py) = setup.viewport.to_pixel(x, y);
        if k == 0 {
            pb.move_to(px as f32, py as f32);
        } else {
            pb.line_to(px as f32, py as f32);
        }
    }
    pb.close();
    pb.finish()
}

fn boundary_mask(setup: &MapSetup, width: u32, height: u32) -> RenderResult<Option<Mask>> {
    let Some(path) = boundary_path(setup) else {
        return Ok(None);
    };
    let mut mask = Mask::new(width, height).ok_or(RenderError::Pixmap { width, height })?;
    mask.fill_path(&path, FillRule::Winding, true, Transform::identity());
    Ok(Some(mask))
}

fn stroke(pixmap: &mut Pixmap, path: Option<SkPath>, color: Color, width: f32, mask: Option<&Mask>) {
    if let Some(path) = path {
        let stroke = Stroke {
            width,
            ..Stroke::default()
        };
        pixmap.stroke_path(&path, &color.paint(true), &stroke, Transform::identity(), mask);
    }
}

/// Draw the basemap of `setup` onto the canvas: boundary, land and
/// graticule on the background, coastlines and borders on the overlay so
/// they stay visible above filled data. Returns the number of layers drawn.
pub fn draw_basemap(
    canvas: &mut Canvas,
    setup: &MapSetup,
    shapefile_dir: &Path,
    layers: BasemapLayers,
) -> RenderResult<usize> {
    let (width, height) = (canvas.width(), canvas.height());
    let mask = boundary_mask(setup, width, height)?;
    let res = setup.def.resolution.code();
    let projection = setup.def.name;
    let thin = canvas.points(0.2);
    let normal = canvas.points(0.5);
    let mut drawn = 0usize;

    if layers.boundary_fill {
        if let Some(path) = boundary_path(setup) {
            canvas.background_mut().fill_path(
                &path,
                &Color::WHITESMOKE.paint(true),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
            drawn += 1;
        }
    }

    if let Some(land) = load_shapes(&shapefile_dir.join(format!("land_{}.geojson", res)))? {
        if let Some(path) = polygons_path(setup, &land) {
            canvas.background_mut().fill_path(
                &path,
                &Color::LIGHTGRAY.paint(true),
                FillRule::EvenOdd,
                Transform::identity(),
                mask.as_ref(),
            );
            drawn += 1;
        }
    }

    let graticule = graticule_lines(setup.def.graticule_step());
    stroke(
        canvas.background_mut(),
        lines_path(setup, graticule.iter()),
        Color::WHITE,
        thin,
        mask.as_ref(),
    );
    drawn += 1;

    if let Some(coast) = load_shapes(&shapefile_dir.join(format!("coastline_{}.geojson", res)))? {
        stroke(
            canvas.overlay_mut(),
            lines_path(setup, coast.outlines()),
            Color::BLACK,
            normal,
            mask.as_ref(),
        );
        drawn += 1;
    }

    if let Some(borders) = load_shapes(&shapefile_dir.join(format!("borders_{}.geojson", res)))? {
        let color = if projection == "world" {
            Color::WHITE
        } else {
            Color::BLACK
        };
        stroke(
            canvas.overlay_mut(),
            lines_path(setup, borders.outlines()),
            color,
            normal,
            mask.as_ref(),
        );
        drawn += 1;
    }

    if let Some(file) = admin_layer(projection) {
        if let Some(admin) = load_shapes(&shapefile_dir.join(file))? {
            stroke(
                canvas.overlay_mut(),
                lines_path(setup, admin.outlines()),
                Color::BLACK,
                thin,
                mask.as_ref(),
            );
            drawn += 1;
        }
    }

    info!(projection, layers = drawn, "Basemap drawn");
    Ok(drawn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feature_collection() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "Polygon",
                              "coordinates": [[[0,0],[10,0],[10,10],[0,0]]]}},
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "MultiLineString",
                              "coordinates": [[[0,0],[1,1]], [[2,2],[3,3],[4,4]]]}},
                {"type": "Feature", "properties": {}, "geometry": null}
            ]
        }"#;
        let shapes = parse_geojson(text, "test").unwrap();
        assert_eq!(shapes.polygons.len(), 1);
        assert_eq!(shapes.polygons[0][0].len(), 4);
        assert_eq!(shapes.lines.len(), 2);
        assert_eq!(shapes.outlines().count(), 3);
    }

    #[test]
    fn test_parse_rejects_bad_coordinates() {
        let text = r#"{"type": "LineString", "coordinates": [[0, "a"]]}"#;
        let err = parse_geojson(text, "bad.geojson").unwrap_err();
        assert!(matches!(err, RenderError::GeoJson { ref path, .. } if path == "bad.geojson"));
    }

    #[test]
    fn test_missing_layer_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_shapes(&dir.path().join("land_c.geojson")).unwrap().is_none());
    }

    #[test]
    fn test_read_polyline_shapefile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DEU_adm").join("DEU_adm1.shp");
        test_utils::write_polyline_shapefile(
            &path,
            &[vec![(6.0, 50.0), (8.5, 50.5), (11.0, 50.0)], vec![(9.0, 48.0), (9.0, 54.0)]],
        );

        let shapes = load_shapes(&path).unwrap().unwrap();
        assert!(shapes.polygons.is_empty());
        assert_eq!(shapes.lines.len(), 2);
        assert_eq!(shapes.lines[0], vec![(6.0, 50.0), (8.5, 50.5), (11.0, 50.0)]);
        assert_eq!(shapes.lines[1].last(), Some(&(9.0, 54.0)));
    }

    #[test]
    fn test_corrupt_shapefile_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.shp");
        fs::write(&path, b"not a shapefile").unwrap();
        assert!(matches!(load_shapes(&path), Err(RenderError::Shapefile { .. })));
    }

    #[test]
    fn test_graticule_lines() {
        let lines = graticule_lines(10.0);
        // 36 meridians, 17 parallels
        assert_eq!(lines.len(), 36 + 17);
        assert_eq!(lines[0].first(), Some(&(-180.0, -90.0)));
        assert_eq!(lines[0].last(), Some(&(-180.0, 90.0)));
    }

    #[test]
    fn test_admin_layers() {
        assert_eq!(admin_layer("us"), Some("states.geojson"));
        assert_eq!(admin_layer("de"), Some("DEU_adm/DEU_adm1.shp"));
        assert_eq!(admin_layer("it"), Some("ITA_adm/ITA_adm1.shp"));
        assert_eq!(admin_layer("nh"), None);
    }
}
