//! Path utilities for locating test data and building scratch folders.
//!
//! Real model output is looked up in a few well-known places; synthetic
//! runs are written to temporary directories laid out like the data and
//! images folders of a deployment.

use std::fs;
use std::path::{Path, PathBuf};

/// Returns the workspace root directory.
///
/// Walks up from this crate's manifest directory (`crates/test-utils`).
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// Returns `crates/{crate_name}/testdata/`.
pub fn crate_testdata_dir(crate_name: &str) -> PathBuf {
    workspace_root()
        .join("crates")
        .join(crate_name)
        .join("testdata")
}

/// Returns `services/{service_name}/testdata/`.
pub fn service_testdata_dir(service_name: &str) -> PathBuf {
    workspace_root()
        .join("services")
        .join(service_name)
        .join("testdata")
}

/// Searches for a test file in multiple locations.
///
/// Checked in order:
/// 1. `TEST_DATA_DIR` (if set)
/// 2. `MODEL_DATA_FOLDER` (if set), the downloader's output folder
/// 3. `crates/grib-loader/testdata/`
/// 4. `services/plotter/testdata/`
/// 5. `testdata/` at the workspace root
pub fn find_test_file(name: &str) -> Option<PathBuf> {
    let mut candidates = Vec::new();

    for var in ["TEST_DATA_DIR", "MODEL_DATA_FOLDER"] {
        if let Ok(dir) = std::env::var(var) {
            candidates.push(PathBuf::from(dir).join(name));
        }
    }

    let root = workspace_root();
    candidates.extend([
        crate_testdata_dir("grib-loader").join(name),
        service_testdata_dir("plotter").join(name),
        root.join("testdata").join(name),
    ]);

    candidates.into_iter().find(|path| path.exists())
}

/// Searches for a test file in a specific crate's testdata directory.
pub fn find_crate_test_file(crate_name: &str, name: &str) -> Option<PathBuf> {
    let path = crate_testdata_dir(crate_name).join(name);
    path.exists().then_some(path)
}

/// Creates a temporary directory for test output, removed on drop.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temporary test directory")
}

/// Creates a temporary directory with a specific prefix.
pub fn temp_test_dir_with_prefix(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("Failed to create temporary test directory")
}

/// Creates empty files named like downloaded runs inside `dir`.
///
/// Only the names matter to file selection, the content is never decoded.
pub fn touch_run_files(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            fs::write(&path, b"").expect("Failed to create run file");
            path
        })
        .collect()
}

/// Shape type code of a polyline in the ESRI format.
const SHP_POLYLINE: i32 = 3;

fn shp_header(out: &mut Vec<u8>, file_words: usize, bbox: [f64; 4]) {
    out.extend_from_slice(&9994i32.to_be_bytes());
    out.extend_from_slice(&[0u8; 20]);
    out.extend_from_slice(&(file_words as i32).to_be_bytes());
    out.extend_from_slice(&1000i32.to_le_bytes());
    out.extend_from_slice(&SHP_POLYLINE.to_le_bytes());
    for v in bbox.iter().chain([0.0; 4].iter()) {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

fn line_bbox<'a>(points: impl Iterator<Item = &'a (f64, f64)>) -> [f64; 4] {
    points.fold(
        [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY],
        |b, &(x, y)| [b[0].min(x), b[1].min(y), b[2].max(x), b[3].max(y)],
    )
}

/// Writes an ESRI shapefile (`.shp` plus `.shx`) with one single-part
/// polyline record per line, lon/lat pairs as x/y.
pub fn write_polyline_shapefile(path: &Path, lines: &[Vec<(f64, f64)>]) {
    let mut records = Vec::new();
    let mut index = Vec::new();
    let mut offset_words = 50usize;

    for (n, line) in lines.iter().enumerate() {
        let content_bytes = 4 + 32 + 4 + 4 + 4 + 16 * line.len();
        index.extend_from_slice(&(offset_words as i32).to_be_bytes());
        index.extend_from_slice(&((content_bytes / 2) as i32).to_be_bytes());

        records.extend_from_slice(&(n as i32 + 1).to_be_bytes());
        records.extend_from_slice(&((content_bytes / 2) as i32).to_be_bytes());
        records.extend_from_slice(&SHP_POLYLINE.to_le_bytes());
        for v in line_bbox(line.iter()) {
            records.extend_from_slice(&v.to_le_bytes());
        }
        records.extend_from_slice(&1i32.to_le_bytes());
        records.extend_from_slice(&(line.len() as i32).to_le_bytes());
        records.extend_from_slice(&0i32.to_le_bytes());
        for &(x, y) in line {
            records.extend_from_slice(&x.to_le_bytes());
            records.extend_from_slice(&y.to_le_bytes());
        }
        offset_words += (8 + content_bytes) / 2;
    }

    let bbox = line_bbox(lines.iter().flatten());
    let mut shp = Vec::with_capacity(100 + records.len());
    shp_header(&mut shp, offset_words, bbox);
    shp.extend_from_slice(&records);

    let mut shx = Vec::with_capacity(100 + index.len());
    shp_header(&mut shx, 50 + index.len() / 2, bbox);
    shx.extend_from_slice(&index);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create shapefile folder");
    }
    fs::write(path, shp).expect("Failed to write .shp");
    fs::write(path.with_extension("shx"), shx).expect("Failed to write .shx");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_root_is_valid() {
        let root = workspace_root();
        assert!(
            root.join("Cargo.toml").exists(),
            "Workspace root should contain Cargo.toml: {:?}",
            root
        );
    }

    #[test]
    fn test_crate_testdata_dir() {
        let dir = crate_testdata_dir("grib-loader");
        assert!(dir.ends_with("crates/grib-loader/testdata"));
    }

    #[test]
    fn test_temp_test_dir_with_prefix() {
        let dir = temp_test_dir_with_prefix("forecast_test_");
        assert!(dir.path().exists());
        assert!(dir.path().to_string_lossy().contains("forecast_test_"));
    }

    #[test]
    fn test_touch_run_files() {
        let dir = temp_test_dir();
        let files = touch_run_files(dir.path(), &["2023121800_2D.grib2", "2023121812_2D.grib2"]);
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.exists()));
    }

    #[test]
    fn test_write_polyline_shapefile_layout() {
        let dir = temp_test_dir();
        let path = dir.path().join("lines.shp");
        write_polyline_shapefile(&path, &[vec![(0.0, 0.0), (1.0, 1.0)]]);

        let shp = fs::read(&path).unwrap();
        // header, record header, 44 bytes of fixed content, one part, two points
        assert_eq!(shp.len(), 100 + 8 + 44 + 4 + 32);
        assert_eq!(&shp[..4], &9994i32.to_be_bytes());
        assert_eq!(i32::from_be_bytes([shp[24], shp[25], shp[26], shp[27]]) as usize * 2, shp.len());
        assert_eq!(fs::read(path.with_extension("shx")).unwrap().len(), 108);
    }
}
