//! Loading of ECMWF GRIB2 forecast files.
//!
//! Files are selected from the data folder by variable name or request
//! group, decoded with the `grib` crate and stacked into a [`Dataset`]
//! with a step axis, an optional pressure-level axis and 2-D coordinates.

pub mod coords;
pub mod dataset;
pub mod decode;
pub mod loader;
pub mod tables;

pub use coords::{normalize_longitude, Coordinates, GridWindow};
pub use dataset::{finite_range, mask_window, Dataset, Field};
pub use decode::{decode_file, DecodedFile, Message};
pub use loader::{
    preprocess, read_dataset, select_files, FileSelector, ReadOptions, GLOBAL_PROJECTIONS,
};
pub use tables::ParameterTable;
