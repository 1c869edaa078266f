//! Typed failures for the volume preparation pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading, calibrating, or exporting a scan.
///
/// Every variant is fatal to the current run: no retries, no partial
/// results. Presentation belongs to the CLI layer.
#[derive(Debug, Error)]
pub enum PrepError {
    #[error("failed to read scan directory {path:?}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open slice {path:?}: {source}")]
    OpenSlice {
        path: PathBuf,
        #[source]
        source: Box<dicom::object::ReadError>,
    },

    #[error("slice {path:?} is missing required attribute {name}")]
    MissingAttribute { path: PathBuf, name: &'static str },

    #[error("slice {path:?} has an invalid {name} value: {source}")]
    InvalidAttribute {
        path: PathBuf,
        name: &'static str,
        #[source]
        source: dicom::core::value::ConvertValueError,
    },

    #[error("slice {path:?}: {name} must contain {expected} values")]
    AttributeLength {
        path: PathBuf,
        name: &'static str,
        expected: usize,
    },

    #[error("failed to decode pixel data in {path:?}: {source}")]
    PixelData {
        path: PathBuf,
        #[source]
        source: Box<dicom_pixeldata::Error>,
    },

    #[error("no slices found in {path:?}")]
    EmptySeries { path: PathBuf },

    #[error("cannot build a slice stack from zero records")]
    EmptyStack,

    #[error("slice {index} has shape {found:?}, expected {expected:?}")]
    MismatchedShape {
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("slice {index} has pixel spacing {found:?}, expected {expected:?}")]
    MismatchedSpacing {
        index: usize,
        expected: [f64; 2],
        found: [f64; 2],
    },

    #[error("need at least 2 slices to derive inter-slice spacing, found {0}")]
    NotEnoughSlices(usize),

    #[error("failed to create output file {path:?}: {source}")]
    CreateOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode preview animation: {0}")]
    Encode(#[from] image::ImageError),
}
