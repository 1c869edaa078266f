//! Slice records and stack loading from a DICOM series directory.

use std::fs;
use std::path::{Path, PathBuf};

use dicom::core::Tag;
use dicom::dictionary_std::tags;
use dicom::object::{DefaultDicomObject, open_file};
use dicom_pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder};
use ndarray::{Array2, s};

use crate::error::PrepError;

/// One scanned cross-section, as extracted from a single DICOM file.
///
/// `orientation` keeps the DICOM ImageOrientationPatient layout: the first
/// three components are the column direction cosines, the last three the
/// row direction cosines. `pixels` holds the raw stored values; the
/// modality rescale is applied later, per slice.
#[derive(Debug, Clone)]
pub(crate) struct SliceRecord {
    pub(crate) position: [f64; 3],
    pub(crate) orientation: [f64; 6],
    pub(crate) pixel_spacing: [f64; 2],
    pub(crate) rescale_slope: f64,
    pub(crate) rescale_intercept: f64,
    pub(crate) pixels: Array2<i16>,
}

/// An ordered stack of slices.
///
/// Invariants, established at construction: every record shares the same
/// pixel shape and pixel spacing, and records are sorted ascending by the
/// z component of their position. Slices at equal z keep the order in
/// which they were read.
#[derive(Debug)]
pub(crate) struct SliceStack {
    slices: Vec<SliceRecord>,
}

impl SliceStack {
    /// Validates shared shape/spacing and sorts the records into stack order.
    pub(crate) fn from_records(mut records: Vec<SliceRecord>) -> Result<Self, PrepError> {
        let Some(first) = records.first() else {
            return Err(PrepError::EmptyStack);
        };
        let expected_shape = first.pixels.dim();
        let expected_spacing = first.pixel_spacing;

        for (index, record) in records.iter().enumerate() {
            if record.pixels.dim() != expected_shape {
                return Err(PrepError::MismatchedShape {
                    index,
                    expected: expected_shape,
                    found: record.pixels.dim(),
                });
            }
            if record.pixel_spacing != expected_spacing {
                return Err(PrepError::MismatchedSpacing {
                    index,
                    expected: expected_spacing,
                    found: record.pixel_spacing,
                });
            }
        }

        // Stable sort: ties on z retain read order.
        records.sort_by(|a, b| a.position[2].total_cmp(&b.position[2]));

        Ok(Self { slices: records })
    }

    pub(crate) fn slices(&self) -> &[SliceRecord] {
        &self.slices
    }

    pub(crate) fn len(&self) -> usize {
        self.slices.len()
    }

    /// Shape of every slice in the stack, as (rows, cols).
    pub(crate) fn slice_shape(&self) -> (usize, usize) {
        self.slices[0].pixels.dim()
    }
}

/// Load a slice stack from a directory containing one DICOM file per slice.
///
/// Every directory entry is treated as a slice file; filenames carry no
/// ordering information. The first unreadable or malformed file aborts the
/// whole load.
pub(crate) fn load_stack(dir: &Path) -> Result<SliceStack, PrepError> {
    let entries = fs::read_dir(dir).map_err(|source| PrepError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| PrepError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        paths.push(entry.path());
    }

    if paths.is_empty() {
        return Err(PrepError::EmptySeries {
            path: dir.to_path_buf(),
        });
    }

    println!("Loading scan {dir:?} ({} file(s))", paths.len());

    let mut records = Vec::with_capacity(paths.len());
    for path in &paths {
        let obj = open_file(path).map_err(|source| PrepError::OpenSlice {
            path: path.clone(),
            source: Box::new(source),
        })?;
        let record = read_slice(&obj, path)?;
        println!("✓ Loaded {} (z = {:.3})", path.display(), record.position[2]);
        records.push(record);
    }

    SliceStack::from_records(records)
}

/// Extract a slice record from an already-opened DICOM object.
pub(crate) fn read_slice(
    obj: &DefaultDicomObject,
    path: &Path,
) -> Result<SliceRecord, PrepError> {
    let position =
        require_floats::<3>(obj, tags::IMAGE_POSITION_PATIENT, "ImagePositionPatient", path)?;
    let orientation = require_floats::<6>(
        obj,
        tags::IMAGE_ORIENTATION_PATIENT,
        "ImageOrientationPatient",
        path,
    )?;
    let pixel_spacing = require_floats::<2>(obj, tags::PIXEL_SPACING, "PixelSpacing", path)?;
    let rescale_slope = require_float(obj, tags::RESCALE_SLOPE, "RescaleSlope", path)?;
    let rescale_intercept =
        require_float(obj, tags::RESCALE_INTERCEPT, "RescaleIntercept", path)?;
    let pixels = decode_pixels(obj, path)?;

    Ok(SliceRecord {
        position,
        orientation,
        pixel_spacing,
        rescale_slope,
        rescale_intercept,
        pixels,
    })
}

fn require_floats<const N: usize>(
    obj: &DefaultDicomObject,
    tag: Tag,
    name: &'static str,
    path: &Path,
) -> Result<[f64; N], PrepError> {
    let element = obj.element(tag).map_err(|_| PrepError::MissingAttribute {
        path: path.to_path_buf(),
        name,
    })?;
    let values = element
        .to_multi_float64()
        .map_err(|source| PrepError::InvalidAttribute {
            path: path.to_path_buf(),
            name,
            source,
        })?;
    values.try_into().map_err(|_| PrepError::AttributeLength {
        path: path.to_path_buf(),
        name,
        expected: N,
    })
}

fn require_float(
    obj: &DefaultDicomObject,
    tag: Tag,
    name: &'static str,
    path: &Path,
) -> Result<f64, PrepError> {
    obj.element(tag)
        .map_err(|_| PrepError::MissingAttribute {
            path: path.to_path_buf(),
            name,
        })?
        .to_float64()
        .map_err(|source| PrepError::InvalidAttribute {
            path: path.to_path_buf(),
            name,
            source,
        })
}

/// Decode raw stored pixel values into a 2D array of signed integers.
///
/// The modality LUT is disabled so the values come out exactly as stored;
/// the rescale is applied later with per-slice coefficients.
fn decode_pixels(obj: &DefaultDicomObject, path: &Path) -> Result<Array2<i16>, PrepError> {
    let decoded = obj
        .decode_pixel_data()
        .map_err(|source| PrepError::PixelData {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;

    let options = ConvertOptions::new().with_modality_lut(ModalityLutOption::None);
    let frames = decoded
        .to_ndarray_with_options::<i16>(&options)
        .map_err(|source| PrepError::PixelData {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;

    Ok(frames.slice_move(s![0, .., .., 0]))
}
