//! # CT Prep
//!
//! A command-line tool to reconstruct a calibrated CT volume from a directory
//! of DICOM slice files, derive its voxel-to-patient affine, and write an
//! animated GIF preview.
//!
//! ## Features
//!
//! - Load a DICOM series directory and order slices along the patient axis
//! - Convert raw stored values to Hounsfield units with per-slice calibration
//! - Zero out-of-region padding values before calibration
//! - Derive the 4x4 voxel-index to patient-space affine
//! - Render every fifth slice into a looping grayscale GIF
//!
//! ## Usage
//!
//! ```bash
//! ct-prep --scan <dicom_dir> --preview <output.gif>
//! ct-prep --scan <dicom_dir> --window-max 300 --no-oor-filter
//! ```

mod affine;
mod error;
mod hu;
mod preview;
mod stack;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

/// Default scan directory, matching the layout of the bundled sample data.
const DEFAULT_SCAN_DIR: &str = "../media/pat01";

/// Default location for the rendered preview.
const DEFAULT_PREVIEW_PATH: &str = "../media/preview.gif";

#[derive(Parser, Debug)]
#[command(name = "ct-prep")]
#[command(about = "Reconstruct a calibrated CT volume from DICOM slices and preview it as a GIF")]
struct CliArgs {
    /// Directory containing one DICOM file per slice
    #[arg(short = 'i', long, default_value = DEFAULT_SCAN_DIR)]
    scan: PathBuf,

    /// Output path for the animated GIF preview
    #[arg(short = 'o', long, default_value = DEFAULT_PREVIEW_PATH)]
    preview: PathBuf,

    /// Upper edge of the display window in Hounsfield units
    #[arg(long, default_value_t = preview::DEFAULT_WINDOW_MAX)]
    window_max: i16,

    /// Keep out-of-region padding values instead of zeroing them
    #[arg(long)]
    no_oor_filter: bool,
}

fn main() -> Result<()> {
    let args = CliArgs::parse();

    let stack = stack::load_stack(&args.scan)?;

    let volume = hu::to_hu(&stack, !args.no_oor_filter);
    let (slices, rows, cols) = volume.dim();
    println!("✓ Volume: {slices}x{rows}x{cols}");

    let affine = affine::build_affine(&stack)?;
    println!("Voxel-to-patient affine:");
    print!("{affine}");
    let origin = affine.apply([0.0, 0.0, 0.0, 1.0]);
    println!(
        "Patient-space origin: ({:.4}, {:.4}, {:.4})",
        origin[0], origin[1], origin[2]
    );

    let frames = preview::write_gif(&volume, &args.preview, args.window_max)?;
    println!("✓ Wrote {frames} frame(s) to {}", args.preview.display());

    Ok(())
}
