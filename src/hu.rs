//! Conversion of raw stored values to Hounsfield units.

use ndarray::{Array3, Zip};

use crate::stack::SliceStack;

/// Raw stored values at or below this threshold lie outside the scanned
/// region (air padding and scanner bore) and are zeroed before rescaling.
pub(crate) const OUT_OF_REGION_FLOOR: i16 = -1000;

/// Convert a slice stack into a 3D volume of Hounsfield units.
///
/// The output shape is (slices, rows, cols) with slices in stack order.
/// Each slice is rescaled with its own slope and intercept. When
/// `filter_out_of_region` is set, raw values at or below
/// [`OUT_OF_REGION_FLOOR`] are zeroed before the rescale, so they land at
/// the slice intercept rather than at their nominal HU value.
pub(crate) fn to_hu(stack: &SliceStack, filter_out_of_region: bool) -> Array3<i16> {
    let (rows, cols) = stack.slice_shape();
    let mut volume = Array3::zeros((stack.len(), rows, cols));

    for (mut plane, record) in volume.outer_iter_mut().zip(stack.slices()) {
        let slope = record.rescale_slope;
        let intercept = record.rescale_intercept;
        Zip::from(&mut plane).and(&record.pixels).for_each(|hu, &raw| {
            let raw = if filter_out_of_region && raw <= OUT_OF_REGION_FLOOR {
                0
            } else {
                raw
            };
            *hu = calibrate(raw, slope, intercept);
        });
    }

    volume
}

/// Apply the modality rescale to one stored value.
///
/// The scaled value is rounded half away from zero before the intercept is
/// added. The final narrowing cast saturates at the i16 bounds.
fn calibrate(raw: i16, slope: f64, intercept: f64) -> i16 {
    let hu = (slope * f64::from(raw)).round() + intercept;
    hu as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::{Array2, array};

    use crate::stack::SliceRecord;

    fn record(slope: f64, intercept: f64, pixels: Array2<i16>) -> SliceRecord {
        SliceRecord {
            position: [0.0, 0.0, 0.0],
            orientation: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            pixel_spacing: [1.0, 1.0],
            rescale_slope: slope,
            rescale_intercept: intercept,
            pixels,
        }
    }

    fn stack_of(records: Vec<SliceRecord>) -> SliceStack {
        let mut records = records;
        for (i, r) in records.iter_mut().enumerate() {
            r.position[2] = i as f64;
        }
        SliceStack::from_records(records).unwrap()
    }

    // =========================================================================
    // Volume Shape Tests
    // =========================================================================

    mod shape {
        use super::*;

        #[test]
        fn output_shape_is_slices_by_rows_by_cols() {
            let stack = stack_of(vec![
                record(1.0, 0.0, Array2::zeros((3, 4))),
                record(1.0, 0.0, Array2::zeros((3, 4))),
            ]);

            let volume = to_hu(&stack, true);
            assert_eq!(volume.dim(), (2, 3, 4));
        }

        #[test]
        fn slice_order_matches_stack_order() {
            let stack = stack_of(vec![
                record(1.0, 0.0, Array2::from_elem((2, 2), 10)),
                record(1.0, 0.0, Array2::from_elem((2, 2), 20)),
            ]);

            let volume = to_hu(&stack, false);
            assert_eq!(volume[[0, 0, 0]], 10);
            assert_eq!(volume[[1, 0, 0]], 20);
        }
    }

    // =========================================================================
    // Calibration Tests
    // =========================================================================

    mod calibration {
        use super::*;

        #[test]
        fn identity_rescale_preserves_values() {
            let stack = stack_of(vec![record(1.0, 0.0, array![[0, 42], [-7, 300]])]);
            let volume = to_hu(&stack, false);
            assert_eq!(volume[[0, 0, 0]], 0);
            assert_eq!(volume[[0, 0, 1]], 42);
            assert_eq!(volume[[0, 1, 0]], -7);
            assert_eq!(volume[[0, 1, 1]], 300);
        }

        #[test]
        fn ct_rescale_applies_slope_and_intercept() {
            // A common CT calibration: slope 1, intercept -1024.
            let stack = stack_of(vec![record(1.0, -1024.0, array![[0, 1024], [2048, 100]])]);
            let volume = to_hu(&stack, false);
            assert_eq!(volume[[0, 0, 0]], -1024);
            assert_eq!(volume[[0, 0, 1]], 0);
            assert_eq!(volume[[0, 1, 0]], 1024);
            assert_eq!(volume[[0, 1, 1]], -924);
        }

        #[test]
        fn each_slice_uses_its_own_coefficients() {
            let stack = stack_of(vec![
                record(1.0, 0.0, Array2::from_elem((1, 1), 100)),
                record(2.0, -50.0, Array2::from_elem((1, 1), 100)),
            ]);

            let volume = to_hu(&stack, false);
            assert_eq!(volume[[0, 0, 0]], 100);
            assert_eq!(volume[[1, 0, 0]], 150);
        }

        #[test]
        fn fractional_slope_rounds_half_away_from_zero() {
            let stack = stack_of(vec![record(0.5, 0.0, array![[3, -3], [5, -5]])]);
            let volume = to_hu(&stack, false);
            assert_eq!(volume[[0, 0, 0]], 2);
            assert_eq!(volume[[0, 0, 1]], -2);
            assert_eq!(volume[[0, 1, 0]], 3);
            assert_eq!(volume[[0, 1, 1]], -3);
        }

        #[test]
        fn out_of_range_results_saturate() {
            let stack = stack_of(vec![record(10.0, 0.0, array![[32000, -32000]])]);
            let volume = to_hu(&stack, false);
            assert_eq!(volume[[0, 0, 0]], i16::MAX);
            assert_eq!(volume[[0, 0, 1]], i16::MIN);
        }
    }

    // =========================================================================
    // End-to-End Stack Tests
    // =========================================================================

    mod stacked {
        use super::*;

        #[test]
        fn unsorted_air_series_calibrates_to_intercept_everywhere() {
            // Three slices read in descending z order, all raw zero with the
            // common CT calibration. Reordering happens in the stack; every
            // voxel lands at the intercept.
            let records = [10.0, 5.0, 0.0]
                .map(|z| {
                    let mut r = record(1.0, -1024.0, Array2::zeros((4, 4)));
                    r.position[2] = z;
                    r
                })
                .to_vec();
            let stack = SliceStack::from_records(records).unwrap();

            let volume = to_hu(&stack, true);
            assert_eq!(volume.dim(), (3, 4, 4));
            assert!(volume.iter().all(|&hu| hu == -1024));

            let zs: Vec<f64> = stack.slices().iter().map(|s| s.position[2]).collect();
            assert_eq!(zs, vec![0.0, 5.0, 10.0]);
        }
    }

    // =========================================================================
    // Out-of-Region Filter Tests
    // =========================================================================

    mod out_of_region {
        use super::*;

        #[test]
        fn values_at_or_below_floor_are_zeroed_before_rescale() {
            let stack = stack_of(vec![record(
                1.0,
                -1024.0,
                array![[-1000, -1001], [-999, -2000]],
            )]);

            let volume = to_hu(&stack, true);
            assert_eq!(volume[[0, 0, 0]], -1024);
            assert_eq!(volume[[0, 0, 1]], -1024);
            assert_eq!(volume[[0, 1, 0]], -2023);
            assert_eq!(volume[[0, 1, 1]], -1024);
        }

        #[test]
        fn filter_disabled_keeps_padding_values() {
            let stack = stack_of(vec![record(1.0, 0.0, array![[-2000, -1000]])]);
            let volume = to_hu(&stack, false);
            assert_eq!(volume[[0, 0, 0]], -2000);
            assert_eq!(volume[[0, 0, 1]], -1000);
        }
    }
}
