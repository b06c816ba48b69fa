//! Picker display image construction.

use super::error::Result;
use super::model::{Datacube, PickerImage};

/// Build the default picker image: the per-spaxel median of the flux over
/// the spectral axis, ignoring non-finite samples. A spaxel with no finite
/// samples at all becomes NaN and renders as a dead pixel.
pub fn median_image(cube: &Datacube) -> PickerImage {
    let shape = cube.shape();
    let mut data = Vec::with_capacity(shape.ny * shape.nx);
    let mut channel = Vec::with_capacity(shape.nw);

    for y in 0..shape.ny {
        for x in 0..shape.nx {
            channel.clear();
            for w in 0..shape.nw {
                let v = cube.flux_at(w, y, x);
                if v.is_finite() {
                    channel.push(v);
                }
            }
            data.push(median(&mut channel));
        }
    }

    // Shape is the cube's own spatial shape, so this cannot fail.
    PickerImage::new(data, shape.ny, shape.nx).expect("median image shape")
}

/// Validate a user-supplied picker image against the cube's spatial shape.
pub fn supplied_image(cube: &Datacube, data: Vec<f64>) -> Result<PickerImage> {
    let (ny, nx) = cube.shape().spatial();
    PickerImage::new(data, ny, nx)
}

/// Median of a scratch buffer; sorts in place. Empty input gives NaN.
fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_unstable_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        0.5 * (values[mid - 1] + values[mid])
    }
}
