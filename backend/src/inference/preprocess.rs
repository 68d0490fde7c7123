use image::imageops::{self, FilterType};
use image::DynamicImage;
use ndarray::Array4;

use super::InferenceError;

pub const INPUT_SIZE: u32 = 224;
pub const CHANNELS: usize = 3;

/// Decodes an uploaded image into a `1×224×224×3` batch with values in [0, 1].
pub fn preprocess_image(bytes: &[u8]) -> Result<Array4<f32>, InferenceError> {
    let image = image::load_from_memory(bytes)?;
    let side = INPUT_SIZE as usize;
    let batch = Array4::from_shape_vec((1, side, side, CHANNELS), rgb_pixels(&image, INPUT_SIZE))?;
    Ok(batch)
}

/// RGB, stretched to `size × size`, row-major HWC, scaled by 1/255.
pub fn rgb_pixels(image: &DynamicImage, size: u32) -> Vec<f32> {
    let rgb = image.to_rgb8();
    imageops::resize(&rgb, size, size, FilterType::CatmullRom)
        .into_raw()
        .into_iter()
        .map(|value| f32::from(value) / 255.0)
        .collect()
}
