use image::{DynamicImage, RgbImage};

use crate::error::DispatchError;

use super::tensor::Tensor;

const RGB_CHANNELS: usize = 3;

// The generator works on pixels in [-1, 1]
fn to_unit(component: u8) -> f32 {
    component as f32 / 127.5 - 1.0
}

fn from_unit(value: f32) -> u8 {
    ((value.clamp(-1.0, 1.0) + 1.0) * 127.5).round() as u8
}

impl Tensor {
    // Components map into [-1, 1]
    pub fn from_rgb_image(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let data = image.as_raw().iter().map(|&c| to_unit(c)).collect();

        // An RgbImage always holds width * height * 3 components
        Self::from_raw_parts(vec![height as usize, width as usize, RGB_CHANNELS], data)
    }

    pub fn from_image(image: &DynamicImage) -> Self {
        Self::from_rgb_image(&image.to_rgb8())
    }

    pub fn to_rgb_image(&self) -> Result<RgbImage, DispatchError> {
        let [height, width, channels] = self.dims3()?;
        if channels != RGB_CHANNELS {
            return Err(DispatchError::ChannelMismatch {
                expected: RGB_CHANNELS,
                actual: channels,
            });
        }

        let width_u32 = u32::try_from(width).map_err(|_| DispatchError::ShapeOverflow(width))?;
        let height_u32 =
            u32::try_from(height).map_err(|_| DispatchError::ShapeOverflow(height))?;

        let pixels = self.data().iter().map(|&v| from_unit(v)).collect();
        RgbImage::from_raw(width_u32, height_u32, pixels).ok_or_else(|| {
            DispatchError::DataLength {
                shape: self.shape().to_vec(),
                expected: height * width * RGB_CHANNELS,
                actual: self.len(),
            }
        })
    }
}
