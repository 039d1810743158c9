use image::{imageops::FilterType, DynamicImage};
use ndarray::{Array4, ArrayD};

use super::error::ClassifierError;

/// ImageNet normalization mean values (RGB)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet normalization std values (RGB)
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Memory layout the exported model expects for its image input.
///
/// PyTorch exports are channels-first; some converted graphs are channels-last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLayout {
    Nchw,
    Nhwc,
}

impl InputLayout {
    /// Infers the layout from a rank-4 input shape. A trailing 3 means channels-last.
    pub fn from_shape(dims: &[i64]) -> Result<Self, ClassifierError> {
        if dims.len() != 4 {
            return Err(ClassifierError::ModelError(format!(
                "Model input must be rank 4 (batch, image), found shape {:?}",
                dims
            )));
        }
        Ok(if dims[3] == 3 { Self::Nhwc } else { Self::Nchw })
    }
}

/// Resizes, normalises and lays out an image as a batch of one.
///
/// The image is stretched to `size x size` (no crop), matching the
/// `Resize((224, 224))` transform used during training.
pub fn preprocess(image: &DynamicImage, size: u32, layout: InputLayout) -> Result<ArrayD<f32>, ClassifierError> {
    if size == 0 {
        return Err(ClassifierError::ValidationError("Image size must be positive".into()));
    }
    if image.width() == 0 || image.height() == 0 {
        return Err(ClassifierError::ImageError("Image has no pixels".into()));
    }

    let rgb = image.resize_exact(size, size, FilterType::Triangle).to_rgb8();
    let side = size as usize;

    let mut tensor = match layout {
        InputLayout::Nchw => Array4::<f32>::zeros((1, 3, side, side)),
        InputLayout::Nhwc => Array4::<f32>::zeros((1, side, side, 3)),
    };

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            let value = (pixel[c] as f32 / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            match layout {
                InputLayout::Nchw => tensor[[0, c, y, x]] = value,
                InputLayout::Nhwc => tensor[[0, y, x, c]] = value,
            }
        }
    }

    Ok(tensor.into_dyn())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    #[test]
    fn test_layout_from_shape() {
        assert_eq!(InputLayout::from_shape(&[1, 3, 224, 224]).unwrap(), InputLayout::Nchw);
        assert_eq!(InputLayout::from_shape(&[-1, 224, 224, 3]).unwrap(), InputLayout::Nhwc);
        assert!(InputLayout::from_shape(&[1, 150528]).is_err());
    }

    #[test]
    fn test_nchw_shape_and_normalisation() {
        let tensor = preprocess(&solid(50, 80, [255, 0, 128]), 224, InputLayout::Nchw).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 224, 224]);

        let red = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        let green = (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
        assert!((tensor[[0, 0, 10, 10]] - red).abs() < 1e-5);
        assert!((tensor[[0, 1, 200, 3]] - green).abs() < 1e-5);
    }

    #[test]
    fn test_nhwc_matches_nchw() {
        let image = solid(32, 32, [10, 200, 90]);
        let nchw = preprocess(&image, 16, InputLayout::Nchw).unwrap();
        let nhwc = preprocess(&image, 16, InputLayout::Nhwc).unwrap();
        assert_eq!(nhwc.shape(), &[1, 16, 16, 3]);
        for c in 0..3 {
            assert_eq!(nchw[[0, c, 5, 7]], nhwc[[0, 5, 7, c]]);
        }
    }

    #[test]
    fn test_empty_image_rejected() {
        let empty = DynamicImage::new_rgb8(0, 0);
        assert!(matches!(
            preprocess(&empty, 224, InputLayout::Nchw),
            Err(ClassifierError::ImageError(_))
        ));
    }
}
