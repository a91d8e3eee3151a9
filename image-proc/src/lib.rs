//! 扫描书页的 OCR 预处理。
//!
//! 固定流水线：灰度 → 高斯模糊 → CLAHE 局部对比度增强 → 反相自适应二值化。
//! 顺序不可交换：先模糊再增强，避免放大噪声；最后才做二值化，保证硬判决发生在对比度校正之后。
//! 画笔遮罩（[`Mask`]）与遮罩应用也放在这里，交互式选区与批处理共用同一套像素操作。
//!
//! 启用 `opencv` 特性时流水线交给 `opencv::imgproc`；默认构建使用纯 Rust 实现，
//! 边界与取整规则与 OpenCV 保持一致（reflect-101 补边的 CLAHE、四舍五入的高斯均值）。

mod clahe;
#[cfg(feature = "opencv")]
pub mod cv;
mod filters;
mod mask;

pub use clahe::clahe;
pub use filters::{adaptive_threshold_inv, gaussian_blur, gaussian_kernel, to_gray};
pub use mask::{Mask, SELECTED, apply_mask, draw_brush_segment};

use image::{DynamicImage, GrayImage};

/// 预处理参数校验或遮罩应用失败时返回的错误。
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PreprocessError {
    #[error("高斯核尺寸必须为正奇数，实际为 {0}")]
    InvalidKernel(u32),
    #[error("自适应阈值邻域必须为不小于 3 的奇数，实际为 {0}")]
    InvalidBlockSize(u32),
    #[error("CLAHE 网格不能为零：{0}x{1}")]
    InvalidTileGrid(u32, u32),
    #[error("前景灰度值不能为 0")]
    ZeroMaxValue,
    #[error("遮罩尺寸 {mask_width}x{mask_height} 与图像尺寸 {image_width}x{image_height} 不一致")]
    DimensionMismatch {
        mask_width: u32,
        mask_height: u32,
        image_width: u32,
        image_height: u32,
    },
    #[error("OpenCV 处理失败：{0}")]
    OpenCv(String),
}

/// 预处理流水线的可调参数。
///
/// 默认值针对整页扫描（3×3 模糊）；画笔选区使用 [`PreprocessOptions::brush`]（5×5 模糊）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessOptions {
    /// 高斯模糊核边长（奇数）。
    pub blur_kernel: u32,
    /// CLAHE 裁剪上限，相对于平均直方图高度的倍数。
    pub clip_limit: f32,
    /// CLAHE 网格（列数, 行数）。
    pub tile_grid: (u32, u32),
    /// 自适应阈值的邻域边长（奇数）。
    pub block_size: u32,
    /// 从加权均值中减去的偏移量 C。
    pub offset: i32,
    /// 前景（文字）像素写入的灰度值。
    pub max_value: u8,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            blur_kernel: 3,
            clip_limit: 2.0,
            tile_grid: (8, 8),
            block_size: 15,
            offset: 5,
            max_value: 245,
        }
    }
}

impl PreprocessOptions {
    /// 画笔选区使用的参数：选区边缘更硬，采用更大的模糊核。
    pub fn brush() -> Self {
        Self {
            blur_kernel: 5,
            ..Self::default()
        }
    }

    /// 在执行前检查参数合法性。
    pub fn validate(&self) -> Result<(), PreprocessError> {
        if self.blur_kernel == 0 || self.blur_kernel % 2 == 0 {
            return Err(PreprocessError::InvalidKernel(self.blur_kernel));
        }
        if self.block_size < 3 || self.block_size % 2 == 0 {
            return Err(PreprocessError::InvalidBlockSize(self.block_size));
        }
        if self.tile_grid.0 == 0 || self.tile_grid.1 == 0 {
            return Err(PreprocessError::InvalidTileGrid(
                self.tile_grid.0,
                self.tile_grid.1,
            ));
        }
        if self.max_value == 0 {
            return Err(PreprocessError::ZeroMaxValue);
        }
        Ok(())
    }
}

/// 对任意格式的输入图像执行完整预处理，返回与输入同尺寸的二值图。
///
/// 输出中每个像素只可能是 `0` 或 `options.max_value`，文字为前景。
pub fn preprocess(
    image: &DynamicImage,
    options: &PreprocessOptions,
) -> Result<GrayImage, PreprocessError> {
    let gray = to_gray(image);
    preprocess_gray(&gray, options)
}

/// 与 [`preprocess`] 相同，但输入已经是单通道灰度图。
pub fn preprocess_gray(
    gray: &GrayImage,
    options: &PreprocessOptions,
) -> Result<GrayImage, PreprocessError> {
    options.validate()?;
    if gray.width() == 0 || gray.height() == 0 {
        return Ok(gray.clone());
    }

    #[cfg(feature = "opencv")]
    {
        cv::preprocess_gray(gray, options)
    }
    #[cfg(not(feature = "opencv"))]
    {
        Ok(preprocess_gray_fallback(gray, options))
    }
}

#[cfg(not(feature = "opencv"))]
fn preprocess_gray_fallback(gray: &GrayImage, options: &PreprocessOptions) -> GrayImage {
    let blurred = gaussian_blur(gray, options.blur_kernel);
    let enhanced = clahe(&blurred, options.clip_limit, options.tile_grid);
    adaptive_threshold_inv(
        &enhanced,
        options.block_size,
        options.offset,
        options.max_value,
    )
}

/// 判断灰度图是否只有单一灰度（全黑、全白或空图）。
pub fn is_uniform(image: &GrayImage) -> bool {
    let mut pixels = image.pixels();
    match pixels.next() {
        Some(first) => pixels.all(|p| p == first),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    #[test]
    fn default_options_match_page_profile() {
        let opts = PreprocessOptions::default();
        assert_eq!(opts.blur_kernel, 3);
        assert_eq!(opts.tile_grid, (8, 8));
        assert_eq!(opts.block_size, 15);
        assert_eq!(opts.offset, 5);
        assert_eq!(opts.max_value, 245);
        assert_eq!(PreprocessOptions::brush().blur_kernel, 5);
    }

    #[test]
    fn validate_rejects_even_kernels() {
        let opts = PreprocessOptions {
            blur_kernel: 4,
            ..PreprocessOptions::default()
        };
        assert_eq!(opts.validate(), Err(PreprocessError::InvalidKernel(4)));

        let opts = PreprocessOptions {
            block_size: 1,
            ..PreprocessOptions::default()
        };
        assert_eq!(opts.validate(), Err(PreprocessError::InvalidBlockSize(1)));

        let opts = PreprocessOptions {
            tile_grid: (0, 8),
            ..PreprocessOptions::default()
        };
        assert_eq!(opts.validate(), Err(PreprocessError::InvalidTileGrid(0, 8)));
    }

    #[test]
    fn dark_glyph_on_light_page_becomes_foreground() {
        let mut page = RgbImage::from_pixel(40, 40, Rgb([230, 230, 230]));
        for y in 18..22 {
            for x in 8..32 {
                page.put_pixel(x, y, Rgb([20, 20, 20]));
            }
        }
        let binary = preprocess(&DynamicImage::ImageRgb8(page), &PreprocessOptions::default())
            .expect("valid options");
        assert_eq!(binary.get_pixel(20, 20), &Luma([245]));
        assert_eq!(binary.get_pixel(2, 2), &Luma([0]));
    }

    #[test]
    fn uniform_pages_of_any_size_binarize_to_blank() {
        for (w, h) in [(40, 30), (33, 71), (7, 5)] {
            for value in [0u8, 90, 255] {
                let blank = GrayImage::from_pixel(w, h, Luma([value]));
                let enhanced = clahe(&gaussian_blur(&blank, 3), 2.0, (8, 8));
                assert!(is_uniform(&enhanced), "{w}x{h} value {value}");
                let binary = preprocess_gray(&blank, &PreprocessOptions::default()).expect("valid");
                assert!(binary.pixels().all(|p| p[0] == 0), "{w}x{h} value {value}");
            }
        }
    }

    #[test]
    fn empty_image_passes_through() {
        let empty = GrayImage::new(0, 0);
        let out = preprocess_gray(&empty, &PreprocessOptions::default()).expect("valid");
        assert_eq!(out.dimensions(), (0, 0));
    }

    #[test]
    fn uniform_detection() {
        assert!(is_uniform(&GrayImage::from_pixel(5, 5, Luma([0]))));
        assert!(is_uniform(&GrayImage::new(0, 0)));
        let mut img = GrayImage::from_pixel(5, 5, Luma([255]));
        img.put_pixel(1, 1, Luma([0]));
        assert!(!is_uniform(&img));
    }
}
