use image::{GrayImage, ImageBuffer, Luma, Pixel, Rgb, RgbImage};
use imageproc::drawing::{BresenhamLineIter, draw_filled_circle_mut};

use crate::PreprocessError;

/// 遮罩中“已选中”像素的取值；未选中为 0。
pub const SELECTED: u8 = 255;

/// 与源图同尺寸的二值选区遮罩。
///
/// 只能通过画笔线段置位或整体清空，像素值固定为 `0` 或 [`SELECTED`]，
/// 因此重复涂抹同一区域是幂等的（集合并）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    pixels: GrayImage,
}

impl Mask {
    /// 创建全零遮罩。
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: GrayImage::new(width, height),
        }
    }

    /// 创建与给定图像同尺寸的全零遮罩。
    pub fn for_image<P: Pixel>(image: &ImageBuffer<P, Vec<P::Subpixel>>) -> Self {
        let (width, height) = image.dimensions();
        Self::new(width, height)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// 没有任何像素被选中时返回 `true`。
    pub fn is_empty(&self) -> bool {
        self.pixels.pixels().all(|p| p[0] == 0)
    }

    /// 被选中的像素数量。
    pub fn selected_count(&self) -> usize {
        self.pixels.pixels().filter(|p| p[0] == SELECTED).count()
    }

    pub fn is_selected(&self, x: u32, y: u32) -> bool {
        self.pixels
            .get_pixel_checked(x, y)
            .is_some_and(|p| p[0] == SELECTED)
    }

    /// 当 `other` 的每个选中像素在自身中也被选中时返回 `true`。
    pub fn contains(&self, other: &Mask) -> bool {
        self.dimensions() == other.dimensions()
            && self
                .pixels
                .pixels()
                .zip(other.pixels.pixels())
                .all(|(mine, theirs)| theirs[0] == 0 || mine[0] == SELECTED)
    }

    /// 清空为全零。
    pub fn clear(&mut self) {
        self.pixels.pixels_mut().for_each(|p| p[0] = 0);
    }

    /// 在遮罩上画一段粗细为 `thickness` 的线段（圆头）。
    pub fn paint_segment(&mut self, from: (i32, i32), to: (i32, i32), thickness: u32) {
        draw_brush_segment(&mut self.pixels, from, to, thickness, Luma([SELECTED]));
    }
}

/// 沿 `from` → `to` 的 Bresenham 路径逐点盖上半径为 `thickness / 2` 的实心圆，
/// 得到带圆头的粗线段；超出画布的部分自动裁掉。
pub fn draw_brush_segment<P: Pixel>(
    canvas: &mut ImageBuffer<P, Vec<P::Subpixel>>,
    from: (i32, i32),
    to: (i32, i32),
    thickness: u32,
    color: P,
) {
    let radius = (thickness / 2) as i32;
    let start = (from.0 as f32, from.1 as f32);
    let end = (to.0 as f32, to.1 as f32);
    for center in BresenhamLineIter::new(start, end) {
        draw_filled_circle_mut(canvas, center, radius, color);
    }
    draw_filled_circle_mut(canvas, to, radius, color);
}

/// 只保留遮罩选中的像素，其余置黑。
///
/// # 错误
/// - 遮罩与图像尺寸不一致时返回 [`PreprocessError::DimensionMismatch`]。
pub fn apply_mask(image: &RgbImage, mask: &Mask) -> Result<RgbImage, PreprocessError> {
    let (image_width, image_height) = image.dimensions();
    let (mask_width, mask_height) = mask.dimensions();
    if (image_width, image_height) != (mask_width, mask_height) {
        return Err(PreprocessError::DimensionMismatch {
            mask_width,
            mask_height,
            image_width,
            image_height,
        });
    }

    Ok(RgbImage::from_fn(image_width, image_height, |x, y| {
        if mask.pixels.get_pixel(x, y)[0] == SELECTED {
            *image.get_pixel(x, y)
        } else {
            Rgb([0, 0, 0])
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_mask_is_empty() {
        let mask = Mask::new(10, 8);
        assert!(mask.is_empty());
        assert_eq!(mask.selected_count(), 0);
        assert_eq!(mask.dimensions(), (10, 8));
    }

    #[test]
    fn segment_covers_its_endpoints_and_thickness() {
        let mut mask = Mask::new(50, 50);
        mask.paint_segment((10, 25), (40, 25), 10);
        assert!(mask.is_selected(10, 25));
        assert!(mask.is_selected(40, 25));
        assert!(mask.is_selected(25, 21));
        assert!(mask.is_selected(25, 29));
        assert!(!mask.is_selected(25, 10));
    }

    #[test]
    fn repainting_is_idempotent() {
        let mut once = Mask::new(30, 30);
        once.paint_segment((5, 5), (20, 20), 6);
        let mut twice = once.clone();
        twice.paint_segment((5, 5), (20, 20), 6);
        assert_eq!(once, twice);
    }

    #[test]
    fn painting_outside_the_canvas_is_clipped() {
        let mut mask = Mask::new(20, 20);
        mask.paint_segment((-30, -30), (-10, -10), 8);
        assert!(mask.is_empty());
        mask.paint_segment((-5, 10), (5, 10), 4);
        assert!(mask.is_selected(0, 10));
    }

    #[test]
    fn apply_mask_blacks_out_unselected_pixels() {
        let image = RgbImage::from_pixel(6, 6, Rgb([120, 80, 40]));
        let mut mask = Mask::for_image(&image);
        mask.paint_segment((2, 2), (2, 2), 2);
        let masked = apply_mask(&image, &mask).expect("same size");
        assert_eq!(masked.get_pixel(2, 2), &Rgb([120, 80, 40]));
        assert_eq!(masked.get_pixel(5, 5), &Rgb([0, 0, 0]));
    }

    #[test]
    fn apply_mask_rejects_mismatched_dimensions() {
        let image = RgbImage::new(4, 4);
        let mask = Mask::new(5, 4);
        assert!(matches!(
            apply_mask(&image, &mask),
            Err(PreprocessError::DimensionMismatch { .. })
        ));
    }
}
