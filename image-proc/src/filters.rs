use image::{DynamicImage, GrayImage, Luma};
use imageproc::map::map_colors2;

use crate::clahe::reflect_101;

/// 卷积时越界像素的取值方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Border {
    /// `gfedcb|abcdefgh|gfedcba`，高斯模糊的默认边界。
    Reflect101,
    /// `aaaaaa|abcdefgh|hhhhhhh`，自适应阈值求局部均值时使用。
    Replicate,
}

impl Border {
    fn index(self, pos: i64, len: u32) -> u32 {
        match self {
            Border::Reflect101 => reflect_101(pos, len),
            Border::Replicate => pos.clamp(0, len as i64 - 1) as u32,
        }
    }
}

/// 转为单通道灰度图。
pub fn to_gray(image: &DynamicImage) -> GrayImage {
    image.to_luma8()
}

/// 生成边长为 `size` 的一维高斯核（已归一化）。
///
/// sigma 由核尺寸推导：`0.3 * ((size - 1) * 0.5 - 1) + 0.8`。
/// 小核（1/3/5/7）直接使用二项式系数，与常见视觉库在 sigma 未指定时的行为一致。
pub fn gaussian_kernel(size: u32) -> Vec<f32> {
    match size {
        1 => vec![1.0],
        3 => vec![0.25, 0.5, 0.25],
        5 => vec![0.0625, 0.25, 0.375, 0.25, 0.0625],
        7 => vec![
            0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125,
        ],
        _ => {
            let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
            let center = (size / 2) as f32;
            let denom = 2.0 * sigma * sigma;
            let raw: Vec<f32> = (0..size)
                .map(|i| {
                    let d = i as f32 - center;
                    (-(d * d) / denom).exp()
                })
                .collect();
            let sum: f32 = raw.iter().sum();
            raw.into_iter().map(|w| w / sum).collect()
        }
    }
}

/// 固定核尺寸的高斯模糊，边缘按 reflect-101 方式处理。
pub fn gaussian_blur(image: &GrayImage, kernel_size: u32) -> GrayImage {
    if kernel_size <= 1 {
        return image.clone();
    }
    convolve_separable(image, &gaussian_kernel(kernel_size), Border::Reflect101)
}

/// 先横向后纵向的可分离卷积，中间结果保留浮点，最后四舍五入回 8 位。
pub(crate) fn convolve_separable(image: &GrayImage, kernel: &[f32], border: Border) -> GrayImage {
    let (width, height) = image.dimensions();
    let radius = (kernel.len() / 2) as i64;

    let mut rows = vec![0f32; (width * height) as usize];
    for y in 0..height {
        for x in 0..width {
            rows[(y * width + x) as usize] = kernel
                .iter()
                .enumerate()
                .map(|(i, k)| {
                    let sx = border.index(x as i64 + i as i64 - radius, width);
                    k * image.get_pixel(sx, y)[0] as f32
                })
                .sum();
        }
    }

    GrayImage::from_fn(width, height, |x, y| {
        let acc: f32 = kernel
            .iter()
            .enumerate()
            .map(|(i, k)| {
                let sy = border.index(y as i64 + i as i64 - radius, height);
                k * rows[(sy * width + x) as usize]
            })
            .sum();
        Luma([acc.round().clamp(0.0, 255.0) as u8])
    })
}

/// 反相自适应二值化。
///
/// 以 `block_size` 邻域的高斯加权均值（边缘复制）减去 `offset` 作为局部阈值：
/// 像素不高于阈值时写入 `max_value`（前景/文字），否则写入 `0`。
pub fn adaptive_threshold_inv(
    image: &GrayImage,
    block_size: u32,
    offset: i32,
    max_value: u8,
) -> GrayImage {
    let mean = convolve_separable(image, &gaussian_kernel(block_size), Border::Replicate);
    map_colors2(image, &mean, |src, local| {
        let diff = src[0] as i32 - local[0] as i32;
        if diff <= -offset {
            Luma([max_value])
        } else {
            Luma([0])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernels_are_normalized_and_symmetric() {
        for size in [1u32, 3, 5, 7, 9, 15] {
            let kernel = gaussian_kernel(size);
            assert_eq!(kernel.len(), size as usize);
            let sum: f32 = kernel.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "size {size} sums to {sum}");
            for i in 0..kernel.len() / 2 {
                assert!((kernel[i] - kernel[kernel.len() - 1 - i]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn blur_keeps_flat_image_flat() {
        let flat = GrayImage::from_pixel(12, 9, Luma([128]));
        let blurred = gaussian_blur(&flat, 5);
        assert_eq!(blurred.dimensions(), (12, 9));
        assert!(blurred.pixels().all(|p| p[0] == 128));
    }

    #[test]
    fn blur_rounds_to_nearest() {
        let mut img = GrayImage::from_pixel(3, 3, Luma([0]));
        img.put_pixel(1, 1, Luma([6]));
        let blurred = gaussian_blur(&img, 3);
        // 中心权重 0.5 * 0.5，6 * 0.25 = 1.5
        assert_eq!(blurred.get_pixel(1, 1)[0], 2);
        // reflect-101 下角点两次取到中心：6 * (0.25 + 0.25) * (0.25 + 0.25) = 1.5
        assert_eq!(blurred.get_pixel(0, 0)[0], 2);
        assert_eq!(blurred.get_pixel(1, 0)[0], 2);
    }

    #[test]
    fn replicate_and_reflect_borders_differ() {
        assert_eq!(Border::Replicate.index(-2, 5), 0);
        assert_eq!(Border::Reflect101.index(-2, 5), 2);
        assert_eq!(Border::Replicate.index(7, 5), 4);
        assert_eq!(Border::Reflect101.index(7, 5), 1);
    }

    #[test]
    fn threshold_marks_dark_pixels_only() {
        let mut img = GrayImage::from_pixel(21, 21, Luma([200]));
        img.put_pixel(10, 10, Luma([10]));
        let out = adaptive_threshold_inv(&img, 15, 5, 245);
        assert_eq!(out.get_pixel(10, 10)[0], 245);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert!(out.pixels().all(|p| p[0] == 0 || p[0] == 245));
    }
}
