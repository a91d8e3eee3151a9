use image::GrayImage;
use opencv::{
    core::{self, AlgorithmHint, Mat, Size},
    imgproc,
    prelude::*,
};

use crate::{PreprocessError, PreprocessOptions};

impl From<opencv::Error> for PreprocessError {
    fn from(err: opencv::Error) -> Self {
        PreprocessError::OpenCv(err.to_string())
    }
}

/// 把单通道灰度图复制进 `CV_8UC1` 的 `Mat`。
pub fn gray_to_mat(image: &GrayImage) -> opencv::Result<Mat> {
    let (w, h) = image.dimensions();
    let mut mat = Mat::zeros(h as i32, w as i32, core::CV_8UC1)?.to_mat()?;
    mat.data_bytes_mut()?.copy_from_slice(image.as_raw());
    Ok(mat)
}

/// 把 `CV_8UC1` 的 `Mat` 复制回灰度图。
pub fn mat_to_gray(mat: &Mat) -> Result<GrayImage, PreprocessError> {
    let (w, h) = (mat.cols() as u32, mat.rows() as u32);
    let bytes = mat.data_bytes()?.to_vec();
    GrayImage::from_raw(w, h, bytes)
        .ok_or_else(|| PreprocessError::OpenCv(format!("Mat 数据与 {w}x{h} 不符")))
}

/// 用 OpenCV 执行整条预处理流水线：`GaussianBlur` → `CLAHE` → `adaptiveThreshold`。
pub fn preprocess_gray(
    gray: &GrayImage,
    options: &PreprocessOptions,
) -> Result<GrayImage, PreprocessError> {
    let src = gray_to_mat(gray)?;

    let kernel = options.blur_kernel as i32;
    let mut blurred = Mat::default();
    imgproc::gaussian_blur(
        &src,
        &mut blurred,
        Size::new(kernel, kernel),
        0.0,
        0.0,
        core::BORDER_DEFAULT,
        AlgorithmHint::ALGO_HINT_DEFAULT,
    )?;

    let (cols, rows) = options.tile_grid;
    let mut clahe = imgproc::create_clahe(
        options.clip_limit as f64,
        Size::new(cols as i32, rows as i32),
    )?;
    let mut enhanced = Mat::default();
    clahe.apply(&blurred, &mut enhanced)?;

    let mut binary = Mat::default();
    imgproc::adaptive_threshold(
        &enhanced,
        &mut binary,
        options.max_value as f64,
        imgproc::ADAPTIVE_THRESH_GAUSSIAN_C,
        imgproc::THRESH_BINARY_INV,
        options.block_size as i32,
        options.offset as f64,
    )?;

    mat_to_gray(&binary)
}
