use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, ImageFormat, ImageReader, RgbImage};
use image_proc::{PreprocessError, PreprocessOptions, apply_mask, preprocess};
use ocr::{ExtractionError, InputPreference, OcrEngine};
use tracing::{debug, info};

use crate::selector::Selection;

/// 单张图像处理过程中的失败分类。
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("无法载入图像 {path}：{source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("未选择任何区域")]
    NoRegionSelected,
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("写入 {path} 失败：{source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 成功结束时的两种结果：写出了文件，或后端没有识别到文字（不算错误）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(PathBuf),
    NoText,
}

/// 选区经遮罩与预处理后的中间结果，供显示与 OCR 复用。
#[derive(Debug, Clone)]
pub struct PreparedRegion {
    /// 仅保留选中像素的彩色图，其余为黑色。
    pub highlighted: RgbImage,
    /// `highlighted` 的二值化结果。
    pub binary: GrayImage,
}

/// 载入图像文件；路径错误或格式无法识别都归为 [`PageError::ImageLoad`]。
pub fn load_image(path: &Path) -> Result<DynamicImage, PageError> {
    let load = || -> Result<DynamicImage, image::ImageError> {
        Ok(ImageReader::open(path)?.with_guessed_format()?.decode()?)
    };
    load().map_err(|source| PageError::ImageLoad {
        path: path.to_path_buf(),
        source,
    })
}

/// 写出识别文本，必要时创建上级目录。
pub fn persist_text(path: &Path, text: &str) -> Result<(), PageError> {
    let write = || -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, text)
    };
    write().map_err(|source| PageError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// 把识别结果落盘：有文字时写文件，`NoTextFound` 视为正常结束且不写文件。
pub fn save_extraction(
    result: Result<String, PageError>,
    output: &Path,
) -> Result<SaveOutcome, PageError> {
    match result {
        Ok(text) => {
            persist_text(output, &text)?;
            info!("已保存识别文本到 {}", output.display());
            Ok(SaveOutcome::Saved(output.to_path_buf()))
        }
        Err(PageError::Extraction(ExtractionError::NoTextFound)) => Ok(SaveOutcome::NoText),
        Err(err) => Err(err),
    }
}

/// 预处理参数与 OCR 引擎的组合，对单张图像或选区执行完整取字流程。
pub struct PagePipeline<'a> {
    engine: &'a OcrEngine,
    options: PreprocessOptions,
}

impl<'a> PagePipeline<'a> {
    pub fn new(engine: &'a OcrEngine, options: PreprocessOptions) -> Self {
        Self { engine, options }
    }

    /// 对图像执行预处理，得到二值图。
    pub fn binarize(&self, image: &DynamicImage) -> Result<GrayImage, PageError> {
        Ok(preprocess(image, &self.options)?)
    }

    /// 对整张图像文件取字。
    ///
    /// 偏好原图的后端直接拿到文件字节；其余后端先载入并预处理。
    pub fn extract_file(&self, path: &Path) -> Result<String, PageError> {
        match self.engine.preferred_input() {
            InputPreference::Source => Ok(self.engine.recognize_bytes(&read_source(path)?)?),
            InputPreference::Preprocessed => {
                let binary = self.binarize(&load_image(path)?)?;
                Ok(self.engine.recognize_image(&binary)?)
            }
        }
    }

    /// 与 [`PagePipeline::extract_file`] 相同，但总是产出二值图以便调试输出。
    ///
    /// 偏好原图的后端收到的仍是文件原始字节，而不是重新编码的像素。
    pub fn extract_file_with_binary(&self, path: &Path) -> Result<(GrayImage, String), PageError> {
        let binary = self.binarize(&load_image(path)?)?;
        let text = match self.engine.preferred_input() {
            InputPreference::Preprocessed => self.engine.recognize_image(&binary)?,
            InputPreference::Source => self.engine.recognize_bytes(&read_source(path)?)?,
        };
        Ok((binary, text))
    }

    /// 应用遮罩并预处理选区；遮罩为空时返回 [`PageError::NoRegionSelected`]。
    pub fn prepare_selection(&self, selection: &Selection) -> Result<PreparedRegion, PageError> {
        if selection.mask.is_empty() {
            return Err(PageError::NoRegionSelected);
        }
        let highlighted = apply_mask(&selection.source, &selection.mask)?;
        debug!(
            selected = selection.mask.selected_count(),
            "applying brush mask"
        );
        let binary = self.binarize(&DynamicImage::ImageRgb8(highlighted.clone()))?;
        Ok(PreparedRegion {
            highlighted,
            binary,
        })
    }

    /// 对预处理好的选区执行 OCR。
    pub fn recognize_region(&self, region: &PreparedRegion) -> Result<String, PageError> {
        let text = match self.engine.preferred_input() {
            InputPreference::Preprocessed => self.engine.recognize_image(&region.binary)?,
            InputPreference::Source => {
                let image = DynamicImage::ImageRgb8(region.highlighted.clone());
                self.engine.recognize_bytes(&encode_png(&image)?)?
            }
        };
        Ok(text)
    }

    /// 选区完整流程：遮罩 → 预处理 → `inspect` 回调（如窗口预览）→ OCR → 写文件。
    pub fn extract_selection_to_file<F>(
        &self,
        selection: &Selection,
        output: &Path,
        inspect: F,
    ) -> Result<SaveOutcome, PageError>
    where
        F: FnOnce(&PreparedRegion),
    {
        let region = self.prepare_selection(selection)?;
        inspect(&region);
        save_extraction(self.recognize_region(&region), output)
    }
}

fn read_source(path: &Path) -> Result<Vec<u8>, PageError> {
    fs::read(path).map_err(|err| PageError::ImageLoad {
        path: path.to_path_buf(),
        source: image::ImageError::IoError(err),
    })
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, PageError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|err| ExtractionError::BackendError(format!("failed to encode image: {err}")))?;
    Ok(buffer.into_inner())
}
