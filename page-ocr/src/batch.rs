use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::pipeline::{PageError, PagePipeline, SaveOutcome, save_extraction};

/// 批量 OCR 的默认输出根目录。
pub const DEFAULT_OUTPUT_ROOT: &str = "translated";

/// 过滤文件扩展名，仅允许 PNG/JPG/JPEG（不区分大小写）。
pub fn is_supported_image(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|s| s.to_ascii_lowercase()),
        Some(ext) if ext == "png" || ext == "jpg" || ext == "jpeg"
    )
}

/// 输出目录：`<output_root>/<输入目录名>`。
///
/// 输入目录名为空（如 `.`）时先规范化路径再取名。
pub fn output_dir_for(output_root: &Path, image_dir: &Path) -> Result<PathBuf> {
    let name = match image_dir.file_name() {
        Some(name) => name.to_os_string(),
        None => fs::canonicalize(image_dir)
            .with_context(|| format!("无法解析目录 {}", image_dir.display()))?
            .file_name()
            .map(|name| name.to_os_string())
            .with_context(|| format!("无法从 {} 推导输出目录名", image_dir.display()))?,
    };
    Ok(output_root.join(name))
}

/// 单个文件的处理结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// 已写出文本文件。
    Written(PathBuf),
    /// 后端未识别到文字，未写文件。
    NoText,
    /// 载入、预处理、OCR 或写文件失败，附带原因。
    Failed(String),
}

/// 一次批处理的汇总。
#[derive(Debug, Default)]
pub struct BatchReport {
    pub output_dir: PathBuf,
    pub entries: Vec<(PathBuf, FileOutcome)>,
}

impl BatchReport {
    pub fn processed(&self) -> usize {
        self.entries.len()
    }

    pub fn written(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Written(_)))
    }

    pub fn no_text(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::NoText))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.entries.iter().filter(|(_, outcome)| pred(outcome)).count()
    }
}

/// 顺序遍历目录中的图像，逐个取字并写入镜像输出目录。
///
/// 每个文件独立处理：任何一张失败只会记录日志，不会中断批处理。
pub struct BatchWalker<'a> {
    pipeline: PagePipeline<'a>,
    output_root: PathBuf,
}

impl<'a> BatchWalker<'a> {
    pub fn new(pipeline: PagePipeline<'a>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            pipeline,
            output_root: output_root.into(),
        }
    }

    /// 列出目录第一层中受支持的图像，按文件名排序。无法读取的目录项记录警告后跳过。
    pub fn collect_images(image_dir: &Path) -> Vec<PathBuf> {
        WalkDir::new(image_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|res| match res {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("跳过无法读取的目录项：{err}");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| is_supported_image(path))
            .collect()
    }

    /// 处理整个目录。只有目录本身不可用或输出目录无法创建时才返回错误。
    pub fn run(&self, image_dir: &Path) -> Result<BatchReport> {
        anyhow::ensure!(
            image_dir.is_dir(),
            "{} 不是有效的目录",
            image_dir.display()
        );
        let output_dir = output_dir_for(&self.output_root, image_dir)?;
        fs::create_dir_all(&output_dir)
            .with_context(|| format!("无法创建输出目录 {}", output_dir.display()))?;

        let mut report = BatchReport {
            output_dir: output_dir.clone(),
            entries: Vec::new(),
        };

        for path in Self::collect_images(image_dir) {
            info!("处理图像：{}", path.display());
            let outcome = self.process(&path, &output_dir);
            match &outcome {
                FileOutcome::Written(out) => debug!(output = %out.display(), "written"),
                FileOutcome::NoText => warn!("{} 未识别到文字", path.display()),
                FileOutcome::Failed(reason) => warn!("{} 处理失败：{reason}", path.display()),
            }
            report.entries.push((path, outcome));
        }

        Ok(report)
    }

    fn process(&self, path: &Path, output_dir: &Path) -> FileOutcome {
        let Some(stem) = path.file_stem() else {
            return FileOutcome::Failed("文件名缺少主干".to_string());
        };
        let mut file_name = stem.to_os_string();
        file_name.push(".txt");
        let output = output_dir.join(file_name);

        let result: Result<String, PageError> = self.pipeline.extract_file(path);
        match save_extraction(result, &output) {
            Ok(SaveOutcome::Saved(out)) => FileOutcome::Written(out),
            Ok(SaveOutcome::NoText) => FileOutcome::NoText,
            Err(err) => FileOutcome::Failed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_filter_is_case_insensitive() {
        assert!(is_supported_image(Path::new("a/page_001.JPG")));
        assert!(is_supported_image(Path::new("page.jpeg")));
        assert!(is_supported_image(Path::new("page.png")));
        assert!(!is_supported_image(Path::new("notes.txt")));
        assert!(!is_supported_image(Path::new("page.tiff")));
        assert!(!is_supported_image(Path::new("jpg")));
    }

    #[test]
    fn output_dir_mirrors_input_name() {
        let out = output_dir_for(Path::new("translated"), Path::new("resources/libro_arte"))
            .expect("named dir");
        assert_eq!(out, PathBuf::from("translated/libro_arte"));
    }

    #[test]
    fn collects_only_top_level_images_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["b.png", "a.jpg", "c.JPEG", "notes.txt"] {
            fs::write(dir.path().join(name), b"x").expect("write");
        }
        fs::create_dir(dir.path().join("sub")).expect("mkdir");
        fs::write(dir.path().join("sub").join("d.jpg"), b"x").expect("write");

        let names: Vec<String> = BatchWalker::collect_images(dir.path())
            .iter()
            .filter_map(|p| p.file_name()?.to_str().map(str::to_string))
            .collect();
        assert_eq!(names, ["a.jpg", "b.png", "c.JPEG"]);
    }

    #[test]
    fn unreadable_entries_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("gone");
        assert!(BatchWalker::collect_images(&missing).is_empty());
    }

    #[test]
    fn report_counts_outcomes() {
        let report = BatchReport {
            output_dir: PathBuf::from("translated/x"),
            entries: vec![
                ("a.jpg".into(), FileOutcome::Written("translated/x/a.txt".into())),
                ("b.jpg".into(), FileOutcome::NoText),
                ("c.jpg".into(), FileOutcome::Failed("boom".into())),
                ("d.jpg".into(), FileOutcome::Written("translated/x/d.txt".into())),
            ],
        };
        assert_eq!(report.processed(), 4);
        assert_eq!(report.written(), 2);
        assert_eq!(report.no_text(), 1);
        assert_eq!(report.failed(), 1);
    }
}
