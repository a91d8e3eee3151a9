use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use ocr::{BackendKind, OcrConfig, TesseractConfig, VisionConfig};

/// 显式指定 `.env` 路径时使用的环境变量。
pub const ENV_FILE_VAR: &str = "PAGE_OCR_ENV_FILE";

/// 未显式指定时依次尝试的 `.env` 位置（当前目录、上级目录）。
const ENV_FILE_CANDIDATES: [&str; 2] = [".env", "../.env"];

/// 在解析命令行之前载入 `.env`，使 clap 的 `env` 回退能读到其中的变量。
///
/// 已存在的进程环境变量不会被覆盖。返回实际载入的文件路径。
pub fn load_env() -> Result<Option<PathBuf>> {
    if let Ok(explicit) = env::var(ENV_FILE_VAR) {
        let path = PathBuf::from(explicit);
        dotenvy::from_path(&path)
            .with_context(|| format!("无法载入环境文件 {}", path.display()))?;
        return Ok(Some(path));
    }
    load_first_existing(ENV_FILE_CANDIDATES.iter().map(|name| Path::new(*name)))
}

fn load_first_existing<'a>(candidates: impl IntoIterator<Item = &'a Path>) -> Result<Option<PathBuf>> {
    for candidate in candidates {
        if candidate.is_file() {
            dotenvy::from_path(candidate)
                .with_context(|| format!("无法载入环境文件 {}", candidate.display()))?;
            return Ok(Some(candidate.to_path_buf()));
        }
    }
    Ok(None)
}

/// 各个命令共用的 OCR 参数。
#[derive(Args, Debug, Clone)]
pub struct OcrArgs {
    /// 使用 Google Cloud Vision 代替本地 Tesseract
    #[arg(long = "use_google_vision", default_value_t = false)]
    pub use_google_vision: bool,

    /// Tesseract 语言模型
    #[arg(long, default_value = "spa")]
    pub lang: String,

    /// Tesseract 页面分割模式（6 = 单一均匀文本块）
    #[arg(long, default_value_t = 6)]
    pub psm: u8,

    /// Tesseract 可执行文件
    #[arg(long, default_value = "tesseract")]
    pub tesseract: PathBuf,

    /// Cloud Vision API key
    #[arg(long = "google_api_key", env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: Option<String>,
}

impl OcrArgs {
    pub fn backend(&self) -> BackendKind {
        BackendKind::from_flag(self.use_google_vision)
    }

    /// 组装 `OcrEngine` 所需的配置。
    pub fn to_config(&self) -> OcrConfig {
        OcrConfig::new(self.backend())
            .with_tesseract(TesseractConfig {
                binary: self.tesseract.clone(),
                language: self.lang.clone(),
                psm: self.psm,
            })
            .with_vision(VisionConfig::new(self.google_api_key.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        ocr: OcrArgs,
    }

    #[test]
    fn defaults_select_local_spanish_engine() {
        let cli = Cli::parse_from(["test"]);
        let config = cli.ocr.to_config();
        assert_eq!(config.backend, BackendKind::Tesseract);
        assert_eq!(config.tesseract.language, "spa");
        assert_eq!(config.tesseract.psm, 6);
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "test",
            "--use_google_vision",
            "--lang",
            "eng",
            "--psm",
            "3",
            "--google_api_key",
            "abc",
        ]);
        let config = cli.ocr.to_config();
        assert_eq!(config.backend, BackendKind::GoogleVision);
        assert_eq!(config.tesseract.language, "eng");
        assert_eq!(config.tesseract.psm, 3);
        assert_eq!(config.vision.api_key(), Some("abc"));
    }

    #[test]
    fn loads_first_existing_env_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("missing.env");
        let present = dir.path().join("present.env");
        fs::write(&present, "PAGE_OCR_SETTINGS_TEST_VAR=from-file\n").expect("write env");

        let loaded = load_first_existing([missing.as_path(), present.as_path()]).expect("load");
        assert_eq!(loaded.as_deref(), Some(present.as_path()));
        assert_eq!(
            env::var("PAGE_OCR_SETTINGS_TEST_VAR").as_deref(),
            Ok("from-file")
        );
    }

    #[test]
    fn no_candidates_is_not_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join(".env");
        assert_eq!(load_first_existing([missing.as_path()]).expect("load"), None);
    }
}
