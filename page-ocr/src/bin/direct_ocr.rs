use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use image_proc::PreprocessOptions;
use ocr::OcrEngine;
use page_ocr::batch::{BatchWalker, DEFAULT_OUTPUT_ROOT};
use page_ocr::pipeline::{PagePipeline, SaveOutcome, save_extraction};
use page_ocr::settings::{OcrArgs, load_env};
use tracing::info;

/// 命令行参数：目录批量模式或单张图像模式二选一。
#[derive(Parser, Debug)]
#[command(
    name = "direct-ocr",
    version,
    about = "对整页扫描图直接执行 OCR，支持按目录批量处理",
    group(ArgGroup::new("input").required(true).args(["image_dir", "image_path"]))
)]
struct Args {
    /// 包含书页图像的目录（仅处理第一层的 png/jpg/jpeg）
    #[arg(long = "image_dir")]
    image_dir: Option<PathBuf>,

    /// 单张图像路径
    #[arg(long = "image_path")]
    image_path: Option<PathBuf>,

    /// 批量模式的输出根目录，结果写入 `<root>/<目录名>/<文件名>.txt`
    #[arg(long, default_value = DEFAULT_OUTPUT_ROOT)]
    output_root: PathBuf,

    /// 单张模式的输出文件
    #[arg(long, default_value = "extracted_text.txt")]
    output: PathBuf,

    /// 单张模式下额外保存二值化结果（PNG）
    #[arg(long)]
    save_binary: Option<PathBuf>,

    #[command(flatten)]
    ocr: OcrArgs,
}

/// 程序入口：载入环境与参数后按模式分派。
fn main() -> Result<()> {
    page_ocr::init_tracing();
    load_env()?;
    run(Args::parse())
}

fn run(args: Args) -> Result<()> {
    let engine = OcrEngine::new(args.ocr.to_config())?;
    info!(backend = %engine.kind(), "OCR 引擎已就绪");
    let pipeline = PagePipeline::new(&engine, PreprocessOptions::default());

    match (&args.image_dir, &args.image_path) {
        (Some(dir), _) => run_batch(pipeline, dir, &args.output_root),
        (None, Some(path)) => run_single(&pipeline, path, &args.output, args.save_binary.as_deref()),
        (None, None) => anyhow::bail!("需要 --image_dir 或 --image_path"),
    }
}

fn run_batch(pipeline: PagePipeline<'_>, dir: &Path, output_root: &Path) -> Result<()> {
    let report = BatchWalker::new(pipeline, output_root).run(dir)?;
    println!(
        "共处理 {} 张图像：写出 {}，无文字 {}，失败 {}；输出目录 {}",
        report.processed(),
        report.written(),
        report.no_text(),
        report.failed(),
        report.output_dir.display()
    );
    Ok(())
}

fn run_single(
    pipeline: &PagePipeline<'_>,
    path: &Path,
    output: &Path,
    save_binary: Option<&Path>,
) -> Result<()> {
    let result = match pipeline.extract_file_with_binary(path) {
        Ok((binary, text)) => {
            if let Some(target) = save_binary {
                binary
                    .save(target)
                    .with_context(|| format!("无法保存二值化结果到 {}", target.display()))?;
                info!("二值化结果已保存到 {}", target.display());
            }
            Ok(text)
        }
        Err(err) => Err(err),
    };

    if let Ok(text) = &result {
        println!("{text}");
    }
    match save_extraction(result, output).context("单张图像 OCR 失败")? {
        SaveOutcome::Saved(path) => println!("已保存识别文本到 {}", path.display()),
        SaveOutcome::NoText => println!("未识别到任何文字"),
    }
    Ok(())
}
