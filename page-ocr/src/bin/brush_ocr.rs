use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use image_proc::PreprocessOptions;
use ocr::OcrEngine;
use page_ocr::pipeline::{PagePipeline, SaveOutcome, load_image};
use page_ocr::selector::DEFAULT_BRUSH_SIZE;
use page_ocr::settings::{OcrArgs, load_env};

/// 命令行参数：待涂抹的图像、输出文件与画笔粗细。
#[derive(Parser, Debug)]
#[command(
    name = "brush-ocr",
    version,
    about = "用画笔涂抹书页上的文字区域并识别为文本"
)]
struct Args {
    /// 书页扫描图路径
    #[arg(long = "image_path", default_value = "lib/introduction_page.jpeg")]
    image_path: PathBuf,

    /// 识别文本的输出文件
    #[arg(long, default_value = "extracted_text.txt")]
    output: PathBuf,

    /// 画笔粗细（像素）
    #[arg(long, default_value_t = DEFAULT_BRUSH_SIZE)]
    brush_size: u32,

    #[command(flatten)]
    ocr: OcrArgs,
}

/// 程序入口：载入环境与参数后启动选区窗口。
fn main() -> Result<()> {
    page_ocr::init_tracing();
    load_env()?;
    run(Args::parse())
}

fn run(args: Args) -> Result<()> {
    let source = load_image(&args.image_path)?.to_rgb8();
    let engine = OcrEngine::new(args.ocr.to_config())?;
    let pipeline = PagePipeline::new(&engine, PreprocessOptions::brush());

    let selection = select(source, args.brush_size)?;
    if selection.mask.is_empty() {
        println!("未选择任何区域");
        return Ok(());
    }

    match pipeline.extract_selection_to_file(&selection, &args.output, inspect)? {
        SaveOutcome::Saved(path) => println!("已保存识别文本到 {}", path.display()),
        SaveOutcome::NoText => println!("未识别到任何文字"),
    }
    Ok(())
}

#[cfg(feature = "gui")]
fn select(source: image::RgbImage, brush_size: u32) -> Result<page_ocr::selector::Selection> {
    page_ocr::display::run_selection(source, brush_size)
}

#[cfg(not(feature = "gui"))]
fn select(_source: image::RgbImage, _brush_size: u32) -> Result<page_ocr::selector::Selection> {
    anyhow::bail!("brush-ocr 需要图形界面，请使用 `--features gui` 重新编译")
}

#[cfg(feature = "gui")]
fn inspect(region: &page_ocr::pipeline::PreparedRegion) {
    if let Err(err) = page_ocr::display::show_region(region) {
        tracing::warn!("无法显示选区预览：{err:#}");
    }
}

#[cfg(not(feature = "gui"))]
fn inspect(_region: &page_ocr::pipeline::PreparedRegion) {}
