use std::sync::mpsc;

use anyhow::Result;
use image::RgbImage;
use image_proc::cv::gray_to_mat;
use opencv::{
    core::{self, Mat},
    highgui, imgproc,
    prelude::*,
};
use tracing::info;

use crate::pipeline::PreparedRegion;
use crate::selector::{Selection, SelectionSession, SelectorEvent, SelectorState};

const SELECT_WINDOW: &str = "Highlight Text";
const HIGHLIGHTED_WINDOW: &str = "Highlighted Region";
const PROCESSED_WINDOW: &str = "Processed Region";

/// 把 `image` 的 RGB 图像复制到 OpenCV `Mat` 并转换为 BGR。
pub fn rgb_to_bgr(image: &RgbImage) -> Result<Mat> {
    let (w, h) = image.dimensions();
    let mut rgb = Mat::zeros(h as i32, w as i32, core::CV_8UC3)?.to_mat()?;
    rgb.data_bytes_mut()?.copy_from_slice(image.as_raw());
    let mut bgr = Mat::default();
    imgproc::cvt_color(
        &rgb,
        &mut bgr,
        imgproc::COLOR_RGB2BGR,
        0,
        core::AlgorithmHint::ALGO_HINT_DEFAULT,
    )?;
    Ok(bgr)
}

fn pointer_event(event: i32, x: i32, y: i32) -> Option<SelectorEvent> {
    match event {
        highgui::EVENT_LBUTTONDOWN => Some(SelectorEvent::PointerDown { x, y }),
        highgui::EVENT_MOUSEMOVE => Some(SelectorEvent::PointerMove { x, y }),
        highgui::EVENT_LBUTTONUP => Some(SelectorEvent::PointerUp { x, y }),
        _ => None,
    }
}

/// 打开选区窗口，直到操作者按 `q`。
///
/// 鼠标回调只负责把事件送进队列；主循环每帧取出全部事件交给会话，然后重绘。
pub fn run_selection(source: RgbImage, brush_size: u32) -> Result<Selection> {
    let mut session = SelectionSession::new(source, brush_size);
    let (tx, rx) = mpsc::channel::<SelectorEvent>();

    highgui::named_window(SELECT_WINDOW, highgui::WINDOW_AUTOSIZE)?;
    highgui::set_mouse_callback(
        SELECT_WINDOW,
        Some(Box::new(move |event, x, y, _flags| {
            if let Some(ev) = pointer_event(event, x, y) {
                let _ = tx.send(ev);
            }
        })),
    )?;
    info!("用鼠标涂抹需要识别的文字；按 r 重置，按 q 完成");

    loop {
        if session.drain(rx.try_iter()) == SelectorState::Terminal {
            break;
        }
        highgui::imshow(SELECT_WINDOW, &rgb_to_bgr(session.display())?)?;
        let key = highgui::wait_key(1)?;
        if let Some(command) = SelectorEvent::from_key(key) {
            if session.handle(command) == SelectorState::Terminal {
                break;
            }
        }
    }

    highgui::destroy_all_windows()?;
    Ok(session.finish())
}

/// 显示选区原图与二值化结果，按任意键继续。
pub fn show_region(region: &PreparedRegion) -> Result<()> {
    highgui::imshow(HIGHLIGHTED_WINDOW, &rgb_to_bgr(&region.highlighted)?)?;
    highgui::imshow(PROCESSED_WINDOW, &gray_to_mat(&region.binary)?)?;
    highgui::wait_key(0)?;
    highgui::destroy_all_windows()?;
    Ok(())
}
