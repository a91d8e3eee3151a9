use image::{Rgb, RgbImage};
use image_proc::{Mask, draw_brush_segment};
use tracing::debug;

/// 默认画笔粗细（像素）。
pub const DEFAULT_BRUSH_SIZE: u32 = 50;

/// 显示副本上笔迹的颜色。
pub const OVERLAY_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// 选区会话接收的输入事件：指针事件与键盘命令统一排队。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorEvent {
    PointerDown { x: i32, y: i32 },
    PointerMove { x: i32, y: i32 },
    PointerUp { x: i32, y: i32 },
    /// 清空遮罩并恢复原图显示。
    Reset,
    /// 结束选区。
    Finish,
}

impl SelectorEvent {
    /// 键盘映射：`r` 重置，`q` 完成；其他按键忽略。
    pub fn from_key(key: i32) -> Option<Self> {
        match u8::try_from(key & 0xFF).ok().map(char::from) {
            Some('r') | Some('R') => Some(Self::Reset),
            Some('q') | Some('Q') => Some(Self::Finish),
            _ => None,
        }
    }
}

/// 会话所处阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorState {
    Idle,
    Painting,
    Terminal,
}

/// 当前笔画的临时状态；松开指针或重置时清空。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StrokeState {
    pub active: bool,
    pub last_point: Option<(i32, i32)>,
}

/// 画笔选区会话：持有原图、带笔迹的显示副本、遮罩与笔画状态。
///
/// 所有修改都经过 [`SelectionSession::handle`]；[`SelectionSession::finish`] 消耗会话并交出遮罩，
/// 此后遮罩不可能再被修改。
pub struct SelectionSession {
    source: RgbImage,
    display: RgbImage,
    mask: Mask,
    stroke: StrokeState,
    brush_size: u32,
    finished: bool,
}

/// 选区结束后交给流水线的数据。
#[derive(Debug, Clone)]
pub struct Selection {
    pub source: RgbImage,
    pub mask: Mask,
}

impl SelectionSession {
    pub fn new(source: RgbImage, brush_size: u32) -> Self {
        let mask = Mask::for_image(&source);
        Self {
            display: source.clone(),
            source,
            mask,
            stroke: StrokeState::default(),
            brush_size: brush_size.max(1),
            finished: false,
        }
    }

    pub fn state(&self) -> SelectorState {
        if self.finished {
            SelectorState::Terminal
        } else if self.stroke.active {
            SelectorState::Painting
        } else {
            SelectorState::Idle
        }
    }

    /// 处理单个事件并返回处理后的状态。终止后的事件一律忽略。
    pub fn handle(&mut self, event: SelectorEvent) -> SelectorState {
        if self.finished {
            return SelectorState::Terminal;
        }

        match event {
            SelectorEvent::PointerDown { x, y } => {
                self.stroke = StrokeState {
                    active: true,
                    last_point: Some((x, y)),
                };
            }
            SelectorEvent::PointerMove { x, y } => {
                if self.stroke.active {
                    self.paint_to((x, y));
                    self.stroke.last_point = Some((x, y));
                }
            }
            SelectorEvent::PointerUp { x, y } => {
                if self.stroke.active {
                    self.paint_to((x, y));
                }
                self.stroke = StrokeState::default();
            }
            SelectorEvent::Reset => {
                debug!("selection reset");
                self.display = self.source.clone();
                self.mask.clear();
                self.stroke = StrokeState::default();
            }
            SelectorEvent::Finish => {
                self.stroke = StrokeState::default();
                self.finished = true;
            }
        }

        self.state()
    }

    /// 依次处理一批事件，遇到终止即停止，返回最终状态。
    pub fn drain(&mut self, events: impl IntoIterator<Item = SelectorEvent>) -> SelectorState {
        for event in events {
            if self.handle(event) == SelectorState::Terminal {
                break;
            }
        }
        self.state()
    }

    /// 从上一个位置到 `to` 画一段，同时落在显示副本与遮罩上。
    fn paint_to(&mut self, to: (i32, i32)) {
        let from = self.stroke.last_point.unwrap_or(to);
        draw_brush_segment(&mut self.display, from, to, self.brush_size, OVERLAY_COLOR);
        self.mask.paint_segment(from, to, self.brush_size);
    }

    pub fn source(&self) -> &RgbImage {
        &self.source
    }

    pub fn display(&self) -> &RgbImage {
        &self.display
    }

    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    pub fn stroke(&self) -> StrokeState {
        self.stroke
    }

    pub fn brush_size(&self) -> u32 {
        self.brush_size
    }

    /// 冻结遮罩并结束会话。遮罩可能为空（操作者什么都没画）。
    pub fn finish(self) -> Selection {
        Selection {
            source: self.source,
            mask: self.mask,
        }
    }
}
