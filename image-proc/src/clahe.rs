use image::{GrayImage, Luma};

const BINS: usize = 256;

/// 对比度受限的自适应直方图均衡（CLAHE）。
///
/// 将图像划分为 `grid` 个等大的子块，每块独立计算裁剪后的直方图映射表，
/// 再按像素到相邻四个子块中心的距离做双线性插值，避免块边界出现台阶。
/// 宽高不能被网格整除时，按 reflect-101 方式在右侧和底部补边，使每块面积相同。
///
/// # 参数
/// - `image`: 单通道灰度图。
/// - `clip_limit`: 裁剪上限，表示为平均每个灰度级计数的倍数；`<= 0` 时不裁剪。
/// - `grid`: 子块网格（列数, 行数），为 0 时按 1 处理。
pub fn clahe(image: &GrayImage, clip_limit: f32, grid: (u32, u32)) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let tiles_x = grid.0.max(1);
    let tiles_y = grid.1.max(1);
    let tile_w = width.div_ceil(tiles_x);
    let tile_h = height.div_ceil(tiles_y);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            luts.push(tile_lut(image, (tx * tile_w, ty * tile_h), (tile_w, tile_h), clip_limit));
        }
    }

    let lut_at = |tx: u32, ty: u32| &luts[(ty * tiles_x + tx) as usize];
    let inv_tw = 1.0 / tile_w as f32;
    let inv_th = 1.0 / tile_h as f32;

    GrayImage::from_fn(width, height, |x, y| {
        let value = image.get_pixel(x, y)[0] as usize;

        let (ty0, ty1, wy) = neighbours(y as f32 * inv_th - 0.5, tiles_y);
        let (tx0, tx1, wx) = neighbours(x as f32 * inv_tw - 0.5, tiles_x);

        let top = lut_at(tx0, ty0)[value] as f32 * (1.0 - wx) + lut_at(tx1, ty0)[value] as f32 * wx;
        let bottom =
            lut_at(tx0, ty1)[value] as f32 * (1.0 - wx) + lut_at(tx1, ty1)[value] as f32 * wx;
        let mapped = top * (1.0 - wy) + bottom * wy;
        Luma([mapped.round().clamp(0.0, 255.0) as u8])
    })
}

/// reflect-101 边界映射：`-1 -> 1`，`len -> len - 2`，不重复边缘像素。
pub(crate) fn reflect_101(pos: i64, len: u32) -> u32 {
    let len = len as i64;
    if len <= 1 {
        return 0;
    }
    let mut p = pos;
    while p < 0 || p >= len {
        p = if p < 0 { -p } else { 2 * len - p - 2 };
    }
    p as u32
}

/// 返回插值所需的两个相邻子块下标以及靠后者的权重。
fn neighbours(pos: f32, tiles: u32) -> (u32, u32, f32) {
    let floor = pos.floor();
    let weight = pos - floor;
    let lower = floor as i64;
    let clamp = |i: i64| i.clamp(0, tiles as i64 - 1) as u32;
    (clamp(lower), clamp(lower + 1), weight)
}

/// 计算单个子块的裁剪直方图映射表；越界坐标经 reflect-101 映射回图像内。
fn tile_lut(image: &GrayImage, origin: (u32, u32), size: (u32, u32), clip_limit: f32) -> [u8; BINS] {
    let (width, height) = image.dimensions();
    let mut hist = [0u32; BINS];
    for dy in 0..size.1 {
        let y = reflect_101((origin.1 + dy) as i64, height);
        for dx in 0..size.0 {
            let x = reflect_101((origin.0 + dx) as i64, width);
            hist[image.get_pixel(x, y)[0] as usize] += 1;
        }
    }
    let area = size.0 * size.1;

    if clip_limit > 0.0 {
        let clip = ((clip_limit * area as f32 / BINS as f32) as u32).max(1);
        clip_histogram(&mut hist, clip);
    }

    let scale = 255.0 / area as f32;
    let mut lut = [0u8; BINS];
    let mut cdf = 0u32;
    for (bin, count) in hist.iter().enumerate() {
        cdf += count;
        lut[bin] = (cdf as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// 将超出 `clip` 的计数截断后均匀回填到所有灰度级，余数按固定步长分配。
fn clip_histogram(hist: &mut [u32; BINS], clip: u32) {
    let mut excess = 0u32;
    for count in hist.iter_mut() {
        if *count > clip {
            excess += *count - clip;
            *count = clip;
        }
    }

    let batch = excess / BINS as u32;
    let residual = (excess % BINS as u32) as usize;
    for count in hist.iter_mut() {
        *count += batch;
    }
    if residual > 0 {
        let step = (BINS / residual).max(1);
        for bin in (0..BINS).step_by(step).take(residual) {
            hist[bin] += 1;
        }
    }
}
