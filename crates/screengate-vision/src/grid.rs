//! 그리드 단위 변경 영역 추정.
//!
//! 프레임을 고정 그리드(기본 4x4)로 나누고 셀별 SSIM이 낮은 순으로 후보 셀을 보고한다.
//! 정확한 분할이 아니라 인식 단계에 넘길 대략적인 위치만 제공한다.

use image::DynamicImage;
use screengate_core::error::CoreError;
use screengate_core::models::frame::Rect;
use screengate_core::ports::hashing::PerceptualHasher;
use tracing::debug;

/// 셀별 SSIM 점수
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellScore {
    pub cell: Rect,
    pub ssim: f32,
}

/// `rows x cols` 그리드 셀. 마지막 행/열이 나머지 픽셀을 흡수한다
pub fn grid_cells(width: u32, height: u32, rows: u32, cols: u32) -> Vec<Rect> {
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let rows = rows.clamp(1, height);
    let cols = cols.clamp(1, width);
    let cell_w = width / cols;
    let cell_h = height / rows;

    let mut cells = Vec::with_capacity((rows * cols) as usize);
    for r in 0..rows {
        for c in 0..cols {
            let x = c * cell_w;
            let y = r * cell_h;
            let w = if c + 1 == cols { width - x } else { cell_w };
            let h = if r + 1 == rows { height - y } else { cell_h };
            cells.push(Rect::new(x, y, w, h));
        }
    }
    cells
}

/// 두 이미지에서 같은 영역을 잘라 SSIM 계산
pub fn region_ssim(
    hasher: &dyn PerceptualHasher,
    prev: &DynamicImage,
    curr: &DynamicImage,
    region: Rect,
    sample_edge: u32,
) -> Result<f32, CoreError> {
    let prev_cell = prev.crop_imm(region.x, region.y, region.w, region.h);
    let curr_cell = curr.crop_imm(region.x, region.y, region.w, region.h);
    hasher.calculate_ssim(&prev_cell, &curr_cell, sample_edge)
}

/// 변경 후보 셀 추정.
///
/// SSIM이 `threshold` 미만인 셀을 낮은 순으로 최대 `limit`개 반환한다.
/// 해상도가 다르면 프레임 전체를 하나의 영역으로 보고한다.
#[allow(clippy::too_many_arguments)]
pub fn locate_changed_cells(
    hasher: &dyn PerceptualHasher,
    prev: &DynamicImage,
    curr: &DynamicImage,
    rows: u32,
    cols: u32,
    threshold: f32,
    limit: usize,
    sample_edge: u32,
) -> Result<Vec<Rect>, CoreError> {
    let (cw, ch) = (curr.width(), curr.height());
    if prev.width() != cw || prev.height() != ch {
        return Ok(vec![Rect::new(0, 0, cw, ch)]);
    }
    if limit == 0 {
        return Ok(Vec::new());
    }

    let mut scores = grid_cells(cw, ch, rows, cols)
        .into_iter()
        .map(|cell| {
            region_ssim(hasher, prev, curr, cell, sample_edge).map(|ssim| CellScore { cell, ssim })
        })
        .collect::<Result<Vec<_>, _>>()?;
    scores.sort_by(|a, b| a.ssim.total_cmp(&b.ssim));

    let total = scores.len();
    let mut changed: Vec<Rect> = scores
        .iter()
        .take_while(|s| s.ssim < threshold)
        .take(limit)
        .map(|s| s.cell)
        .collect();

    // 전체 SSIM은 낮은데 셀 단위로는 모두 통과한 경우 가장 나쁜 셀 하나를 보고
    if changed.is_empty() {
        changed.extend(scores.first().map(|s| s.cell));
    }

    debug!("변경 후보 셀: {}/{total}", changed.len());
    Ok(changed)
}
