//! 휘도 다운스케일.
//!
//! fast_image_resize 기반 고속 축소.
//! 해시와 SSIM은 모두 축소된 8비트 휘도 이미지 위에서 계산한다.

use fast_image_resize::{images::Image as FirImage, FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, GrayImage};
use screengate_core::error::CoreError;
use tracing::trace;

/// 이미지를 `width x height` 8비트 휘도 이미지로 축소
pub fn luma_samples(image: &DynamicImage, width: u32, height: u32) -> Result<GrayImage, CoreError> {
    let (src_w, src_h) = (image.width(), image.height());

    if src_w == 0 || src_h == 0 {
        return Err(CoreError::invalid_input("image", "소스 이미지 크기 0"));
    }
    if width == 0 || height == 0 {
        return Err(CoreError::Compute(format!(
            "목표 샘플 크기 0: {width}x{height}"
        )));
    }

    let luma = image.to_luma8();

    // 동일 크기면 변환만
    if src_w == width && src_h == height {
        return Ok(luma);
    }

    let src_image = FirImage::from_vec_u8(src_w, src_h, luma.into_raw(), PixelType::U8)
        .map_err(|e| CoreError::Compute(format!("소스 휘도 평면 생성 실패: {e}")))?;

    let mut dst_image = FirImage::new(width, height, PixelType::U8);

    let mut resizer = Resizer::new();
    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));

    resizer
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| CoreError::Compute(format!("휘도 축소 실패: {e}")))?;

    trace!("휘도 축소: {src_w}x{src_h} → {width}x{height}");

    GrayImage::from_raw(width, height, dst_image.into_vec())
        .ok_or_else(|| CoreError::Compute("축소 결과 버퍼 크기 불일치".to_string()))
}

/// 긴 변이 `max_edge`를 넘지 않도록 축소한 SSIM용 샘플 크기 (종횡비 유지)
pub fn sample_dims(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_edge || longest == 0 {
        return (width.max(1), height.max(1));
    }
    let scale = max_edge as f64 / longest as f64;
    let w = ((width as f64 * scale).round() as u32).max(1);
    let h = ((height as f64 * scale).round() as u32).max(1);
    (w, h)
}
