//! 적응형 편집 거리 임계값.
//!
//! 길이 구간별 기본값에 OCR 신뢰도와 히트맵 배율을 곱한 뒤 [0,1]로 고정한다.
//! - 고신뢰도: 완화 (더 큰 변화 요구)
//! - 히트맵 활성 영역: 민감, 비활성 영역: 완화

use screengate_core::config::{clamp_unit, TextGateConfig};

/// 임계값 계산 정책
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdPolicy {
    short_max_len: usize,
    long_min_len: usize,
    short: f32,
    medium: f32,
    long: f32,
    high_confidence_level: f32,
    high_confidence_multiplier: f32,
    heatmap_high_level: f32,
    heatmap_high_multiplier: f32,
    heatmap_low_level: f32,
    heatmap_low_multiplier: f32,
}

impl ThresholdPolicy {
    pub fn from_config(config: &TextGateConfig) -> Self {
        Self {
            short_max_len: config.short_text_max_len,
            long_min_len: config.long_text_min_len,
            short: config.short_text_threshold,
            medium: config.medium_text_threshold,
            long: config.long_text_threshold,
            high_confidence_level: config.high_confidence_level,
            high_confidence_multiplier: config.high_confidence_multiplier,
            heatmap_high_level: config.heatmap_high_level,
            heatmap_high_multiplier: config.heatmap_high_multiplier,
            heatmap_low_level: config.heatmap_low_level,
            heatmap_low_multiplier: config.heatmap_low_multiplier,
        }
    }

    /// 길이 구간 기본값
    pub fn base_threshold(&self, text_len: usize) -> f32 {
        if text_len <= self.short_max_len {
            self.short
        } else if text_len >= self.long_min_len {
            self.long
        } else {
            self.medium
        }
    }

    /// 최종 임계값. NaN 보조 값은 없는 것으로 본다
    pub fn resolve(&self, text_len: usize, confidence: Option<f32>, heatmap: Option<f32>) -> f32 {
        let mut threshold = self.base_threshold(text_len);

        if let Some(confidence) = confidence.filter(|c| !c.is_nan()) {
            if confidence >= self.high_confidence_level {
                threshold *= self.high_confidence_multiplier;
            }
        }

        if let Some(heat) = heatmap.filter(|h| !h.is_nan()) {
            if heat >= self.heatmap_high_level {
                threshold *= self.heatmap_high_multiplier;
            } else if heat <= self.heatmap_low_level {
                threshold *= self.heatmap_low_multiplier;
            }
        }

        clamp_unit(threshold)
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::from_config(&TextGateConfig::default())
    }
}
