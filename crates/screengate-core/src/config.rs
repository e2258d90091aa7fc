//! 게이트 설정 구조체.
//!
//! 이미지 캐스케이드 임계값, 텍스트 게이트키퍼 튜닝 값, 캐시 힌트, 통계 창 크기를 정의한다.
//! `ConfigManager`(JSON 파일) 또는 바이너리의 `config` crate 레이어링으로 로드.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// 최상위 게이트 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// 이미지 변경 게이트 설정
    #[serde(default)]
    pub frame: FrameGateConfig,
    /// 텍스트 변경 게이트 설정
    #[serde(default)]
    pub text: TextGateConfig,
    /// 세션 캐시 설정
    #[serde(default)]
    pub cache: CacheConfig,
    /// 통계 설정
    #[serde(default)]
    pub statistics: StatisticsConfig,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

// ============================================================
// 이미지 게이트 설정
// ============================================================

/// 3단계 이미지 캐스케이드 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameGateConfig {
    /// Stage 1 유사도 임계값 — 유사도가 이보다 낮으면 잠재적 변경
    #[serde(default = "default_stage1_threshold")]
    pub stage1_threshold: f32,
    /// Stage 2 정규화 해밍 거리 임계값 — 이 이상이면 변경
    #[serde(default = "default_stage2_threshold")]
    pub stage2_threshold: f32,
    /// Stage 3 SSIM 임계값 — SSIM이 이보다 낮으면 변경
    #[serde(default = "default_stage3_threshold")]
    pub stage3_threshold: f32,
    /// 영역 단위 SSIM 임계값 (`detect_region_changes`)
    #[serde(default = "default_region_ssim_threshold")]
    pub region_ssim_threshold: f32,
    /// 변경 영역 추정 그리드 행 수
    #[serde(default = "default_grid_size")]
    pub grid_rows: u32,
    /// 변경 영역 추정 그리드 열 수
    #[serde(default = "default_grid_size")]
    pub grid_cols: u32,
    /// 보고할 최대 변경 셀 수
    #[serde(default = "default_max_changed_regions")]
    pub max_changed_regions: usize,
    /// SSIM 계산용 휘도 샘플 한 변 길이 (픽셀)
    #[serde(default = "default_ssim_sample_size")]
    pub ssim_sample_size: u32,
}

impl Default for FrameGateConfig {
    fn default() -> Self {
        Self {
            stage1_threshold: default_stage1_threshold(),
            stage2_threshold: default_stage2_threshold(),
            stage3_threshold: default_stage3_threshold(),
            region_ssim_threshold: default_region_ssim_threshold(),
            grid_rows: default_grid_size(),
            grid_cols: default_grid_size(),
            max_changed_regions: default_max_changed_regions(),
            ssim_sample_size: default_ssim_sample_size(),
        }
    }
}

// ============================================================
// 텍스트 게이트 설정
// ============================================================

/// 텍스트 게이트키퍼 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextGateConfig {
    /// 최소 문자 수 (정규화 후, 미만이면 스킵)
    #[serde(default = "default_min_text_length")]
    pub min_text_length: usize,
    /// 소스별 첫 텍스트는 항상 번역
    #[serde(default = "default_true")]
    pub always_translate_first_text: bool,
    /// 타자기(점진 표시) 효과 감지 활성화
    #[serde(default = "default_true")]
    pub reveal_detection: bool,
    /// 점진 표시 최대 대기 성장 횟수 — 초과 시 강제 번역
    #[serde(default = "default_reveal_max_delay_cycles")]
    pub reveal_max_delay_cycles: u32,
    /// 점진 표시 완료로 간주할 연속 안정 관측 수
    #[serde(default = "default_reveal_stabilization_cycles")]
    pub reveal_stabilization_cycles: u32,
    /// 정적 UI 감지 활성화
    #[serde(default = "default_true")]
    pub static_ui_detection: bool,
    /// 정적 UI로 등록할 연속 동일 관측 수
    #[serde(default = "default_static_ui_threshold")]
    pub static_ui_threshold: u32,
    /// 길이 변화율이 이 값을 넘으면 편집 거리 없이 강제 번역
    #[serde(default = "default_length_change_force_ratio")]
    pub length_change_force_ratio: f32,
    /// 짧은 텍스트 상한 (문자 수, 이하)
    #[serde(default = "default_short_text_max_len")]
    pub short_text_max_len: usize,
    /// 긴 텍스트 하한 (문자 수, 이상)
    #[serde(default = "default_long_text_min_len")]
    pub long_text_min_len: usize,
    /// 짧은 텍스트 기본 임계값
    #[serde(default = "default_short_text_threshold")]
    pub short_text_threshold: f32,
    /// 중간 텍스트 기본 임계값
    #[serde(default = "default_medium_text_threshold")]
    pub medium_text_threshold: f32,
    /// 긴 텍스트 기본 임계값
    #[serde(default = "default_long_text_threshold")]
    pub long_text_threshold: f32,
    /// 고신뢰도로 판단할 OCR 신뢰도 하한
    #[serde(default = "default_high_confidence_level")]
    pub high_confidence_level: f32,
    /// 고신뢰도 시 임계값 배율 (>1 완화)
    #[serde(default = "default_high_confidence_multiplier")]
    pub high_confidence_multiplier: f32,
    /// 히트맵 활성 영역 하한
    #[serde(default = "default_heatmap_high_level")]
    pub heatmap_high_level: f32,
    /// 히트맵 활성 영역 배율 (<1 민감)
    #[serde(default = "default_heatmap_high_multiplier")]
    pub heatmap_high_multiplier: f32,
    /// 히트맵 비활성 영역 상한
    #[serde(default = "default_heatmap_low_level")]
    pub heatmap_low_level: f32,
    /// 히트맵 비활성 영역 배율 (>1 완화)
    #[serde(default = "default_heatmap_low_multiplier")]
    pub heatmap_low_multiplier: f32,
    /// 편집 거리 계산 허용 최대 문자 수 — 초과 시 계산 에러(fail-open)
    #[serde(default = "default_max_edit_distance_len")]
    pub max_edit_distance_len: usize,
}

impl Default for TextGateConfig {
    fn default() -> Self {
        Self {
            min_text_length: default_min_text_length(),
            always_translate_first_text: true,
            reveal_detection: true,
            reveal_max_delay_cycles: default_reveal_max_delay_cycles(),
            reveal_stabilization_cycles: default_reveal_stabilization_cycles(),
            static_ui_detection: true,
            static_ui_threshold: default_static_ui_threshold(),
            length_change_force_ratio: default_length_change_force_ratio(),
            short_text_max_len: default_short_text_max_len(),
            long_text_min_len: default_long_text_min_len(),
            short_text_threshold: default_short_text_threshold(),
            medium_text_threshold: default_medium_text_threshold(),
            long_text_threshold: default_long_text_threshold(),
            high_confidence_level: default_high_confidence_level(),
            high_confidence_multiplier: default_high_confidence_multiplier(),
            heatmap_high_level: default_heatmap_high_level(),
            heatmap_high_multiplier: default_heatmap_high_multiplier(),
            heatmap_low_level: default_heatmap_low_level(),
            heatmap_low_multiplier: default_heatmap_low_multiplier(),
            max_edit_distance_len: default_max_edit_distance_len(),
        }
    }
}

// ============================================================
// 캐시 / 통계 설정
// ============================================================

/// 세션 캐시 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// 항목 만료 시간 (분, 0 = 만료 없음). 접근 시점에 지연 검사
    #[serde(default = "default_cache_expiration_minutes")]
    pub expiration_minutes: u64,
    /// 저장소별 항목 수 힌트 — 초과 시 만료 항목 정리
    #[serde(default = "default_max_entries_hint")]
    pub max_entries_hint: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expiration_minutes: default_cache_expiration_minutes(),
            max_entries_hint: default_max_entries_hint(),
        }
    }
}

impl CacheConfig {
    /// 만료 시간 (0이면 `None`)
    pub fn ttl(&self) -> Option<chrono::Duration> {
        if self.expiration_minutes == 0 {
            return None;
        }
        // chrono::Duration 범위 안으로 제한
        let minutes = self.expiration_minutes.min(i64::MAX as u64 / 60_000) as i64;
        Some(chrono::Duration::minutes(minutes))
    }
}

/// 통계 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsConfig {
    /// 단계별 지연 시간 이동 창 크기 (샘플 수)
    #[serde(default = "default_timing_window")]
    pub timing_window: usize,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            timing_window: default_timing_window(),
        }
    }
}

// ============================================================
// GateConfig impl
// ============================================================

impl GateConfig {
    /// 기본 설정값 반환
    pub fn default_config() -> Self {
        Self {
            frame: FrameGateConfig::default(),
            text: TextGateConfig::default(),
            cache: CacheConfig::default(),
            statistics: StatisticsConfig::default(),
        }
    }

    /// 캐시 만료 시간 (0이면 `None`)
    pub fn cache_expiration(&self) -> Option<chrono::Duration> {
        self.cache.ttl()
    }

    /// 임계값을 [0,1]로 고정하고 구조적으로 잘못된 값은 거부한다.
    pub fn validated(mut self) -> Result<Self, CoreError> {
        let f = &mut self.frame;
        f.stage1_threshold = clamp_unit(f.stage1_threshold);
        f.stage2_threshold = clamp_unit(f.stage2_threshold);
        f.stage3_threshold = clamp_unit(f.stage3_threshold);
        f.region_ssim_threshold = clamp_unit(f.region_ssim_threshold);
        if f.grid_rows == 0 || f.grid_cols == 0 {
            return Err(CoreError::Config(format!(
                "그리드 크기는 0일 수 없음: {}x{}",
                f.grid_rows, f.grid_cols
            )));
        }
        if f.ssim_sample_size < 8 {
            return Err(CoreError::Config(format!(
                "SSIM 샘플 크기가 너무 작음: {}",
                f.ssim_sample_size
            )));
        }

        let t = &mut self.text;
        t.length_change_force_ratio = clamp_unit(t.length_change_force_ratio);
        t.short_text_threshold = clamp_unit(t.short_text_threshold);
        t.medium_text_threshold = clamp_unit(t.medium_text_threshold);
        t.long_text_threshold = clamp_unit(t.long_text_threshold);
        t.high_confidence_level = clamp_unit(t.high_confidence_level);
        t.heatmap_high_level = clamp_unit(t.heatmap_high_level);
        t.heatmap_low_level = clamp_unit(t.heatmap_low_level);
        if t.reveal_stabilization_cycles == 0 {
            return Err(CoreError::Config(
                "reveal_stabilization_cycles는 1 이상이어야 함".to_string(),
            ));
        }
        if t.static_ui_threshold < 2 {
            return Err(CoreError::Config(
                "static_ui_threshold는 2 이상이어야 함".to_string(),
            ));
        }
        if t.short_text_max_len >= t.long_text_min_len {
            return Err(CoreError::Config(format!(
                "짧은 텍스트 상한({})이 긴 텍스트 하한({}) 이상",
                t.short_text_max_len, t.long_text_min_len
            )));
        }
        if t.heatmap_low_level > t.heatmap_high_level {
            return Err(CoreError::Config(
                "heatmap_low_level이 heatmap_high_level보다 큼".to_string(),
            ));
        }
        for (name, value) in [
            ("high_confidence_multiplier", t.high_confidence_multiplier),
            ("heatmap_high_multiplier", t.heatmap_high_multiplier),
            ("heatmap_low_multiplier", t.heatmap_low_multiplier),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(CoreError::Config(format!("{name}는 양수여야 함: {value}")));
            }
        }
        // 활성 영역일수록 민감, 고신뢰도일수록 완화 방향만 허용
        if t.heatmap_high_multiplier > 1.0
            || t.heatmap_low_multiplier < 1.0
            || t.high_confidence_multiplier < 1.0
        {
            return Err(CoreError::Config(format!(
                "배율 방향이 잘못됨: heatmap_high={} heatmap_low={} high_confidence={}",
                t.heatmap_high_multiplier, t.heatmap_low_multiplier, t.high_confidence_multiplier
            )));
        }

        if self.statistics.timing_window == 0 {
            self.statistics.timing_window = default_timing_window();
        }

        Ok(self)
    }
}

/// NaN은 0으로, 나머지는 [0,1]로 고정
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

// ============================================================
// 기본값 함수
// ============================================================

fn default_true() -> bool {
    true
}

fn default_stage1_threshold() -> f32 {
    0.92
}

fn default_stage2_threshold() -> f32 {
    0.05
}

fn default_stage3_threshold() -> f32 {
    0.92
}

fn default_region_ssim_threshold() -> f32 {
    0.95
}

fn default_grid_size() -> u32 {
    4
}

fn default_max_changed_regions() -> usize {
    4
}

fn default_ssim_sample_size() -> u32 {
    128
}

fn default_min_text_length() -> usize {
    2
}

fn default_reveal_max_delay_cycles() -> u32 {
    10
}

fn default_reveal_stabilization_cycles() -> u32 {
    2
}

fn default_static_ui_threshold() -> u32 {
    3
}

fn default_length_change_force_ratio() -> f32 {
    0.5
}

fn default_short_text_max_len() -> usize {
    10
}

fn default_long_text_min_len() -> usize {
    50
}

fn default_short_text_threshold() -> f32 {
    0.3
}

fn default_medium_text_threshold() -> f32 {
    0.2
}

fn default_long_text_threshold() -> f32 {
    0.1
}

fn default_high_confidence_level() -> f32 {
    0.9
}

fn default_high_confidence_multiplier() -> f32 {
    1.2
}

fn default_heatmap_high_level() -> f32 {
    0.7
}

fn default_heatmap_high_multiplier() -> f32 {
    0.8
}

fn default_heatmap_low_level() -> f32 {
    0.3
}

fn default_heatmap_low_multiplier() -> f32 {
    1.2
}

fn default_max_edit_distance_len() -> usize {
    4_096
}

fn default_cache_expiration_minutes() -> u64 {
    30
}

fn default_max_entries_hint() -> usize {
    1_000
}

fn default_timing_window() -> usize {
    100
}
