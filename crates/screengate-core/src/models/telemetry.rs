//! 텔레메트리 모델.
//!
//! 게이트 통계 스냅샷. 튜닝/관측용으로 `TelemetrySink`에 전달된다.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 이미지 게이트 통계 스냅샷
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameGateStatistics {
    /// 처리한 전체 프레임 수
    pub total_frames: u64,
    /// Stage 1에서 걸러진 프레임 수
    pub stage1_filtered: u64,
    /// Stage 2에서 걸러진 프레임 수
    pub stage2_filtered: u64,
    /// Stage 3에서 걸러진 프레임 수
    pub stage3_filtered: u64,
    /// 변경으로 판정된 프레임 수 (첫 관측 포함)
    pub changed_frames: u64,
    /// 첫 관측 프레임 수
    pub first_frames: u64,
    /// fail-open 판정 수
    pub fail_open_count: u64,
    /// 단계별 평균 지연 (밀리초, 최근 창 기준)
    pub avg_stage_ms: [f64; 3],
    /// 인식 단계로 넘어가지 않은 비율
    pub filtering_efficiency: f64,
    /// Stage 1 지문 캐시 적중률 (근사)
    pub cache_hit_rate: f64,
    /// 현재 캐시된 지문 수
    pub cached_fingerprints: usize,
}

/// 텍스트 게이트 통계 스냅샷
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextGateStatistics {
    /// 전체 판정 수
    pub total_checks: u64,
    /// 번역 허용 수
    pub translations: u64,
    /// 사유별 판정 수
    pub decisions_by_reason: BTreeMap<String, u64>,
    /// 정적 UI로 고정된 소스 수
    pub static_sources: usize,
    /// 점진 표시 추적 중인 소스 수
    pub active_reveals: usize,
    /// 이력 보유 소스 수
    pub tracked_sources: usize,
    /// 평균 판정 시간 (마이크로초, 최근 창 기준)
    pub avg_check_us: f64,
}
