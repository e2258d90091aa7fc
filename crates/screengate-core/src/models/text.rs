//! 텍스트 변경 판정 모델.
//!
//! 게이트키퍼 입력 보조 정보, 판정 결과, 소스별 이력과 상태 기계 상태를 정의.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 인식 영역 보조 정보
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TextRegionInfo {
    /// 제외 영역 여부 (오버레이 자체, 사용자 지정 무시 영역)
    #[serde(default)]
    pub is_in_exclusion_zone: bool,
    /// OCR 신뢰도 (0.0 ~ 1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f32>,
    /// 공간 히트맵 값 (0.0 ~ 1.0, 높을수록 자주 바뀌는 영역)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heatmap_value: Option<f32>,
}

/// 텍스트 게이트 판정 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextDecisionReason {
    /// 제외 영역
    ExclusionZone,
    /// 공백 텍스트
    EmptyText,
    /// 최소 길이 미만
    TooShort,
    /// 정적 UI 마커와 일치
    StaticUi,
    /// 소스의 첫 텍스트
    FirstText,
    /// 직전과 동일
    SameText,
    /// 점진 표시 진행 중 (텍스트 성장)
    RevealGrowing,
    /// 점진 표시 안정화 대기
    RevealStabilizing,
    /// 점진 표시 완료 — 안정화 횟수 도달
    RevealCompleted,
    /// 점진 표시 최대 대기 초과 — 강제 번역
    RevealTimedOut,
    /// 길이 급변 강제 번역
    LengthChange,
    /// 편집 거리 비율이 임계값 이상
    EditDistance,
    /// 편집 거리 비율이 임계값 미만
    BelowThreshold,
    /// 계산 실패로 번역 허용
    FailOpen,
}

impl TextDecisionReason {
    /// 전체 사유 수
    pub const COUNT: usize = 14;

    /// 선언 순서의 전체 사유
    pub const ALL: [Self; Self::COUNT] = [
        Self::ExclusionZone,
        Self::EmptyText,
        Self::TooShort,
        Self::StaticUi,
        Self::FirstText,
        Self::SameText,
        Self::RevealGrowing,
        Self::RevealStabilizing,
        Self::RevealCompleted,
        Self::RevealTimedOut,
        Self::LengthChange,
        Self::EditDistance,
        Self::BelowThreshold,
        Self::FailOpen,
    ];

    /// 통계 배열 인덱스
    pub fn ordinal(&self) -> usize {
        *self as usize
    }

    /// 통계 키로 쓰는 정적 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExclusionZone => "exclusion_zone",
            Self::EmptyText => "empty_text",
            Self::TooShort => "too_short",
            Self::StaticUi => "static_ui",
            Self::FirstText => "first_text",
            Self::SameText => "same_text",
            Self::RevealGrowing => "reveal_growing",
            Self::RevealStabilizing => "reveal_stabilizing",
            Self::RevealCompleted => "reveal_completed",
            Self::RevealTimedOut => "reveal_timed_out",
            Self::LengthChange => "length_change",
            Self::EditDistance => "edit_distance",
            Self::BelowThreshold => "below_threshold",
            Self::FailOpen => "fail_open",
        }
    }
}

/// 텍스트 게이트 1회 호출 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChangeDecision {
    /// 번역 단계로 넘길지 여부
    pub should_translate: bool,
    /// 판정 사유
    pub reason: TextDecisionReason,
    /// 정규화된 현재 텍스트
    pub normalized_text: String,
    /// 편집 거리 비율 (계산한 경우)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_ratio: Option<f32>,
    /// 적용된 임계값 (계산한 경우)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
}

impl TextChangeDecision {
    pub fn translate(reason: TextDecisionReason, normalized_text: impl Into<String>) -> Self {
        Self {
            should_translate: true,
            reason,
            normalized_text: normalized_text.into(),
            change_ratio: None,
            threshold: None,
        }
    }

    pub fn skip(reason: TextDecisionReason, normalized_text: impl Into<String>) -> Self {
        Self {
            should_translate: false,
            reason,
            normalized_text: normalized_text.into(),
            change_ratio: None,
            threshold: None,
        }
    }

    /// 편집 거리 비율/임계값을 채운 새 판정
    pub fn with_ratio(self, change_ratio: f32, threshold: f32) -> Self {
        Self {
            change_ratio: Some(change_ratio),
            threshold: Some(threshold),
            ..self
        }
    }
}

/// 소스별 마지막 확정 텍스트
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextHistoryEntry {
    pub source_id: String,
    pub raw_text: String,
    pub normalized_text: String,
    pub last_confirmed_at: DateTime<Utc>,
}

/// 소스별 점진 표시/정적 UI 상태 기계 상태.
///
/// 하나의 값으로 표현되므로 점진 표시 상태와 정적 마커는 구조적으로 공존할 수 없다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourcePhase {
    /// 평상시 — 동일 텍스트 연속 관측 수 집계
    Idle { repeats: u32 },
    /// 텍스트가 접두사 확장으로 성장 중
    Growing { growth_cycles: u32 },
    /// 성장 후 동일 텍스트 반복 관측 중
    Stabilizing { growth_cycles: u32, stable_count: u32 },
    /// 정적 UI로 고정 — 마커와 같은 텍스트는 항상 스킵
    StaticLocked { marker: String },
}

impl SourcePhase {
    /// 새 이력이 시드될 때의 상태 (첫 관측 1회 포함)
    pub fn seeded() -> Self {
        Self::Idle { repeats: 1 }
    }

    /// 점진 표시 추적 중 여부
    pub fn is_revealing(&self) -> bool {
        matches!(self, Self::Growing { .. } | Self::Stabilizing { .. })
    }

    /// 정적 마커 (있으면)
    pub fn static_marker(&self) -> Option<&str> {
        match self {
            Self::StaticLocked { marker } => Some(marker),
            _ => None,
        }
    }
}

impl Default for SourcePhase {
    fn default() -> Self {
        Self::seeded()
    }
}
