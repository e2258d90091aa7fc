//! 프레임 변경 판정 모델.
//!
//! 이미지 캐스케이드가 소비/생산하는 지문, 판정 결과, 영역 좌표 등을 정의.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::clamp_unit;

/// 직사각형 영역 (변경 셀, 호출자 지정 후보 영역)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// 면적 0 여부
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// `width x height` 경계 안으로 잘라낸 영역. 완전히 벗어나면 `None`
    pub fn clipped_to(&self, width: u32, height: u32) -> Option<Rect> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = self.w.min(width - self.x);
        let h = self.h.min(height - self.y);
        let clipped = Rect::new(self.x, self.y, w, h);
        (!clipped.is_empty()).then_some(clipped)
    }
}

/// 해시 알고리즘 선택용 이미지 유형 (해상도 기반 휴리스틱)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageTypeClass {
    /// 전체 화면 장면 (게임/영상)
    FullScene,
    /// 작은 UI 요소 (버튼, 말풍선 등)
    SmallUiElement,
    /// 일반 UI 창
    GeneralUi,
    /// 판별 불가 (면적 0 등)
    Unknown,
}

/// 지각 해시 알고리즘 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// 평균 해시 — 8x8 평균 대비 밝기
    Average,
    /// 차분 해시 — 9x8 인접 픽셀 기울기
    Difference,
    /// DCT 지각 해시 — 32x32 DCT 저주파 성분
    Perceptual,
}

impl HashAlgorithm {
    /// 해시 비트 폭
    pub const BITS: u32 = 64;

    /// Stage 1에서 피해야 하는 고비용 알고리즘인지
    pub fn is_expensive(&self) -> bool {
        matches!(self, Self::Perceptual)
    }
}

/// 캐스케이드 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CascadeStage {
    /// Stage 1 — 저비용 해시 유사도
    QuickFilter,
    /// Stage 2 — 유형별 최적 해시 + 해밍 거리
    MediumPrecision,
    /// Stage 3 — SSIM + 그리드 영역 추정
    HighPrecision,
}

impl CascadeStage {
    /// 1부터 시작하는 단계 번호
    pub fn number(&self) -> u8 {
        match self {
            Self::QuickFilter => 1,
            Self::MediumPrecision => 2,
            Self::HighPrecision => 3,
        }
    }

    /// 통계 배열 인덱스 (0..3)
    pub fn index(&self) -> usize {
        self.number() as usize - 1
    }
}

/// 컨텍스트별 최신 해시 지문.
///
/// 세션 저장소에서 `(context_id, stage, algorithm)` 키당 하나만 유지되며 매 호출마다 덮어쓴다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameFingerprint {
    pub context_id: String,
    pub algorithm: HashAlgorithm,
    pub hash_value: u64,
    pub captured_at: DateTime<Utc>,
}

/// 지문 캐시 키
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FingerprintKey {
    pub context_id: String,
    pub stage: CascadeStage,
    pub algorithm: HashAlgorithm,
}

impl FingerprintKey {
    pub fn new(context_id: &str, stage: CascadeStage, algorithm: HashAlgorithm) -> Self {
        Self {
            context_id: context_id.to_string(),
            stage,
            algorithm,
        }
    }
}

/// 이미지 게이트 1회 호출의 불변 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageChangeDecision {
    /// 인식 단계로 넘길지 여부
    pub has_changed: bool,
    /// 변경 비율 (0.0 ~ 1.0)
    pub change_percentage: f32,
    /// 판정이 내려진 단계
    pub stage: CascadeStage,
    /// Stage 3 SSIM 점수 (Stage 3까지 간 경우)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssim_score: Option<f32>,
    /// 변경 후보 그리드 셀 (근사 위치)
    #[serde(default)]
    pub changed_regions: Vec<Rect>,
    /// 게이트 처리 시간
    pub processing_time: Duration,
    /// 마지막으로 사용한 해시 알고리즘
    pub algorithm_used: HashAlgorithm,
    /// 비교 대상 이전 해시 (없으면 첫 관측)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<u64>,
    /// 현재 프레임 해시
    pub current_hash: u64,
    /// 컨텍스트의 첫 관측 여부
    #[serde(default)]
    pub is_first_observation: bool,
    /// 계산 실패로 인한 fail-open 판정 여부
    #[serde(default)]
    pub failed_open: bool,
}

impl ImageChangeDecision {
    /// 이전 이미지가 없는 첫 관측 — 항상 변경으로 간주
    pub fn first_time(algorithm: HashAlgorithm, current_hash: u64) -> Self {
        Self {
            has_changed: true,
            change_percentage: 1.0,
            stage: CascadeStage::QuickFilter,
            ssim_score: None,
            changed_regions: Vec::new(),
            processing_time: Duration::ZERO,
            algorithm_used: algorithm,
            previous_hash: None,
            current_hash,
            is_first_observation: true,
            failed_open: false,
        }
    }

    /// 특정 단계에서 내린 판정
    pub fn at_stage(
        stage: CascadeStage,
        has_changed: bool,
        change_percentage: f32,
        algorithm: HashAlgorithm,
        previous_hash: Option<u64>,
        current_hash: u64,
    ) -> Self {
        Self {
            has_changed,
            change_percentage: clamp_unit(change_percentage),
            stage,
            ssim_score: None,
            changed_regions: Vec::new(),
            processing_time: Duration::ZERO,
            algorithm_used: algorithm,
            previous_hash,
            current_hash,
            is_first_observation: false,
            failed_open: false,
        }
    }

    /// 계산 실패 시 변경으로 간주하는 판정
    pub fn fail_open(stage: CascadeStage, algorithm: HashAlgorithm, current_hash: u64) -> Self {
        Self {
            failed_open: true,
            ..Self::at_stage(stage, true, 1.0, algorithm, None, current_hash)
        }
    }

    /// SSIM 점수를 채운 새 판정
    pub fn with_ssim(self, ssim: f32) -> Self {
        Self {
            ssim_score: Some(clamp_unit(ssim)),
            ..self
        }
    }

    /// 변경 셀 목록을 채운 새 판정
    pub fn with_regions(self, changed_regions: Vec<Rect>) -> Self {
        Self {
            changed_regions,
            ..self
        }
    }

    /// 처리 시간을 채운 새 판정
    pub fn with_processing_time(self, processing_time: Duration) -> Self {
        Self {
            processing_time,
            ..self
        }
    }
}

/// `detect_region_changes` 영역별 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionChange {
    /// 호출자가 넘긴 영역 (이미지 경계로 잘린 값)
    pub region: Rect,
    /// 영역 SSIM
    pub ssim_score: f32,
    /// 임계값 미만이면 변경
    pub has_changed: bool,
}
