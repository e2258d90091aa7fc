//! 인식(OCR) 결과 모델.
//!
//! 인식 단계가 반환하는 영역 단위 텍스트. 게이트키퍼 입력으로 변환된다.

use serde::{Deserialize, Serialize};

use super::frame::Rect;
use super::text::TextRegionInfo;

/// 인식된 텍스트 영역
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedRegion {
    /// 텍스트 소스 식별자 (영역/말풍선 단위)
    pub source_id: String,
    /// 인식된 텍스트
    pub text: String,
    /// 인식 신뢰도 (0.0 ~ 1.0)
    pub confidence: f32,
    /// 바운딩 박스
    pub bounding_box: Rect,
    /// 공간 히트맵 값
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heatmap: Option<f32>,
    /// 제외 영역 여부
    #[serde(default)]
    pub excluded: bool,
}

impl RecognizedRegion {
    /// 텍스트 게이트 보조 정보로 변환
    pub fn region_info(&self) -> TextRegionInfo {
        TextRegionInfo {
            is_in_exclusion_zone: self.excluded,
            confidence_score: Some(self.confidence),
            heatmap_value: self.heatmap,
        }
    }
}
