//! 텍스트 인식 단계 포트.
//!
//! 이미지 게이트가 변경으로 판정한 프레임만 전달된다.

use async_trait::async_trait;
use image::DynamicImage;

use crate::error::CoreError;
use crate::models::recognition::RecognizedRegion;

/// 텍스트 인식기 (OCR 엔진 어댑터)
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// 프레임에서 소스별 텍스트 영역 추출
    async fn recognize(
        &self,
        context_id: &str,
        frame: &DynamicImage,
    ) -> Result<Vec<RecognizedRegion>, CoreError>;

    /// 인식기 이름 (로그용)
    fn provider_name(&self) -> &str;
}
