//! 번역 단계 포트.
//!
//! 텍스트 게이트가 번역을 허용한 경우에만 호출된다.
//! 재시도/백오프는 구현체 책임이다.

use async_trait::async_trait;

use crate::error::CoreError;

/// 번역기
#[async_trait]
pub trait Translator: Send + Sync {
    /// 소스 텍스트 번역
    async fn translate(&self, source_id: &str, text: &str) -> Result<String, CoreError>;

    /// 번역기 이름 (로그용)
    fn provider_name(&self) -> &str;
}
