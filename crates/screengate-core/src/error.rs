//! screengate 핵심 에러 타입.
//!
//! 모든 게이트 crate는 이 타입을 그대로 반환한다.
//! `Compute` 에러는 게이트 내부에서 흡수되어 fail-open 판정으로 강등되고,
//! 나머지는 호출자에게 그대로 전파된다.

use thiserror::Error;

/// 코어 레이어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 필수 입력 누락/불량 (호출자 버그, 재시도 불가)
    #[error("잘못된 입력 — {field}: {message}")]
    InvalidInput {
        /// 문제가 된 인자명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 해시/SSIM/편집 거리 계산 실패 (일시적)
    #[error("계산 에러: {0}")]
    Compute(String),

    /// 취소 토큰에 의해 중단됨
    #[error("작업 취소됨")]
    Cancelled,

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 이미 폐기된 세션에 대한 호출
    #[error("세션이 이미 폐기됨")]
    SessionDisposed,

    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// `InvalidInput` 생성 헬퍼
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 게이트가 흡수해 fail-open으로 처리해야 하는 에러인지 여부
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Compute(_))
    }
}
