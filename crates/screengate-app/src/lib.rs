//! # screengate-app
//!
//! 이미지 게이트와 텍스트 게이트를 인식/번역 포트와 묶는 조립 레이어.
//!
//! ## 구조
//!
//! - [`pipeline`] — 프레임 단위 입장 제어 파이프라인
//! - [`replay`] — 디렉토리 리플레이 소스, 사이드카 인식기, 로깅 번역기
//! - [`settings`] — 기본값 / 설정 파일 / 환경 변수 레이어링
//! - [`telemetry`] — tracing 텔레메트리 싱크

pub mod pipeline;
pub mod replay;
pub mod settings;
pub mod telemetry;
