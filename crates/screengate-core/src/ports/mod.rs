//! 포트 인터페이스 (trait).
//!
//! Hexagonal Architecture의 포트 레이어.
//! 해시/분류기는 게이트가 동기적으로 호출하는 CPU 바운드 협력자이고,
//! 인식/번역은 `screengate-app`에서 `Arc<dyn T>`로 와이어링하는 비동기 하위 단계다.

pub mod classifier;
pub mod config;
pub mod hashing;
pub mod recognition;
pub mod telemetry;
pub mod translation;
