//! screengate 도메인 모델.
//!
//! 게이트 입출력, 세션 저장소 항목, 통계 스냅샷을 정의한다.
//! 외부로 나가는 모델은 `serde` Serialize/Deserialize를 구현한다.

pub mod frame;
pub mod recognition;
pub mod telemetry;
pub mod text;
