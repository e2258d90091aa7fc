//! # screengate-text
//!
//! 텍스트 변경 게이트키퍼 크레이트.
//! 인식된 텍스트 영역마다 번역을 다시 돌릴 만큼 바뀌었는지 판정한다.
//!
//! ## 구조
//!
//! - [`normalize`] — 태그 제거, 전각→반각, 끝 장식 문자 정리
//! - [`levenshtein`] — 두 행 롤링 버퍼 편집 거리
//! - [`threshold`] — 길이/신뢰도/히트맵 기반 적응형 임계값
//! - [`reveal`] — 소스별 점진 표시/정적 UI 상태 기계
//! - [`text_gate`] — 게이트키퍼 본체

pub mod levenshtein;
pub mod normalize;
pub mod reveal;
pub mod text_gate;
pub mod threshold;
