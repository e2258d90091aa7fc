//! # screengate-core
//!
//! screengate 도메인 모델, 포트(trait) 정의, 에러 타입, 세션 상태 저장소.
//! 이미지/텍스트 게이트 crate와 앱 crate가 공유하는 핵심 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`models`] — 게이트 입출력 데이터 구조체 (serde Serialize/Deserialize)
//! - [`ports`] — Hexagonal Architecture 포트 인터페이스
//! - [`error`] — 핵심 에러 타입 (thiserror)
//! - [`config`] — 게이트 설정 구조체
//! - [`config_manager`] — 설정 파일 관리 (로드/저장/핫 리로드)
//! - [`session`] — 세션 범위 상태 핸들 (지문, 이력, 상태 기계, 통계)
//! - [`store`] — 샤딩된 키 단위 동시성 맵
//! - [`stats`] — 원자 카운터 + 이동 창 통계 수집기

pub mod config;
pub mod config_manager;
pub mod error;
pub mod models;
pub mod ports;
pub mod session;
pub mod stats;
pub mod store;
