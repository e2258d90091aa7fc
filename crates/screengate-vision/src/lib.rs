//! # screengate-vision
//!
//! 이미지 변경 게이트 크레이트.
//! 캡처 프레임이 직전 프레임과 충분히 달라 인식(OCR)을 돌릴 가치가 있는지
//! 저비용 해시 → 정밀 해시 → SSIM 순의 3단계 캐스케이드로 판정한다.

pub mod classifier;
pub mod downscale;
pub mod frame_gate;
pub mod grid;
pub mod hasher;
