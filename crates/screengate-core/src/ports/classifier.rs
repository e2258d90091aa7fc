//! 이미지 유형 분류기 포트.
//!
//! 해시 알고리즘 선택에만 쓰이는 저비용 휴리스틱.

use image::DynamicImage;

use crate::models::frame::ImageTypeClass;

/// 이미지 유형 분류기
pub trait ImageClassifier: Send + Sync {
    fn detect_image_type(&self, image: &DynamicImage) -> ImageTypeClass;
}
