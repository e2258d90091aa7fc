//! 해상도 기반 이미지 유형 분류.
//!
//! 해시 알고리즘 선택에만 쓰이므로 픽셀을 읽지 않는다.

use image::DynamicImage;
use screengate_core::models::frame::ImageTypeClass;
use screengate_core::ports::classifier::ImageClassifier;

/// 전체 화면 장면으로 볼 최소 해상도
const FULL_SCENE_MIN: (u32, u32) = (1280, 720);

/// 작은 UI 요소로 볼 최대 긴 변 길이
const SMALL_ELEMENT_MAX_EDGE: u32 = 256;

/// 해상도 휴리스틱 분류기
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolutionClassifier;

impl ResolutionClassifier {
    pub fn classify(width: u32, height: u32) -> ImageTypeClass {
        if width == 0 || height == 0 {
            ImageTypeClass::Unknown
        } else if width >= FULL_SCENE_MIN.0 && height >= FULL_SCENE_MIN.1 {
            ImageTypeClass::FullScene
        } else if width.max(height) <= SMALL_ELEMENT_MAX_EDGE {
            ImageTypeClass::SmallUiElement
        } else {
            ImageTypeClass::GeneralUi
        }
    }
}

impl ImageClassifier for ResolutionClassifier {
    fn detect_image_type(&self, image: &DynamicImage) -> ImageTypeClass {
        Self::classify(image.width(), image.height())
    }
}
