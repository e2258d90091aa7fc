//! 지각 해시 서비스 포트.
//!
//! 구현: `screengate-vision::hasher::BlockHasher` (image_hasher, image-compare, fast_image_resize)

use image::DynamicImage;

use crate::error::CoreError;
use crate::models::frame::{HashAlgorithm, ImageTypeClass};

/// 지각 해시 / 구조적 유사도 계산기
pub trait PerceptualHasher: Send + Sync {
    /// 이미지의 64비트 지각 해시 계산
    fn compute_hash(&self, image: &DynamicImage, algorithm: HashAlgorithm)
        -> Result<u64, CoreError>;

    /// 두 해시의 유사도 (0.0 ~ 1.0, 1.0 = 동일)
    fn compare_hashes(&self, a: u64, b: u64, _algorithm: HashAlgorithm) -> f32 {
        1.0 - self.hamming_distance(a, b) as f32 / HashAlgorithm::BITS as f32
    }

    /// 서로 다른 비트 수
    fn hamming_distance(&self, a: u64, b: u64) -> u32 {
        (a ^ b).count_ones()
    }

    /// 두 이미지의 SSIM (0.0 ~ 1.0, 1.0 = 동일).
    ///
    /// 두 이미지는 긴 변이 `sample_edge`를 넘지 않는 휘도 샘플로 축소된 뒤 비교된다.
    fn calculate_ssim(
        &self,
        a: &DynamicImage,
        b: &DynamicImage,
        sample_edge: u32,
    ) -> Result<f32, CoreError>;

    /// 이미지 유형별 최적 알고리즘
    fn optimal_algorithm(&self, class: ImageTypeClass) -> HashAlgorithm;
}
