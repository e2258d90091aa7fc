//! 지각 해시 / SSIM 계산기.
//!
//! 세 가지 64비트 해시는 image_hasher로 계산한다.
//! - 평균 해시: 8x8 축소 후 평균보다 밝은 칸에 비트 (`HashAlg::Mean`)
//! - 차분 해시: 9x8 축소 후 가로 인접 칸의 밝기 기울기 (`HashAlg::Gradient`)
//! - DCT 지각 해시: DCT 전처리 후 저주파 8x8 성분의 평균 비교
//!
//! 입력은 fast_image_resize로 작은 휘도 이미지로 먼저 줄인 뒤 해시한다.
//! SSIM은 축소된 휘도 샘플 위에서 image-compare의 MSSIM(8x8 창)으로 계산한다.

use image::DynamicImage;
use image_compare::Algorithm;
use image_hasher::{HashAlg, Hasher, HasherConfig};
use screengate_core::config::clamp_unit;
use screengate_core::error::CoreError;
use screengate_core::models::frame::{HashAlgorithm, ImageTypeClass};
use screengate_core::ports::hashing::PerceptualHasher;
use std::fmt;

use crate::downscale::{luma_samples, sample_dims};

/// 해시 전 사전 축소 크기
const HASH_PRESHRINK: u32 = 64;

/// 해시 한 변 비트 수 (8x8 = 64비트)
const HASH_EDGE: u32 = 8;

/// SSIM 샘플 긴 변 최소값 (MSSIM 창 크기)
const MIN_SSIM_EDGE: u32 = 8;

/// 지각 해시 계산기
pub struct BlockHasher {
    average: Hasher,
    difference: Hasher,
    perceptual: Hasher,
}

impl BlockHasher {
    pub fn new() -> Self {
        Self {
            average: build_hasher(HashAlg::Mean, false),
            difference: build_hasher(HashAlg::Gradient, false),
            perceptual: build_hasher(HashAlg::Mean, true),
        }
    }

    fn hasher(&self, algorithm: HashAlgorithm) -> &Hasher {
        match algorithm {
            HashAlgorithm::Average => &self.average,
            HashAlgorithm::Difference => &self.difference,
            HashAlgorithm::Perceptual => &self.perceptual,
        }
    }
}

fn build_hasher(alg: HashAlg, dct: bool) -> Hasher {
    let config = HasherConfig::new()
        .hash_size(HASH_EDGE, HASH_EDGE)
        .hash_alg(alg);
    if dct {
        config.preproc_dct().to_hasher()
    } else {
        config.to_hasher()
    }
}

impl Default for BlockHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BlockHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockHasher")
            .field("hash_bits", &HashAlgorithm::BITS)
            .finish_non_exhaustive()
    }
}

impl PerceptualHasher for BlockHasher {
    fn compute_hash(&self, image: &DynamicImage, algorithm: HashAlgorithm) -> Result<u64, CoreError> {
        let sample = DynamicImage::ImageLuma8(luma_samples(image, HASH_PRESHRINK, HASH_PRESHRINK)?);
        let hash = self.hasher(algorithm).hash_image(&sample);
        let bytes: [u8; 8] = hash.as_bytes().try_into().map_err(|_| {
            CoreError::Compute(format!(
                "{algorithm:?} 해시 길이 불일치: {}바이트",
                hash.as_bytes().len()
            ))
        })?;
        Ok(u64::from_le_bytes(bytes))
    }

    fn calculate_ssim(
        &self,
        a: &DynamicImage,
        b: &DynamicImage,
        sample_edge: u32,
    ) -> Result<f32, CoreError> {
        let (w, h) = sample_dims(a.width(), a.height(), sample_edge.max(MIN_SSIM_EDGE));
        let gray_a = luma_samples(a, w, h)?;
        let gray_b = luma_samples(b, w, h)?;
        let similarity =
            image_compare::gray_similarity_structure(&Algorithm::MSSIMSimple, &gray_a, &gray_b)
                .map_err(|e| CoreError::Compute(format!("SSIM 계산 실패: {e}")))?;
        Ok(clamp_unit(similarity.score as f32))
    }

    fn optimal_algorithm(&self, class: ImageTypeClass) -> HashAlgorithm {
        match class {
            ImageTypeClass::GeneralUi | ImageTypeClass::SmallUiElement => HashAlgorithm::Difference,
            ImageTypeClass::FullScene => HashAlgorithm::Perceptual,
            ImageTypeClass::Unknown => HashAlgorithm::Average,
        }
    }
}
