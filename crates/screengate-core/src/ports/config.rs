//! 설정 제공자 포트.
//!
//! 게이트는 호출마다 현재 설정을 조회하므로 핫 리로드가 즉시 반영된다.

use std::sync::Arc;

use crate::config::GateConfig;

/// 설정 제공자
pub trait ConfigProvider: Send + Sync {
    /// 현재 유효 설정
    fn current(&self) -> Arc<GateConfig>;
}

/// 고정 설정 제공자 (테스트, 임베딩용)
#[derive(Debug, Clone, Default)]
pub struct StaticConfigProvider {
    config: Arc<GateConfig>,
}

impl StaticConfigProvider {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn current(&self) -> Arc<GateConfig> {
        Arc::clone(&self.config)
    }
}
