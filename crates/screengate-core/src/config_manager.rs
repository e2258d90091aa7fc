//! 설정 파일 관리.
//!
//! 플랫폼별 설정 디렉토리에 JSON 파일로 게이트 설정을 저장/로드한다.
//! 파일을 읽을 수 없으면 경고를 남기고 내장 기본값으로 계속 동작한다.

use directories::ProjectDirs;
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::GateConfig;
use crate::error::CoreError;
use crate::ports::config::ConfigProvider;

/// 설정 파일 이름
const CONFIG_FILE_NAME: &str = "gate.json";

/// 설정 관리자
///
/// 설정 파일의 로드/저장 및 런타임 핫 리로드를 관리한다.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    /// 현재 설정 (스레드 안전, 조회 시 Arc 복제만 발생)
    config: Arc<RwLock<Arc<GateConfig>>>,
    /// 설정 파일 경로
    config_path: PathBuf,
}

impl ConfigManager {
    /// 플랫폼 기본 경로로 설정 관리자 생성
    pub fn new() -> Result<Self, CoreError> {
        let config_path = Self::default_config_path()?;
        Ok(Self::with_path(config_path))
    }

    /// 지정된 경로로 설정 관리자 생성.
    ///
    /// 파일이 없으면 기본 설정을 저장하고, 읽기/파싱에 실패하면 기본값으로 시작한다.
    pub fn with_path(config_path: PathBuf) -> Self {
        let config = if config_path.exists() {
            match Self::load_from_file(&config_path) {
                Ok(config) => config,
                Err(e) => {
                    warn!("설정 로드 실패, 기본값 사용: {e}");
                    GateConfig::default_config()
                }
            }
        } else {
            let default_config = GateConfig::default_config();
            match Self::save_to_file(&config_path, &default_config) {
                Ok(()) => info!("기본 설정 파일 생성: {}", config_path.display()),
                Err(e) => warn!("기본 설정 파일 생성 실패 (메모리 설정으로 계속): {e}"),
            }
            default_config
        };

        Self {
            config: Arc::new(RwLock::new(Arc::new(config))),
            config_path,
        }
    }

    /// 현재 설정 반환 (복제본)
    pub fn get(&self) -> GateConfig {
        (**self.config.read()).clone()
    }

    /// 설정 검증 후 업데이트 및 파일 저장
    pub fn update(&self, new_config: GateConfig) -> Result<(), CoreError> {
        let new_config = new_config.validated()?;
        Self::save_to_file(&self.config_path, &new_config)?;
        *self.config.write() = Arc::new(new_config);
        debug!("설정 저장 완료: {}", self.config_path.display());
        Ok(())
    }

    /// 특정 필드만 업데이트
    pub fn update_with<F>(&self, updater: F) -> Result<GateConfig, CoreError>
    where
        F: FnOnce(&mut GateConfig),
    {
        let mut config = self.get();
        updater(&mut config);
        self.update(config.clone())?;
        Ok(self.get())
    }

    /// 설정 파일 경로 반환
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// 설정 다시 로드 (핫 리로드).
    ///
    /// 실패 시 마지막으로 유효했던 설정을 유지한다.
    pub fn reload(&self) -> Result<(), CoreError> {
        match Self::load_from_file(&self.config_path) {
            Ok(config) => {
                *self.config.write() = Arc::new(config);
                info!("설정 다시 로드 완료");
                Ok(())
            }
            Err(e) => {
                warn!("설정 리로드 실패, 기존 설정 유지: {e}");
                Err(e)
            }
        }
    }

    /// 플랫폼별 기본 설정 파일 경로
    pub fn default_config_path() -> Result<PathBuf, CoreError> {
        let dirs = ProjectDirs::from("dev", "screengate", "screengate")
            .ok_or_else(|| CoreError::Config("홈 디렉토리를 찾을 수 없습니다".to_string()))?;
        Ok(dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// 파일에서 설정 로드 (검증 포함)
    fn load_from_file(path: &Path) -> Result<GateConfig, CoreError> {
        let content = fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("설정 파일 읽기 실패: {}: {}", path.display(), e))
        })?;

        let config: GateConfig = serde_json::from_str(&content).map_err(|e| {
            CoreError::Config(format!("설정 파일 파싱 실패: {}: {}", path.display(), e))
        })?;

        debug!("설정 파일 로드 완료: {}", path.display());
        config.validated()
    }

    /// 파일에 설정 저장 (상위 디렉토리 생성 포함)
    fn save_to_file(path: &Path, config: &GateConfig) -> Result<(), CoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    CoreError::Config(format!(
                        "설정 디렉토리 생성 실패: {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let content = serde_json::to_string_pretty(config)
            .map_err(|e| CoreError::Config(format!("설정 직렬화 실패: {}", e)))?;

        fs::write(path, content).map_err(|e| {
            CoreError::Config(format!("설정 파일 저장 실패: {}: {}", path.display(), e))
        })?;

        Ok(())
    }
}

impl ConfigProvider for ConfigManager {
    fn current(&self) -> Arc<GateConfig> {
        self.config.read().clone()
    }
}
