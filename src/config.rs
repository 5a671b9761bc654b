use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub drag: DragConfig,
    pub reporter: ReporterConfig,
    pub motion: MotionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DragConfig {
    /// Высота вертикальной полосы (по центру вкладки), которая считается "над полосой вкладок".
    pub attach_y_threshold: u32,
    /// Держать наготове скрытое окно размером с исходное для отсоединения.
    pub prepare_buffer_window: bool,
    /// Завершать перетаскивание, как только окно с одной вкладкой присоединилось к другому.
    pub end_drag_on_single_tab_attach: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReporterConfig {
    pub throttle_ms: u64,
    /// evdev-код клавиши отмены перетаскивания
    pub cancel_key: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MotionConfig {
    pub mode: String,
    pub step_interval_ms: u64,
    pub max_attempts: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
            filter: "tabdrag=info".to_string(),
        }
    }
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            attach_y_threshold: 50,
            prepare_buffer_window: true,
            end_drag_on_single_tab_attach: false,
        }
    }
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            throttle_ms: 4,
            cancel_key: 1,
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            mode: "auto".to_string(),
            step_interval_ms: 16,
            max_attempts: 190,
        }
    }
}

impl ReporterConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

impl MotionConfig {
    pub fn step_interval(&self) -> Duration {
        Duration::from_millis(self.step_interval_ms)
    }

    /// Разрешает `auto` в зависимости от того, умеет ли платформа анимировать перемещение окон.
    pub fn animated(&self) -> bool {
        match self.mode.as_str() {
            "animated" => true,
            "instant" => false,
            _ => cfg!(target_os = "macos"),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("TABDRAG_").split("__"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "compact" | "full" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        if self.drag.attach_y_threshold == 0 {
            anyhow::bail!("attach_y_threshold должно быть больше 0");
        }

        if self.reporter.throttle_ms == 0 {
            anyhow::bail!("throttle_ms должно быть больше 0");
        }

        match self.motion.mode.as_str() {
            "auto" | "animated" | "instant" => {}
            _ => anyhow::bail!("Неверный режим перемещения: {}", self.motion.mode),
        }

        if self.motion.step_interval_ms == 0 {
            anyhow::bail!("step_interval_ms должно быть больше 0");
        }

        if self.motion.max_attempts == 0 {
            anyhow::bail!("max_attempts должно быть больше 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.drag.attach_y_threshold, 50);
        assert_eq!(config.reporter.throttle(), Duration::from_millis(4));
        assert_eq!(config.motion.step_interval(), Duration::from_millis(16));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.drag.attach_y_threshold = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.motion.mode = "teleport".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.motion.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_motion_mode_resolution() {
        let mut motion = MotionConfig::default();
        motion.mode = "animated".to_string();
        assert!(motion.animated());
        motion.mode = "instant".to_string();
        assert!(!motion.animated());
        motion.mode = "auto".to_string();
        assert_eq!(motion.animated(), cfg!(target_os = "macos"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = Config::load("definitely/not/here/tabdrag.toml").unwrap();
        assert_eq!(config.reporter.cancel_key, 1);
        assert_eq!(config.motion.max_attempts, 190);
    }
}
