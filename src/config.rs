//! 配置加载 - `~/.config/admin-notify/config.json`
//!
//! 配置文件不存在时使用默认值；字段全部可省略。

use crate::badge::{default_definitions, BadgeDefinition};
use crate::notification::ChannelSpec;
use crate::service::WATCHED_COLLECTIONS;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 通知渠道定义
    #[serde(default)]
    pub channel: ChannelSpec,
    /// 推送主题（None 表示不订阅）
    #[serde(default = "default_topic")]
    pub topic: Option<String>,
    /// 监听的集合
    #[serde(default = "default_collections")]
    pub collections: Vec<String>,
    /// 徽章计数器定义
    #[serde(default = "default_badges")]
    pub badges: Vec<BadgeDefinition>,
}

fn default_topic() -> Option<String> {
    Some("general".to_string())
}

fn default_collections() -> Vec<String> {
    WATCHED_COLLECTIONS.iter().map(|s| s.to_string()).collect()
}

fn default_badges() -> Vec<BadgeDefinition> {
    default_definitions()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            channel: ChannelSpec::default(),
            topic: default_topic(),
            collections: default_collections(),
            badges: default_badges(),
        }
    }
}

impl AppConfig {
    /// 配置文件路径
    pub fn path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config/admin-notify")
            .join("config.json")
    }

    /// 从默认路径加载；文件缺失时返回默认配置
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }
}
