//! 平台通知服务抽象 - 渠道创建、权限申请与展示
//!
//! 展示是 fire-and-forget 的：平台不提供送达确认，这里也不假设。

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

/// 渠道重要级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Default,
    High,
}

/// 通知渠道定义（id 决定视觉/声音分组的归属）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSpec {
    /// 渠道 ID
    pub id: String,
    /// 人类可读名称
    pub name: String,
    /// 重要级别
    pub importance: Importance,
    /// 提示音
    pub sound: Option<String>,
}

impl Default for ChannelSpec {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            name: "Default Channel".to_string(),
            importance: Importance::High,
            sound: Some("default".to_string()),
        }
    }
}

/// 权限申请结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Authorized,
    Provisional,
    Denied,
}

impl PermissionStatus {
    /// Authorized 和 Provisional 都算开启
    pub fn is_enabled(self) -> bool {
        matches!(self, PermissionStatus::Authorized | PermissionStatus::Provisional)
    }
}

/// 一条待展示的通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// 标题
    pub title: String,
    /// 正文
    pub body: String,
    /// 目标渠道 ID
    pub channel_id: String,
    /// 点按路由目标（本范围内只用默认动作）
    pub press_action: String,
}

impl NotificationRequest {
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            channel_id: channel_id.into(),
            press_action: "default".to_string(),
        }
    }
}

/// 平台通知服务
pub trait PlatformNotifier: Send + Sync {
    /// 创建（或重建）渠道
    fn create_channel(&self, spec: &ChannelSpec) -> Result<()>;

    /// 申请展示权限
    fn request_permission(&self) -> Result<PermissionStatus>;

    /// 展示一条通知
    fn display(&self, request: &NotificationRequest) -> Result<()>;

    /// 订阅推送主题
    fn subscribe_topic(&self, topic: &str) -> Result<()>;
}

/// 控制台通知器 - CLI 的展示端
pub struct ConsoleNotifier;

impl PlatformNotifier for ConsoleNotifier {
    fn create_channel(&self, spec: &ChannelSpec) -> Result<()> {
        info!(channel = %spec.id, name = %spec.name, "Notification channel ready");
        Ok(())
    }

    fn request_permission(&self) -> Result<PermissionStatus> {
        // 终端没有权限这回事
        Ok(PermissionStatus::Authorized)
    }

    fn display(&self, request: &NotificationRequest) -> Result<()> {
        println!("🔔 {}", request.title);
        for line in request.body.lines() {
            println!("   {}", line);
        }
        Ok(())
    }

    fn subscribe_topic(&self, topic: &str) -> Result<()> {
        info!(topic = %topic, "Subscribed to topic");
        Ok(())
    }
}
