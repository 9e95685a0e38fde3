//! 投递渠道管理 - 前台/后台两条路径共用的一次性渠道设置
//!
//! 前台路径（进程活跃时由分发器调用）和后台路径（进程不在前台时
//! 由推送运输层调起）各自独立执行渠道设置：后台回调可能跑在另一个
//! 进程上下文里，不能假设前台初始化先发生过。两条路径收敛到同一个
//! 渠道 ID，视觉/声音风格与投递路径无关。

use super::platform::{ChannelSpec, NotificationRequest, PermissionStatus, PlatformNotifier};
use crate::source::Fields;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// 展示结果
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    /// 已提交展示
    Sent,
    /// 跳过（权限被拒等）
    Skipped(String),
    /// 平台拒绝展示（不致命，已记日志）
    Failed(String),
}

/// 设置状态机：`Uninitialized → PermissionRequested → ChannelReady`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupState {
    Uninitialized,
    PermissionRequested,
    ChannelReady,
}

/// 后台运输层送来的原始消息
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteMessage {
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(default)]
    pub data: Fields,
}

/// 投递渠道管理器
pub struct DeliveryChannelManager {
    notifier: Arc<dyn PlatformNotifier>,
    channel: ChannelSpec,
    topic: Option<String>,
    state: Mutex<SetupState>,
    permission: Mutex<Option<PermissionStatus>>,
}

impl DeliveryChannelManager {
    pub fn new(notifier: Arc<dyn PlatformNotifier>, channel: ChannelSpec) -> Self {
        Self {
            notifier,
            channel,
            topic: None,
            state: Mutex::new(SetupState::Uninitialized),
            permission: Mutex::new(None),
        }
    }

    /// 设置推送主题（权限就绪后订阅一次）
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn channel_id(&self) -> &str {
        &self.channel.id
    }

    pub fn setup_state(&self) -> SetupState {
        *self.state.lock().unwrap()
    }

    pub fn permission(&self) -> Option<PermissionStatus> {
        *self.permission.lock().unwrap()
    }

    /// 一次性渠道设置。已经 `ChannelReady` 时是空操作。
    ///
    /// 权限被拒不致命：子系统继续运行，展示调用按平台惯例静默
    /// 落空。渠道创建失败时停在 `PermissionRequested`，下一次
    /// 调用会再试 —— 这不是自动重试，重试由调用方的下一次进入触发。
    pub fn ensure_channel_ready(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == SetupState::ChannelReady {
            return;
        }

        if *state == SetupState::Uninitialized {
            *state = SetupState::PermissionRequested;
            match self.notifier.request_permission() {
                Ok(status) => {
                    if status == PermissionStatus::Denied {
                        info!("Notification permission denied, displays will no-op");
                    }
                    *self.permission.lock().unwrap() = Some(status);
                }
                Err(e) => {
                    warn!(error = %e, "Permission request failed");
                }
            }
        }

        match self.notifier.create_channel(&self.channel) {
            Ok(()) => {
                *state = SetupState::ChannelReady;
                debug!(channel = %self.channel.id, "Channel setup complete");

                let enabled = self
                    .permission
                    .lock()
                    .unwrap()
                    .map(|p| p.is_enabled())
                    .unwrap_or(false);
                if enabled {
                    if let Some(ref topic) = self.topic {
                        if let Err(e) = self.notifier.subscribe_topic(topic) {
                            warn!(topic = %topic, error = %e, "Topic subscription failed");
                        }
                    }
                }
            }
            Err(e) => {
                warn!(channel = %self.channel.id, error = %e, "Channel creation failed");
            }
        }
    }

    /// 前台展示入口
    pub fn display_foreground(&self, request: &NotificationRequest) -> SendResult {
        self.ensure_channel_ready();
        self.display(request)
    }

    /// 后台/终止态入口：推送运输层带着原始消息调起。
    /// 独立完成渠道设置后展示在同一个渠道上。
    pub fn handle_background_message(&self, message: &RemoteMessage) -> SendResult {
        self.ensure_channel_ready();

        let request = NotificationRequest::new(
            message
                .title
                .clone()
                .unwrap_or_else(|| "New Notification".to_string()),
            message.body.clone().unwrap_or_default(),
            self.channel.id.clone(),
        );
        self.display(&request)
    }

    fn display(&self, request: &NotificationRequest) -> SendResult {
        if self.permission() == Some(PermissionStatus::Denied) {
            debug!(title = %request.title, "Display skipped, permission denied");
            return SendResult::Skipped("permission denied".to_string());
        }

        match self.notifier.display(request) {
            Ok(()) => SendResult::Sent,
            Err(e) => {
                // 展示失败吞掉，只进日志
                warn!(title = %request.title, error = %e, "Display failed");
                SendResult::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 记录所有调用的 mock 通知器
    struct RecordingNotifier {
        permission: PermissionStatus,
        channels_created: AtomicUsize,
        permission_requests: AtomicUsize,
        displayed: Mutex<Vec<NotificationRequest>>,
        topics: Mutex<Vec<String>>,
        fail_display: bool,
        fail_channel: bool,
    }

    impl RecordingNotifier {
        fn new(permission: PermissionStatus) -> Self {
            Self {
                permission,
                channels_created: AtomicUsize::new(0),
                permission_requests: AtomicUsize::new(0),
                displayed: Mutex::new(Vec::new()),
                topics: Mutex::new(Vec::new()),
                fail_display: false,
                fail_channel: false,
            }
        }
    }

    impl PlatformNotifier for RecordingNotifier {
        fn create_channel(&self, _spec: &ChannelSpec) -> anyhow::Result<()> {
            self.channels_created.fetch_add(1, Ordering::SeqCst);
            if self.fail_channel {
                return Err(anyhow!("channel refused"));
            }
            Ok(())
        }

        fn request_permission(&self) -> anyhow::Result<PermissionStatus> {
            self.permission_requests.fetch_add(1, Ordering::SeqCst);
            Ok(self.permission)
        }

        fn display(&self, request: &NotificationRequest) -> anyhow::Result<()> {
            if self.fail_display {
                return Err(anyhow!("display refused"));
            }
            self.displayed.lock().unwrap().push(request.clone());
            Ok(())
        }

        fn subscribe_topic(&self, topic: &str) -> anyhow::Result<()> {
            self.topics.lock().unwrap().push(topic.to_string());
            Ok(())
        }
    }

    fn manager(notifier: Arc<RecordingNotifier>) -> DeliveryChannelManager {
        DeliveryChannelManager::new(notifier, ChannelSpec::default())
    }

    #[test]
    fn test_setup_walks_state_machine() {
        let notifier = Arc::new(RecordingNotifier::new(PermissionStatus::Authorized));
        let delivery = manager(notifier.clone());
        assert_eq!(delivery.setup_state(), SetupState::Uninitialized);

        delivery.ensure_channel_ready();
        assert_eq!(delivery.setup_state(), SetupState::ChannelReady);
        assert_eq!(notifier.permission_requests.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.channels_created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_setup_is_idempotent() {
        let notifier = Arc::new(RecordingNotifier::new(PermissionStatus::Authorized));
        let delivery = manager(notifier.clone());

        delivery.ensure_channel_ready();
        delivery.ensure_channel_ready();
        delivery.ensure_channel_ready();

        // 已就绪后重入是空操作
        assert_eq!(notifier.permission_requests.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.channels_created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_channel_failure_stays_in_permission_requested() {
        let mut inner = RecordingNotifier::new(PermissionStatus::Authorized);
        inner.fail_channel = true;
        let notifier = Arc::new(inner);
        let delivery = manager(notifier.clone());

        delivery.ensure_channel_ready();
        assert_eq!(delivery.setup_state(), SetupState::PermissionRequested);

        // 下一次进入会再尝试创建渠道，但权限只申请一次
        delivery.ensure_channel_ready();
        assert_eq!(notifier.permission_requests.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.channels_created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_display_foreground_sends() {
        let notifier = Arc::new(RecordingNotifier::new(PermissionStatus::Authorized));
        let delivery = manager(notifier.clone());

        let request = NotificationRequest::new("Hi", "body", "default");
        assert_eq!(delivery.display_foreground(&request), SendResult::Sent);
        assert_eq!(notifier.displayed.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_denied_permission_skips_display_but_not_fatal() {
        let notifier = Arc::new(RecordingNotifier::new(PermissionStatus::Denied));
        let delivery = manager(notifier.clone());

        let request = NotificationRequest::new("Hi", "body", "default");
        let result = delivery.display_foreground(&request);

        assert!(matches!(result, SendResult::Skipped(_)));
        assert!(notifier.displayed.lock().unwrap().is_empty());
        // 渠道设置照常完成
        assert_eq!(delivery.setup_state(), SetupState::ChannelReady);
    }

    #[test]
    fn test_display_failure_is_swallowed() {
        let mut inner = RecordingNotifier::new(PermissionStatus::Authorized);
        inner.fail_display = true;
        let delivery = manager(Arc::new(inner));

        let request = NotificationRequest::new("Hi", "body", "default");
        assert!(matches!(
            delivery.display_foreground(&request),
            SendResult::Failed(_)
        ));
    }

    #[test]
    fn test_background_message_performs_own_setup() {
        let notifier = Arc::new(RecordingNotifier::new(PermissionStatus::Authorized));
        let delivery = manager(notifier.clone());

        // 前台从未初始化；后台路径自己完成设置
        let message = RemoteMessage {
            title: Some("Server ping".to_string()),
            body: Some("hello".to_string()),
            data: Fields::new(),
        };
        assert_eq!(delivery.handle_background_message(&message), SendResult::Sent);
        assert_eq!(delivery.setup_state(), SetupState::ChannelReady);

        let displayed = notifier.displayed.lock().unwrap();
        assert_eq!(displayed[0].title, "Server ping");
        assert_eq!(displayed[0].channel_id, "default"); // 与前台同一渠道
    }

    #[test]
    fn test_background_message_fallback_title() {
        let notifier = Arc::new(RecordingNotifier::new(PermissionStatus::Authorized));
        let delivery = manager(notifier.clone());

        delivery.handle_background_message(&RemoteMessage::default());

        let displayed = notifier.displayed.lock().unwrap();
        assert_eq!(displayed[0].title, "New Notification");
        assert_eq!(displayed[0].body, "");
    }

    #[test]
    fn test_topic_subscribed_once_when_enabled() {
        let notifier = Arc::new(RecordingNotifier::new(PermissionStatus::Provisional));
        let delivery = manager(notifier.clone()).with_topic("general");

        delivery.ensure_channel_ready();
        delivery.ensure_channel_ready();

        assert_eq!(*notifier.topics.lock().unwrap(), vec!["general"]);
    }

    #[test]
    fn test_topic_not_subscribed_when_denied() {
        let notifier = Arc::new(RecordingNotifier::new(PermissionStatus::Denied));
        let delivery = manager(notifier.clone()).with_topic("general");

        delivery.ensure_channel_ready();
        assert!(notifier.topics.lock().unwrap().is_empty());
    }
}
