//! 通知分发器 - 把检测到的新增条目变成展示请求
//!
//! 每个合格事件恰好触发一次展示请求。这里不做跨事件去重 ——
//! 检测器已经保证同一订阅实例内每个文档新增至多触发一次。

use super::delivery::{DeliveryChannelManager, SendResult};
use super::formatter;
use super::platform::NotificationRequest;
use crate::watcher::ChangeEvent;
use std::sync::Arc;
use tracing::{debug, info};

/// 通知分发器
pub struct NotificationDispatcher {
    delivery: Arc<DeliveryChannelManager>,
}

impl NotificationDispatcher {
    pub fn new(delivery: Arc<DeliveryChannelManager>) -> Self {
        Self { delivery }
    }

    /// 处理一条新增事件：格式化并走前台展示路径
    pub fn dispatch(&self, event: &ChangeEvent) -> SendResult {
        let Some(formatted) = formatter::format_change(event) else {
            debug!(collection = %event.collection, "No formatting rule, skipped");
            return SendResult::Skipped(format!("no formatting rule for {}", event.collection));
        };

        info!(
            collection = %event.collection,
            doc_id = %event.doc_id,
            title = %formatted.title,
            "Dispatching notification"
        );

        let request = NotificationRequest::new(
            formatted.title,
            formatted.body,
            self.delivery.channel_id().to_string(),
        );
        self.delivery.display_foreground(&request)
    }
}
