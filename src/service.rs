//! 子系统装配 - 进程根持有的监听/通知/计数编排
//!
//! 一个注入的数据源引用贯穿所有组件，生命周期归进程根，不随界面
//! 重建。每个被监听集合一套独立的检测器 + 分发器；徽章聚合独立
//! 开自己的过滤监听。某个集合订阅失败只影响它自己。

use crate::badge::{default_definitions, BadgeAggregator, BadgeDefinition, BadgeState};
use crate::detector::NewEntryDetector;
use crate::notification::{
    DeliveryChannelManager, NotificationDispatcher, RemoteMessage, SendResult,
};
use crate::source::{DataSource, Query};
use crate::watcher::{CollectionWatcher, WatchEvent, WatcherHandle};
use std::sync::Arc;
use tracing::{info, warn};

/// 默认监听的四个集合
pub const WATCHED_COLLECTIONS: [&str; 4] = ["messages", "applications", "subscribers", "jobs"];

/// 通知/徽章子系统
pub struct NotifyService {
    delivery: Arc<DeliveryChannelManager>,
    watchers: Vec<WatcherHandle>,
    badges: BadgeAggregator,
}

impl NotifyService {
    /// 启动子系统：完成一次渠道设置，为每个集合建立
    /// 检测器 + 分发器管线，并按定义打开徽章监听。
    pub fn start(
        source: &dyn DataSource,
        delivery: Arc<DeliveryChannelManager>,
        collections: &[String],
        badge_definitions: Vec<BadgeDefinition>,
    ) -> Self {
        delivery.ensure_channel_ready();

        let mut watchers = Vec::new();
        for tag in collections {
            // 每个订阅一个检测器实例，首批抑制互不串扰
            let mut detector = NewEntryDetector::new(tag.clone());
            let dispatcher = NotificationDispatcher::new(delivery.clone());

            let handle = CollectionWatcher::watch(
                source,
                Query::collection(tag.clone()).newest_first(),
                move |event| match event {
                    WatchEvent::Batch(batch) => {
                        for entry in detector.detect(&batch) {
                            dispatcher.dispatch(&entry);
                        }
                    }
                    WatchEvent::Error(error) => {
                        // 该集合的通知停更，其余集合不受影响；
                        // 是否重新订阅由持有方决定
                        warn!(
                            collection = %error.collection(),
                            error = %error.message(),
                            "Collection watch failed, notifications paused"
                        );
                    }
                },
            );
            watchers.push(handle);
        }

        info!(
            collections = collections.len(),
            "Notification service started"
        );

        let badges = BadgeAggregator::watch(source, badge_definitions);

        Self {
            delivery,
            watchers,
            badges,
        }
    }

    /// 按默认集合与默认计数器启动
    pub fn start_default(source: &dyn DataSource, delivery: Arc<DeliveryChannelManager>) -> Self {
        let collections: Vec<String> = WATCHED_COLLECTIONS
            .iter()
            .map(|s| s.to_string())
            .collect();
        Self::start(source, delivery, &collections, default_definitions())
    }

    /// 当前全部徽章计数
    pub fn badge_state(&self) -> BadgeState {
        self.badges.state()
    }

    /// 单个徽章计数
    pub fn badge(&self, name: &str) -> Option<usize> {
        self.badges.count(name)
    }

    /// 后台消息入口（运输层回调转发到这里）
    pub fn handle_background_message(&self, message: &RemoteMessage) -> SendResult {
        self.delivery.handle_background_message(message)
    }

    pub fn delivery(&self) -> &Arc<DeliveryChannelManager> {
        &self.delivery
    }

    /// 关停：释放全部订阅，之后不再有通知与计数更新
    pub fn dispose(&self) {
        for handle in &self.watchers {
            handle.dispose();
        }
        self.badges.dispose();
        info!("Notification service disposed");
    }
}
