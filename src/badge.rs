//! 徽章计数 - 由过滤监听驱动的命名计数器
//!
//! 计数器是水位不是累加器：每次快照把计数器直接设为当前结果集
//! 大小，所以它可以下降（比如消息被标记已读、离开 unread 过滤）。
//! 订阅出错时保留上一次的值，绝不在瞬时失败时归零。

use crate::source::{DataSource, Filter, Query};
use crate::watcher::{CollectionWatcher, WatchEvent, WatcherHandle};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// 一个计数器的定义：名字 + 集合 + 可选过滤
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgeDefinition {
    /// 计数器名（UI 侧引用）
    pub name: String,
    /// 集合名
    pub collection: String,
    /// 可选过滤（如 status == "unread"）
    pub filter: Option<Filter>,
}

impl BadgeDefinition {
    pub fn total(name: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: collection.into(),
            filter: None,
        }
    }

    pub fn filtered(
        name: impl Into<String>,
        collection: impl Into<String>,
        filter: Filter,
    ) -> Self {
        Self {
            name: name.into(),
            collection: collection.into(),
            filter: Some(filter),
        }
    }
}

/// 仪表盘默认的四个计数器
pub fn default_definitions() -> Vec<BadgeDefinition> {
    vec![
        BadgeDefinition::total("messages", "messages"),
        BadgeDefinition::filtered(
            "unread_messages",
            "messages",
            Filter::eq("status", "unread"),
        ),
        BadgeDefinition::total("subscribers", "subscribers"),
        BadgeDefinition::total("applications", "applications"),
    ]
}

/// 计数器名 → 当前值
pub type BadgeState = HashMap<String, usize>;

/// 徽章聚合器
///
/// 每个定义打开一个受过滤限制的监听；UI 只读。
pub struct BadgeAggregator {
    counts: Arc<Mutex<BadgeState>>,
    handles: Vec<WatcherHandle>,
}

impl BadgeAggregator {
    /// 按定义建立所有监听
    pub fn watch(source: &dyn DataSource, definitions: Vec<BadgeDefinition>) -> Self {
        let counts: Arc<Mutex<BadgeState>> = Arc::new(Mutex::new(
            definitions.iter().map(|d| (d.name.clone(), 0)).collect(),
        ));

        let mut handles = Vec::new();
        for definition in definitions {
            let name = definition.name.clone();
            let sink = counts.clone();

            let mut query = Query::collection(&definition.collection).newest_first();
            if let Some(filter) = definition.filter {
                query = query.with_filter(filter);
            }

            let handle = CollectionWatcher::watch(source, query, move |event| match event {
                WatchEvent::Batch(batch) => {
                    debug!(counter = %name, value = batch.total, "Badge updated");
                    sink.lock().unwrap().insert(name.clone(), batch.total);
                }
                WatchEvent::Error(error) => {
                    // 保留上一次的值，失败只进日志
                    warn!(
                        counter = %name,
                        collection = %error.collection(),
                        error = %error.message(),
                        "Badge subscription failed, keeping last value"
                    );
                }
            });
            handles.push(handle);
        }

        Self { counts, handles }
    }

    /// 读取全部计数器
    pub fn state(&self) -> BadgeState {
        self.counts.lock().unwrap().clone()
    }

    /// 读取单个计数器
    pub fn count(&self, name: &str) -> Option<usize> {
        self.counts.lock().unwrap().get(name).copied()
    }

    /// 释放全部监听
    pub fn dispose(&self) {
        for handle in &self.handles {
            handle.dispose();
        }
    }
}
