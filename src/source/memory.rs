//! 内存数据源 - 嵌入与测试用的实时后端
//!
//! 满足数据源契约：订阅后立即投递一次完整状态快照，之后每次变更
//! 投递单事件增量快照。所有回调在变更发生的调用栈上同步执行，
//! 不同集合之间没有跨集合顺序保证。

use super::{
    ChangeKind, DataSource, DocChange, Document, Fields, OrderBy, Query, RawSnapshot,
    SnapshotCallback, SourceError, SourceEvent, Subscription,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::debug;

struct Subscriber {
    query: Query,
    callback: Arc<Mutex<SnapshotCallback>>,
    subscription: Subscription,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, Vec<Document>>,
    subscribers: Vec<Subscriber>,
    /// 拒绝订阅的集合（模拟权限不足）
    denied: HashSet<String>,
}

/// 内存数据源
#[derive(Clone, Default)]
pub struct MemorySource {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让指定集合的后续订阅失败（投递 `SubscriptionFailed`）
    pub fn deny_collection(&self, collection: impl Into<String>) {
        self.inner.lock().unwrap().denied.insert(collection.into());
    }

    /// 新增文档并通知匹配的订阅者
    pub fn add_document(&self, collection: &str, doc: Document) {
        let deliveries = {
            let mut inner = self.inner.lock().unwrap();
            inner
                .collections
                .entry(collection.to_string())
                .or_default()
                .push(doc.clone());
            Self::deliveries_for_change(&mut inner, collection, ChangeKind::Added, &doc)
        };
        Self::deliver(deliveries);
    }

    /// 更新文档字段并通知匹配的订阅者。
    ///
    /// 对每个订阅者单独判断：更新后仍在结果集内为 `Modified`，
    /// 离开结果集为 `Removed`，进入结果集为 `Added`。
    /// 返回是否找到了该文档。
    pub fn update_document(&self, collection: &str, id: &str, fields: Fields) -> bool {
        let deliveries = {
            let mut inner = self.inner.lock().unwrap();
            let Some(docs) = inner.collections.get_mut(collection) else {
                return false;
            };
            let Some(doc) = docs.iter_mut().find(|d| d.id == id) else {
                return false;
            };
            let before = doc.clone();
            doc.fields = fields;
            let after = doc.clone();
            Self::deliveries_for_update(&mut inner, collection, &before, &after)
        };
        Self::deliver(deliveries);
        true
    }

    /// 删除文档并通知匹配的订阅者
    pub fn remove_document(&self, collection: &str, id: &str) -> bool {
        let deliveries = {
            let mut inner = self.inner.lock().unwrap();
            let Some(docs) = inner.collections.get_mut(collection) else {
                return false;
            };
            let Some(pos) = docs.iter().position(|d| d.id == id) else {
                return false;
            };
            let doc = docs.remove(pos);
            Self::deliveries_for_change(&mut inner, collection, ChangeKind::Removed, &doc)
        };
        Self::deliver(deliveries);
        true
    }

    /// 当前集合大小（未过滤）
    pub fn len(&self, collection: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .collections
            .get(collection)
            .map(|d| d.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn result_set(inner: &Inner, query: &Query) -> Vec<Document> {
        let mut docs: Vec<Document> = inner
            .collections
            .get(&query.collection)
            .map(|docs| docs.iter().filter(|d| query.matches(d)).cloned().collect())
            .unwrap_or_default();
        let order = query.order_by.clone().unwrap_or_else(OrderBy::newest_first);
        docs.sort_by(|a, b| order.compare(a, b));
        docs
    }

    /// 为一次 added/removed 变更收集所有待投递的快照。
    /// 回调在锁外执行，这里只收集。
    fn deliveries_for_change(
        inner: &mut Inner,
        collection: &str,
        kind: ChangeKind,
        doc: &Document,
    ) -> Vec<(Arc<Mutex<SnapshotCallback>>, Subscription, SourceEvent)> {
        inner.subscribers.retain(|s| !s.subscription.is_disposed());

        let targets: Vec<(Query, Arc<Mutex<SnapshotCallback>>, Subscription)> = inner
            .subscribers
            .iter()
            .filter(|s| s.query.collection == collection && s.query.matches(doc))
            .map(|s| (s.query.clone(), s.callback.clone(), s.subscription.clone()))
            .collect();

        targets
            .into_iter()
            .map(|(query, callback, subscription)| {
                let snapshot = RawSnapshot {
                    collection: collection.to_string(),
                    docs: Self::result_set(inner, &query),
                    changes: vec![DocChange {
                        kind,
                        doc: doc.clone(),
                    }],
                };
                (callback, subscription, SourceEvent::Snapshot(snapshot))
            })
            .collect()
    }

    fn deliveries_for_update(
        inner: &mut Inner,
        collection: &str,
        before: &Document,
        after: &Document,
    ) -> Vec<(Arc<Mutex<SnapshotCallback>>, Subscription, SourceEvent)> {
        inner.subscribers.retain(|s| !s.subscription.is_disposed());

        let targets: Vec<(Query, ChangeKind, Arc<Mutex<SnapshotCallback>>, Subscription)> = inner
            .subscribers
            .iter()
            .filter_map(|s| {
                if s.query.collection != collection {
                    return None;
                }
                let kind = match (s.query.matches(before), s.query.matches(after)) {
                    (true, true) => ChangeKind::Modified,
                    (true, false) => ChangeKind::Removed,
                    (false, true) => ChangeKind::Added,
                    (false, false) => return None,
                };
                Some((
                    s.query.clone(),
                    kind,
                    s.callback.clone(),
                    s.subscription.clone(),
                ))
            })
            .collect();

        targets
            .into_iter()
            .map(|(query, kind, callback, subscription)| {
                let snapshot = RawSnapshot {
                    collection: collection.to_string(),
                    docs: Self::result_set(inner, &query),
                    changes: vec![DocChange {
                        kind,
                        doc: after.clone(),
                    }],
                };
                (callback, subscription, SourceEvent::Snapshot(snapshot))
            })
            .collect()
    }

    fn deliver(deliveries: Vec<(Arc<Mutex<SnapshotCallback>>, Subscription, SourceEvent)>) {
        for (callback, subscription, event) in deliveries {
            // 投递前再查一次释放标记，已释放的订阅不再收到任何回调
            if subscription.is_disposed() {
                continue;
            }
            let mut callback = callback.lock().unwrap();
            (*callback)(event);
        }
    }
}

impl DataSource for MemorySource {
    fn subscribe(&self, query: Query, callback: SnapshotCallback) -> Subscription {
        let subscription = Subscription::new();
        let callback = Arc::new(Mutex::new(callback));

        let initial = {
            let mut inner = self.inner.lock().unwrap();

            if inner.denied.contains(&query.collection) {
                debug!(collection = %query.collection, "Subscription denied");
                SourceEvent::Error(SourceError::SubscriptionFailed {
                    collection: query.collection.clone(),
                    message: "permission denied".to_string(),
                })
            } else {
                let docs = Self::result_set(&inner, &query);
                let changes = docs
                    .iter()
                    .map(|doc| DocChange {
                        kind: ChangeKind::Added,
                        doc: doc.clone(),
                    })
                    .collect();
                let snapshot = RawSnapshot {
                    collection: query.collection.clone(),
                    docs,
                    changes,
                };
                inner.subscribers.push(Subscriber {
                    query,
                    callback: callback.clone(),
                    subscription: subscription.clone(),
                });
                SourceEvent::Snapshot(snapshot)
            }
        };

        // 首次快照在锁外同步投递
        if !subscription.is_disposed() {
            let mut callback = callback.lock().unwrap();
            (*callback)(initial);
        }
        subscription
    }
}
