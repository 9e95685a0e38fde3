//! 集合监听器 - 订阅单个集合并把快照分解为变更事件
//!
//! 监听器在数据源之上做两件事：给每个事件打上「是否来自首次快照」
//! 的标记（每次订阅独立判定），并保证释放之后不再有任何回调执行。

use crate::source::{ChangeKind, DataSource, Fields, Query, SourceError, SourceEvent, Subscription};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// 一条观测到的变更
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// 集合名
    pub collection: String,
    /// 变更类型
    pub kind: ChangeKind,
    /// 文档 ID
    pub doc_id: String,
    /// 文档字段
    pub fields: Fields,
    /// 是否属于首次快照
    pub from_initial_snapshot: bool,
}

/// 一批变更（对应数据源的一次快照）
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeBatch {
    /// 集合名
    pub collection: String,
    /// 是否为订阅后的首次快照
    pub initial: bool,
    /// 当前结果集大小（计数用，不是增量）
    pub total: usize,
    /// 本批事件
    pub events: Vec<ChangeEvent>,
}

/// 监听器回调收到的事件
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Batch(ChangeBatch),
    Error(SourceError),
}

/// 监听句柄。释放后保证回调不再执行。
#[derive(Debug, Clone)]
pub struct WatcherHandle {
    gate: Arc<AtomicBool>,
    subscription: Subscription,
}

impl WatcherHandle {
    pub fn dispose(&self) {
        self.gate.store(true, Ordering::SeqCst);
        self.subscription.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.gate.load(Ordering::SeqCst)
    }
}

/// 集合监听器
pub struct CollectionWatcher;

impl CollectionWatcher {
    /// 建立订阅。回调收到 [`WatchEvent::Batch`] 或
    /// [`WatchEvent::Error`]；订阅失败不会同步报错。
    pub fn watch(
        source: &dyn DataSource,
        query: Query,
        mut callback: impl FnMut(WatchEvent) + Send + 'static,
    ) -> WatcherHandle {
        let gate = Arc::new(AtomicBool::new(false));
        let guard = gate.clone();
        // 首次快照标记属于本次订阅，不与任何其他监听器共享
        let mut seen_first = false;

        let subscription = source.subscribe(
            query,
            Box::new(move |event| {
                // 数据源在投递前已查过订阅标记；这里再查一次自己的
                // 释放门，拦住底层无法取消的在途投递
                if guard.load(Ordering::SeqCst) {
                    debug!("Dropping event for disposed watcher");
                    return;
                }

                match event {
                    SourceEvent::Snapshot(snapshot) => {
                        let initial = !seen_first;
                        seen_first = true;

                        let events = snapshot
                            .changes
                            .into_iter()
                            .map(|change| ChangeEvent {
                                collection: snapshot.collection.clone(),
                                kind: change.kind,
                                doc_id: change.doc.id,
                                fields: change.doc.fields,
                                from_initial_snapshot: initial,
                            })
                            .collect();

                        callback(WatchEvent::Batch(ChangeBatch {
                            collection: snapshot.collection,
                            initial,
                            total: snapshot.docs.len(),
                            events,
                        }));
                    }
                    SourceEvent::Error(error) => {
                        callback(WatchEvent::Error(error));
                    }
                }
            }),
        );

        WatcherHandle { gate, subscription }
    }
}
