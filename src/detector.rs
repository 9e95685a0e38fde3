//! 新条目检测器 - 把「首次快照是全量」的歧义收敛成干净的新增流
//!
//! 每个订阅生命周期一个实例、一个 `seen_first_snapshot` 标记。
//! 多个集合共用一个标记是明确要避开的 bug：先到的集合会吃掉
//! 其他集合的首次快照抑制。订阅重建（如界面重新挂载）时换新
//! 实例，历史不会被当作新增重放。

use crate::source::ChangeKind;
use crate::watcher::{ChangeBatch, ChangeEvent};
use tracing::debug;

/// 新条目检测器
#[derive(Debug)]
pub struct NewEntryDetector {
    collection: String,
    seen_first_snapshot: bool,
}

impl NewEntryDetector {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            seen_first_snapshot: false,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// 是否已经消费过首次快照
    pub fn primed(&self) -> bool {
        self.seen_first_snapshot
    }

    /// 过滤一批变更，只留下订阅之后真正新增的条目。
    ///
    /// 首次收到的那批无条件丢弃 —— 不信任批次里标注的变更类型，
    /// 数据源把全量快照报成什么样都一样。之后的批次只放行
    /// `Added`；`Modified`/`Removed` 不属于「新条目」语义。
    pub fn detect(&mut self, batch: &ChangeBatch) -> Vec<ChangeEvent> {
        if !self.seen_first_snapshot {
            self.seen_first_snapshot = true;
            debug!(
                collection = %self.collection,
                suppressed = batch.events.len(),
                "Initial snapshot suppressed"
            );
            return Vec::new();
        }

        batch
            .events
            .iter()
            .filter(|event| event.kind == ChangeKind::Added)
            .cloned()
            .collect()
    }
}
