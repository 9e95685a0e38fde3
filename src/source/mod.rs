//! 实时数据源抽象 - 集合订阅与快照投递
//!
//! 数据源保证：订阅后的第一次回调是一个完整状态快照（所有变更均为
//! `Added`），之后的每次回调是单批增量变更。错误通过与数据走同一条
//! 回调通道的 `SourceEvent::Error` 投递，订阅建立本身不会同步抛错。

pub mod jsonl;
pub mod memory;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

/// 文档字段（不透明的键值映射）
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// 一个被监听的文档
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// 文档 ID
    pub id: String,
    /// 字段内容
    pub fields: Fields,
    /// 服务端时间戳（排序键）
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
            created_at: chrono::Utc::now(),
        }
    }

    /// 读取字符串字段（空字符串视为缺失）
    pub fn text_field(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// 变更类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// 单个文档的变更记录
#[derive(Debug, Clone, PartialEq)]
pub struct DocChange {
    pub kind: ChangeKind,
    pub doc: Document,
}

/// 一次快照：当前完整结果集 + 本批变更
#[derive(Debug, Clone, PartialEq)]
pub struct RawSnapshot {
    /// 集合名
    pub collection: String,
    /// 当前匹配查询的全部文档（按排序键，最新在前）
    pub docs: Vec<Document>,
    /// 本批变更
    pub changes: Vec<DocChange>,
}

/// 订阅错误（走回调通道，不致命）
#[derive(Debug, Clone, PartialEq)]
pub enum SourceError {
    /// 订阅建立失败（如权限不足）。不自动重试，由持有方决定是否重新订阅。
    SubscriptionFailed { collection: String, message: String },
}

impl SourceError {
    pub fn collection(&self) -> &str {
        match self {
            SourceError::SubscriptionFailed { collection, .. } => collection,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            SourceError::SubscriptionFailed { message, .. } => message,
        }
    }
}

/// 回调通道上的事件：快照或错误
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    Snapshot(RawSnapshot),
    Error(SourceError),
}

/// 等值过滤条件（如 status == "unread"）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub equals: serde_json::Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, equals: impl Into<serde_json::Value>) -> Self {
        Self {
            field: field.into(),
            equals: equals.into(),
        }
    }

    /// 文档是否匹配该条件
    pub fn matches(&self, doc: &Document) -> bool {
        doc.fields.get(&self.field) == Some(&self.equals)
    }
}

/// 排序方式。`created_at` 指文档的服务端时间戳属性，其余字段名
/// 按字段值比较。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

impl OrderBy {
    /// 最新在前（按服务端时间戳）
    pub fn newest_first() -> Self {
        Self {
            field: "created_at".to_string(),
            descending: true,
        }
    }

    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let ord = if self.field == "created_at" {
            a.created_at.cmp(&b.created_at)
        } else {
            compare_values(a.fields.get(&self.field), b.fields.get(&self.field))
        };
        if self.descending {
            ord.reverse()
        } else {
            ord
        }
    }
}

/// JSON 值的全序比较（缺失 < null < bool < number < string < 其他）
fn compare_values(a: Option<&serde_json::Value>, b: Option<&serde_json::Value>) -> Ordering {
    use serde_json::Value;

    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// 一次订阅请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// 集合名
    pub collection: String,
    /// 可选过滤条件
    pub filter: Option<Filter>,
    /// 可选排序
    pub order_by: Option<OrderBy>,
}

impl Query {
    pub fn collection(tag: impl Into<String>) -> Self {
        Self {
            collection: tag.into(),
            filter: None,
            order_by: None,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.order_by = Some(OrderBy::newest_first());
        self
    }

    /// 文档是否落在该查询的结果集内
    pub fn matches(&self, doc: &Document) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(doc))
    }
}

/// 快照回调
pub type SnapshotCallback = Box<dyn FnMut(SourceEvent) + Send>;

/// 订阅句柄。`dispose()` 之后保证不再有回调被执行：数据源在投递前
/// 检查释放标记，已入队但未执行的投递同样被拦截。
#[derive(Debug, Clone)]
pub struct Subscription {
    disposed: Arc<AtomicBool>,
}

impl Subscription {
    pub fn new() -> Self {
        Self {
            disposed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 释放订阅
    pub fn dispose(&self) {
        self.disposed.store(true, AtomicOrdering::SeqCst);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(AtomicOrdering::SeqCst)
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::new()
    }
}

/// 实时数据源
///
/// 订阅永远成功返回句柄；建立失败通过回调投递
/// `SourceEvent::Error(SubscriptionFailed)`。
pub trait DataSource: Send + Sync {
    fn subscribe(&self, query: Query, callback: SnapshotCallback) -> Subscription;
}
