//! JSONL 变更流数据源 - 跟踪 append-only 的集合变更日志
//!
//! 每行一条 JSON 变更记录。读取位置（字节偏移）在轮询之间保留，
//! 只解析新增的行；格式错误的行跳过并记录日志。

use super::memory::MemorySource;
use super::{ChangeKind, DataSource, Document, Fields, Query, SnapshotCallback, Subscription};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// 变更日志中的一条记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedRecord {
    /// 集合名
    pub collection: String,
    /// 变更类型
    pub kind: ChangeKind,
    /// 文档 ID
    pub id: String,
    /// 文档字段
    #[serde(default)]
    pub fields: Fields,
    /// 服务端时间戳（缺失时以读取时刻代替）
    pub timestamp: Option<DateTime<Utc>>,
}

impl FeedRecord {
    pub fn added(collection: impl Into<String>, id: impl Into<String>, fields: Fields) -> Self {
        Self {
            collection: collection.into(),
            kind: ChangeKind::Added,
            id: id.into(),
            fields,
            timestamp: Some(Utc::now()),
        }
    }
}

/// 追加一条记录到变更日志（生产侧，`adn emit` 使用）
pub fn append_record(path: &Path, record: &FeedRecord) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open feed {}", path.display()))?;
    let line = serde_json::to_string(record)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

/// JSONL 变更流数据源
///
/// 将日志中的记录按序应用到内部的 [`MemorySource`]，订阅与快照
/// 投递全部委托给它；本类型只负责文件跟踪。
pub struct JsonlSource {
    path: PathBuf,
    position: Mutex<u64>,
    store: MemorySource,
}

impl JsonlSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            position: Mutex::new(0),
            store: MemorySource::new(),
        }
    }

    /// 当前读取位置（字节偏移）
    pub fn position(&self) -> u64 {
        *self.position.lock().unwrap()
    }

    /// 读取并应用日志中的新记录，返回应用条数。
    ///
    /// 文件不存在视为空日志。首次调用会把既有内容全部读入 —
    /// 订阅放在这之后，历史记录就会落在首次快照里而不是被当作新增。
    pub fn poll_once(&self) -> Result<usize> {
        let records = self.read_new_records()?;
        let applied = records.len();
        for record in records {
            self.apply(record);
        }
        Ok(applied)
    }

    fn read_new_records(&self) -> Result<Vec<FeedRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut position = self.position.lock().unwrap();

        let file = File::open(&self.path)
            .with_context(|| format!("cannot open feed {}", self.path.display()))?;
        let file_len = file.metadata()?.len();

        // 没有新内容时直接返回
        if file_len <= *position {
            return Ok(Vec::new());
        }

        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(*position))?;

        let mut records = Vec::new();
        let mut current_pos = *position;

        for line in reader.lines() {
            let line = line?;
            current_pos += line.len() as u64 + 1; // +1 换行符

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<FeedRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed feed line");
                }
            }
        }

        *position = current_pos;
        Ok(records)
    }

    fn apply(&self, record: FeedRecord) {
        match record.kind {
            ChangeKind::Added => {
                let mut doc = Document::new(record.id, record.fields);
                if let Some(ts) = record.timestamp {
                    doc.created_at = ts;
                }
                self.store.add_document(&record.collection, doc);
            }
            ChangeKind::Modified => {
                if !self
                    .store
                    .update_document(&record.collection, &record.id, record.fields)
                {
                    debug!(
                        collection = %record.collection,
                        id = %record.id,
                        "Modified record for unknown document, skipped"
                    );
                }
            }
            ChangeKind::Removed => {
                if !self.store.remove_document(&record.collection, &record.id) {
                    debug!(
                        collection = %record.collection,
                        id = %record.id,
                        "Removed record for unknown document, skipped"
                    );
                }
            }
        }
    }
}

impl DataSource for JsonlSource {
    fn subscribe(&self, query: Query, callback: SnapshotCallback) -> Subscription {
        self.store.subscribe(query, callback)
    }
}
