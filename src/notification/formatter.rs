//! 消息格式化模块 - 把新增条目变成用户可读的通知
//!
//! 四个被监听集合各有一条固定的格式化规则，字段缺失时落到文档化的
//! 占位文案上，绝不渲染出 "undefined" 之类的洞。

use crate::source::Fields;
use crate::watcher::ChangeEvent;

/// 占位文案
pub mod fallback {
    pub const SENDER: &str = "Unknown";
    pub const SUBJECT: &str = "No Subject";
    pub const CANDIDATE: &str = "Candidate";
    pub const ROLE: &str = "a position";
    pub const SUBSCRIBER: &str = "Someone";
    pub const JOB_TITLE: &str = "Job";
    pub const JOB_LOCATION: &str = "Unspecified";
}

/// 标题 + 正文
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedNotification {
    pub title: String,
    pub body: String,
}

/// 读取字符串字段，空串/缺失/非字符串都落到占位文案
fn text_or<'a>(fields: &'a Fields, key: &str, fallback: &'a str) -> &'a str {
    fields
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback)
}

/// 按集合格式化一条新增条目。未知集合返回 `None`。
pub fn format_new_entry(collection: &str, fields: &Fields) -> Option<FormattedNotification> {
    let (title, body) = match collection {
        "messages" => (
            "New Message Received 📩".to_string(),
            format!(
                "From: {}\n{}",
                text_or(fields, "name", fallback::SENDER),
                text_or(fields, "subject", fallback::SUBJECT),
            ),
        ),
        "applications" => (
            "New Job Application 📄".to_string(),
            format!(
                "{} applied for {}",
                text_or(fields, "fullName", fallback::CANDIDATE),
                text_or(fields, "role", fallback::ROLE),
            ),
        ),
        "subscribers" => (
            "New Subscriber! 🎉".to_string(),
            format!(
                "{} joined the newsletter.",
                text_or(fields, "email", fallback::SUBSCRIBER),
            ),
        ),
        "jobs" => (
            "New Job Posted 💼".to_string(),
            format!(
                "Position: {}\nLocation: {}",
                text_or(fields, "title", fallback::JOB_TITLE),
                text_or(fields, "location", fallback::JOB_LOCATION),
            ),
        ),
        _ => return None,
    };

    Some(FormattedNotification { title, body })
}

/// [`format_new_entry`] 的事件入口
pub fn format_change(event: &ChangeEvent) -> Option<FormattedNotification> {
    format_new_entry(&event.collection, &event.fields)
}
