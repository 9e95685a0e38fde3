//! Admin Notify - 管理后台的实时通知与徽章计数子系统
//!
//! 监听若干实时文档集合，识别订阅之后真正新增的条目并展示通知，
//! 同时维护由过滤计数驱动的徽章水位。数据库、推送运输与界面渲染
//! 都是外部协作方，以 trait 注入。

pub mod badge;
pub mod config;
pub mod detector;
pub mod notification;
pub mod service;
pub mod source;
pub mod watcher;

pub use badge::{default_definitions, BadgeAggregator, BadgeDefinition, BadgeState};
pub use config::AppConfig;
pub use detector::NewEntryDetector;
pub use notification::{
    ChannelSpec, ConsoleNotifier, DeliveryChannelManager, NotificationDispatcher,
    NotificationRequest, PermissionStatus, PlatformNotifier, RemoteMessage, SendResult,
    SetupState,
};
pub use service::{NotifyService, WATCHED_COLLECTIONS};
pub use source::jsonl::{append_record, FeedRecord, JsonlSource};
pub use source::memory::MemorySource;
pub use source::{
    ChangeKind, DataSource, DocChange, Document, Fields, Filter, OrderBy, Query, RawSnapshot,
    SnapshotCallback, SourceError, SourceEvent, Subscription,
};
pub use watcher::{ChangeBatch, ChangeEvent, CollectionWatcher, WatchEvent, WatcherHandle};
