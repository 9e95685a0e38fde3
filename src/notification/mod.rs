//! 通知抽象层 - 格式化、投递与平台对接
//!
//! # 设计目标
//! 1. 单一渠道身份：前台与后台路径收敛到同一个渠道 ID
//! 2. 幂等设置：渠道创建/权限申请每进程一次，重入为空操作
//! 3. 失败隔离：展示失败、权限被拒都不致命，只进日志
//! 4. 平台解耦：展示端通过 `PlatformNotifier` trait 注入
//!
//! # 使用示例
//! ```ignore
//! use admin_notify::notification::{
//!     ChannelSpec, ConsoleNotifier, DeliveryChannelManager, NotificationDispatcher,
//! };
//! use std::sync::Arc;
//!
//! let delivery = Arc::new(
//!     DeliveryChannelManager::new(Arc::new(ConsoleNotifier), ChannelSpec::default())
//!         .with_topic("general"),
//! );
//! let dispatcher = NotificationDispatcher::new(delivery);
//! ```

pub mod delivery;
pub mod dispatcher;
pub mod formatter;
pub mod platform;

pub use delivery::{DeliveryChannelManager, RemoteMessage, SendResult, SetupState};
pub use dispatcher::NotificationDispatcher;
pub use formatter::{format_change, format_new_entry, FormattedNotification};
pub use platform::{
    ChannelSpec, ConsoleNotifier, Importance, NotificationRequest, PermissionStatus,
    PlatformNotifier,
};
