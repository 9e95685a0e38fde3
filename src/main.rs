//! Admin Notify CLI
//!
//! 对着 JSONL 变更流运行通知/徽章子系统，或查看当前计数。

use admin_notify::{
    append_record, AppConfig, BadgeAggregator, BadgeState, ChangeKind, ConsoleNotifier,
    DeliveryChannelManager, FeedRecord, JsonlSource, NotifyService,
};
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "adn")]
#[command(about = "Admin Notify - 管理后台的实时通知与徽章计数")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 监听变更流并展示通知
    Watch {
        /// JSONL 变更流路径
        #[arg(long, short)]
        feed: PathBuf,
        /// 轮询间隔（秒）
        #[arg(long, short, default_value = "2")]
        interval: u64,
    },
    /// 读取变更流并打印当前徽章计数
    Counts {
        /// JSONL 变更流路径
        #[arg(long, short)]
        feed: PathBuf,
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 往变更流追加一条记录（生产侧，演示/测试用）
    Emit {
        /// JSONL 变更流路径
        #[arg(long, short)]
        feed: PathBuf,
        /// 集合名
        #[arg(long, short)]
        collection: String,
        /// 文档 ID（缺省自动生成）
        #[arg(long)]
        id: Option<String>,
        /// 文档字段（JSON 对象）
        #[arg(long, short, default_value = "{}")]
        data: String,
        /// 变更类型 (added/modified/removed)
        #[arg(long, short, default_value = "added")]
        kind: String,
    },
}

fn print_counts(state: &BadgeState) {
    let mut names: Vec<&String> = state.keys().collect();
    names.sort();
    println!("📊 Badge counts:");
    for name in names {
        println!("   {} = {}", name, state[name]);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 通过 RUST_LOG 控制日志级别，默认 info
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("admin_notify=info,adn=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Watch { feed, interval } => {
            use std::time::Duration;
            use tokio::time::sleep;

            let config = AppConfig::load()?;
            let source = JsonlSource::new(&feed);

            // 先读入既有记录：历史落在首次快照里，不会当作新增通知
            let existing = source.poll_once()?;

            let mut delivery =
                DeliveryChannelManager::new(Arc::new(ConsoleNotifier), config.channel.clone());
            if let Some(ref topic) = config.topic {
                delivery = delivery.with_topic(topic.clone());
            }
            let service = NotifyService::start(
                &source,
                Arc::new(delivery),
                &config.collections,
                config.badges.clone(),
            );

            println!(
                "👀 Watching {} collections from {} ({} existing records)",
                config.collections.len(),
                feed.display(),
                existing
            );
            println!("Press Ctrl+C to stop\n");

            let mut last_state = service.badge_state();
            print_counts(&last_state);

            // 连续错误计数器：流持续读不动就退出
            let mut consecutive_errors = 0;
            const MAX_CONSECUTIVE_ERRORS: u32 = 10;

            loop {
                sleep(Duration::from_secs(interval)).await;

                match source.poll_once() {
                    Ok(0) => {
                        consecutive_errors = 0;
                    }
                    Ok(applied) => {
                        consecutive_errors = 0;
                        debug!(applied, "Feed records applied");

                        let state = service.badge_state();
                        if state != last_state {
                            print_counts(&state);
                            last_state = state;
                        }
                    }
                    Err(e) => {
                        consecutive_errors += 1;
                        error!(
                            error = %e,
                            consecutive = consecutive_errors,
                            max = MAX_CONSECUTIVE_ERRORS,
                            "Feed poll failed"
                        );
                        if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                            error!("Too many consecutive errors, stopping");
                            service.dispose();
                            break;
                        }
                    }
                }
            }
        }
        Commands::Counts { feed, json } => {
            let config = AppConfig::load()?;
            let source = JsonlSource::new(&feed);
            source.poll_once()?;

            let badges = BadgeAggregator::watch(&source, config.badges.clone());
            let state = badges.state();

            if json {
                println!("{}", serde_json::to_string_pretty(&state)?);
            } else {
                print_counts(&state);
            }
            badges.dispose();
        }
        Commands::Emit {
            feed,
            collection,
            id,
            data,
            kind,
        } => {
            let kind = match kind.as_str() {
                "added" => ChangeKind::Added,
                "modified" => ChangeKind::Modified,
                "removed" => ChangeKind::Removed,
                other => return Err(anyhow!("unknown change kind: {}", other)),
            };

            let fields = match serde_json::from_str::<serde_json::Value>(&data)? {
                serde_json::Value::Object(map) => map,
                _ => return Err(anyhow!("--data must be a JSON object")),
            };

            let id = id.unwrap_or_else(|| {
                format!("{}-{}", collection, chrono::Utc::now().timestamp_millis())
            });

            let record = FeedRecord {
                collection,
                kind,
                id: id.clone(),
                fields,
                timestamp: Some(chrono::Utc::now()),
            };
            append_record(&feed, &record)?;
            println!("已追加记录: {} -> {}", id, feed.display());
        }
    }

    Ok(())
}
