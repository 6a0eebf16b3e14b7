pub mod config;
pub mod engine;
pub mod links;
pub mod lock;
pub mod managers;
pub mod markdown;
pub mod obsidian;
pub mod reminders;
pub mod report;
pub mod testing;

pub use config::{AppConfig, ConfigError, Settings, VaultConfig};
pub use engine::{Direction, EngineError, SyncEngine, SyncOptions, dedup_disposition_ops};
pub use links::{LinkStore, LinkStoreError};
pub use lock::{LockError, StoreLock};
pub use managers::{ManagerError, ObsidianManager, RemindersGateway};
pub use obsidian::MarkdownVault;
pub use reminders::OsascriptGateway;
pub use report::{ClusterMember, ClusterReport, FailureKind, OpFailure, SyncReport};
