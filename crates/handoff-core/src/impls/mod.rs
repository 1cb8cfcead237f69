//! Impls - ports の実装（開発用・テスト用 + ローカル永続化）
//!
//! # 含まれる実装
//! - **InMemoryStagingBackend / FsStagingBackend**: staging 置き場
//! - **InMemorySessionSlot / FsSessionSlot**: 匿名セッションの保存先
//! - **InMemoryObjectStore / InMemoryMetadataStore / InMemoryQuotaBackend**: 外部 collaborator の代役
//! - **StaticIdentityProvider**: identity の差し替え
//! - **FaultPlan**: in-memory 実装に失敗を注入する
//!
//! 本番の collaborator（S3, RDB, billing）は別クレートで ports を実装します。

pub mod collaborators;
pub mod faults;
pub mod fs_staging;
pub mod inmem_staging;
pub mod session_slots;

// 主要な型を再エクスポート
pub use self::collaborators::{
    InMemoryMetadataStore, InMemoryObjectStore, InMemoryQuotaBackend, StaticIdentityProvider,
    StoredObject,
};
pub use self::faults::FaultPlan;
pub use self::fs_staging::FsStagingBackend;
pub use self::inmem_staging::InMemoryStagingBackend;
pub use self::session_slots::{FsSessionSlot, InMemorySessionSlot};
