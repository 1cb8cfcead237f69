//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」を定義します。
//! 外部 collaborator（オブジェクトストア、メタデータ DB、quota backend、identity provider）と
//! ローカルの保存先（staging, session）は、すべてここの trait 越しに使います。
//!
//! # 設計原則
//! - 正本（アカウント、quota、永続オブジェクト）は外部にある
//! - staging と匿名セッションはローカルにだけ存在し、外部と共有しない
//! - 時刻と ID 生成も port にして、テストで差し替えられるようにする

pub mod clock;
pub mod id_generator;
pub mod identity_provider;
pub mod metadata_store;
pub mod object_store;
pub mod quota_backend;
pub mod session_slot;
pub mod staging_backend;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::identity_provider::IdentityProvider;
pub use self::metadata_store::MetadataStore;
pub use self::object_store::ObjectStore;
pub use self::quota_backend::QuotaBackend;
pub use self::session_slot::SessionSlot;
pub use self::staging_backend::StagingBackend;
