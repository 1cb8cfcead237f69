//! handoff-core
//!
//! Anonymous-to-authenticated handoff: work produced before sign-in is staged
//! locally, then moved into the account exactly once when the user signs in.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, artifact, session, quota, identity, record, outcome, errors）
//! - **ports**: 抽象化レイヤー（StagingBackend, SessionSlot, ObjectStore, MetadataStore, QuotaBackend, IdentityProvider, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（staging, session, identity, quota, reconcile, coordinator, builder）
//! - **impls**: 実装（in-memory の collaborator、ファイルベースの staging / session）
//! - **config**: TOML + 環境変数の設定

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
