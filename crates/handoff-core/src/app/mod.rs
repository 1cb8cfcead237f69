//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせて handoff のロジックを実装します。
//!
//! # 主要コンポーネント
//! - **StagingStore**: 匿名の生成物を TTL 付きで保持（期限切れは読み出し時に削除）
//! - **SessionRegistry**: 匿名セッションの発行と破棄
//! - **IdentityTransitionDetector / RunGuard**: ログインの edge 検出と多重実行の防止
//! - **QuotaGate**: 件数の判定と消費（fail closed）
//! - **Reconciler**: staging から永続アカウントへの移送
//! - **HandoffCoordinator**: 上記を束ねる入口
//! - **HandoffBuilder**: 構築とワイヤリング

pub mod builder;
pub mod coordinator;
pub mod identity;
pub mod quota;
pub mod reconcile;
pub mod session;
pub mod staging;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, HandoffBuilder};
pub use self::coordinator::{HandoffCoordinator, TriggerOutcome};
pub use self::identity::{DetectorState, IdentityTransitionDetector, RunGuard, RunPermit, Transition};
pub use self::quota::QuotaGate;
pub use self::reconcile::Reconciler;
pub use self::session::SessionRegistry;
pub use self::staging::{LiveArtifacts, StagingStore};
