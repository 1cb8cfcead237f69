use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use handoff_core::app::{HandoffBuilder, TriggerOutcome};
use handoff_core::config::HandoffConfig;
use handoff_core::domain::{AccountId, Descriptor, Identity, QuotaState};
use handoff_core::impls::{
    InMemoryMetadataStore, InMemoryObjectStore, InMemoryQuotaBackend, StaticIdentityProvider,
};

const DEMO_ACCOUNT: &str = "demo-account";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // (A) 設定: 第 1 引数に TOML があれば読む
    let config = match std::env::args().nth(1) {
        Some(path) => HandoffConfig::load(&PathBuf::from(path))?,
        None => HandoffConfig::default(),
    };

    // (B) 外部 collaborator はすべて in-memory
    let account = AccountId::from(DEMO_ACCOUNT);
    let objects = Arc::new(InMemoryObjectStore::new("https://media.example.com"));
    let metadata = Arc::new(InMemoryMetadataStore::new());
    let quota = Arc::new(InMemoryQuotaBackend::new().with_account(account.clone(), QuotaState::free()));
    let identity = Arc::new(StaticIdentityProvider::anonymous());

    let coordinator = HandoffBuilder::new(config)
        .object_store(objects.clone())
        .metadata_store(metadata.clone())
        .quota_backend(quota.clone())
        .identity_provider(identity.clone())
        .build()?;

    // (C) 匿名のまま生成物を置く
    for (prompt, content_type) in [
        ("a lighthouse at dusk", "image/png"),
        ("isometric city block", "image/webp"),
    ] {
        let id = coordinator
            .stage(
                format!("<{prompt}>").into_bytes(),
                Descriptor::new(prompt, "images").with_content_type(content_type),
            )
            .await?;
        println!("staged: {id}");
    }
    println!("before login: {:?}", coordinator.poll().await?);

    // (D) ログイン → edge で reconciliation が走る
    identity.set(Identity::Authenticated(account.clone()));
    match coordinator.poll().await? {
        TriggerOutcome::Completed(outcome) => {
            println!("{}", outcome.summary());
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        other => println!("no run: {other:?}"),
    }

    // (E) 結果の確認
    for path in objects.paths().await {
        println!("object: {path}");
    }
    println!("records: {}", metadata.records_for(&account).await.len());
    if let Some(state) = quota.get(&account).await {
        println!("quota: {}", serde_json::to_string(&state)?);
    }
    Ok(())
}
