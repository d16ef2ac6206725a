//! Query editor state kept in an asynchronous database.

use larder::runtime::Scope;
use larder::{AsyncBackend, DbStore, LoadState, MemoryDatabase, Preset, StoreOptions};
use std::time::Duration;

static DEFAULT_QUERY: Preset<String> = Preset::new(|| {
    "select\n  playlist.name,\n  count(track.track_id)\nfrom playlist\ngroup by 1\norder by 2 desc"
        .to_string()
});

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Query History ===\n");

    let db = MemoryDatabase::new();
    db.set("explorer:history", "[\"select 1\"]".to_string()).await?;
    db.set("explorer:layout", "{oops".to_string()).await?;
    let slow = db.with_latency(Duration::from_millis(30));
    let options = StoreOptions::new().with_namespace("explorer");

    let scope = Scope::new();
    let (query, history, layout) = scope.run(|| {
        (
            DbStore::with_options("query", DEFAULT_QUERY.get().clone(), slow.clone(), options.clone()),
            DbStore::with_options("history", Vec::<String>::new(), slow.clone(), options.clone()),
            DbStore::with_options("layout", vec![240u32, 600], slow.clone(), options.clone()),
        )
    });
    let _sub = history.subscribe_load_state(|s| println!("   [history] {s}"));

    println!("1. Mounting");
    scope.mount();
    query.settled().await;
    history.settled().await;
    layout.settled().await;

    println!("\n2. After hydration");
    println!("   query:   {} ({})", query.get().lines().next().unwrap_or(""), query.load_state());
    println!("   history: {:?} ({})", history.get(), history.load_state());
    println!("   layout:  {:?} ({})", layout.get(), layout.load_state());
    if layout.load_state() == LoadState::LoadFailed {
        println!("   layout entry is corrupt, keeping defaults");
    }

    println!("\n3. Running a query");
    query.set("select name from artist".to_string());
    history.update(|h| h.push(query.get()));
    history.flush().await;
    query.flush().await;

    println!("\n4. Stored history: {:?}", db.get("explorer:history").await?);
    println!("\n5. Clearing the database");
    db.clear().await?;
    history.reload().await;
    println!("   history in memory: {:?}", history.get());

    Ok(())
}
