//! A theme switch persisted to a directory on disk.
//!
//! Run it twice: the second run starts from the theme the first one saved.

use larder::runtime::Scope;
use larder::{FileStorage, LocalStore};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Theme Toggle ===\n");

    let storage = FileStorage::open(std::env::temp_dir().join("larder-theme-demo"))?;
    let scope = Scope::new();

    // Stores created inside the scope wait for mount before reading storage
    let theme = scope.run(|| LocalStore::new("theme", "light".to_string(), storage.clone()));
    let _sub = theme.subscribe(|t| println!("   [theme] now {t}"));

    println!("1. Before mount: {}", theme.get());
    scope.mount();
    println!("2. After mount:  {}", theme.get());

    let next = if theme.get() == "light" { "dark" } else { "light" };
    println!("\n3. Toggling to {next}");
    theme.set(next.to_string());

    println!("\n4. Saved under {}", storage.dir().display());
    Ok(())
}
