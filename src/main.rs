use anyhow::{bail, Context, Result};
use std::env;
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};

use vehicle_certificate::{create_user, import_owners, load_csv, Config, EntityKind, Stores};

const USAGE: &str = "usage: certificate [migrate | import <file.csv> | create-user <username> <password>]";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    // The TUI owns the terminal, so keep logging quiet unless asked for
    let default_level = if args.len() > 1 { "info" } else { "warn" };
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load().context("Failed to load configuration")?;

    match args.get(1).map(String::as_str) {
        Some("migrate") => run_migrate(&config),
        Some("import") => match args.get(2) {
            Some(csv_path) => run_import(&config, Path::new(csv_path)),
            None => bail!(USAGE),
        },
        Some("create-user") => match (args.get(2), args.get(3)) {
            (Some(username), Some(password)) => run_create_user(&config, username, password),
            _ => bail!(USAGE),
        },
        Some(other) => bail!("unknown command '{}'\n{}", other, USAGE),
        None => run_ui_mode(&config),
    }
}

fn open_stores(config: &Config) -> Result<Stores> {
    Stores::open(&config.primary_db, &config.secondary_db, config.routing.clone())
        .context("Failed to open databases")
}

fn run_migrate(config: &Config) -> Result<()> {
    println!("🔧 Setting up databases...");
    let stores = open_stores(config)?;

    println!("✓ Primary:   {} ({} owners)", config.primary_db.display(), stores.primary.count_owners()?);
    println!("✓ Secondary: {} ({} owners)", config.secondary_db.display(), stores.secondary.count_owners()?);
    Ok(())
}

fn run_import(config: &Config, csv_path: &Path) -> Result<()> {
    println!("📂 Loading {}...", csv_path.display());
    let forms = load_csv(csv_path).context("Failed to read CSV file")?;
    println!("✓ Read {} rows", forms.len());

    let stores = open_stores(config)?;
    let target = stores.routing.store_for(EntityKind::Owner);

    println!("💾 Importing into {} store...", target);
    let summary = import_owners(&stores, &forms)?;

    println!("✓ Inserted: {} owners", summary.inserted);
    if summary.rejected > 0 {
        println!("⚠️  Rejected: {} rows (see log for details)", summary.rejected);
    }
    Ok(())
}

fn run_create_user(config: &Config, username: &str, password: &str) -> Result<()> {
    let stores = open_stores(config)?;
    let user = create_user(&stores, username, password).context("Failed to create user")?;

    println!("✓ Created user '{}' (id {})", user.username, user.id);
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &Config) -> Result<()> {
    use vehicle_certificate::ui;

    println!("🖥️  Loading certificate records...\n");
    let stores = open_stores(config)?;

    let mut app = ui::App::new(&stores)?;
    println!("✓ Loaded {} records\n", app.owners.len());

    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &Config) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or run the web server: cargo run --bin certificate-server --features server");
    std::process::exit(1);
}
