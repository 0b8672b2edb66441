//! # Seed Data Generator
//!
//! Populates the database with teams and members for development.
//!
//! ## Usage
//! ```bash
//! # Generate 100 members (default)
//! cargo run -p roster-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p roster-db --bin seed -- --count 1000
//!
//! # Specify database path (otherwise ROSTER_DB_PATH, then ./roster.db)
//! cargo run -p roster-db --bin seed -- --db ./data/roster.db
//! ```
//!
//! ## Generated Data
//! - Two teams: `teamA`, `teamB`
//! - Members `member1..=N`, ages cycling through 10..=40
//! - Members alternate between the teams; every fifth has no team

use roster_core::query::Sort;
use roster_core::{Field, Member, PageRequest, Team};
use roster_db::{Database, DbConfig};
use std::env;
use tracing_subscriber::EnvFilter;

const DEFAULT_COUNT: usize = 100;

/// Ages cycle through this many values starting at `BASE_AGE`.
const AGE_SPREAD: usize = 31;
const BASE_AGE: i32 = 10;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = DEFAULT_COUNT;
    let mut db_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(DEFAULT_COUNT);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Roster Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of members to generate (default: {DEFAULT_COUNT})");
                println!("  -d, --db <PATH>    Database file path (default: $ROSTER_DB_PATH or ./roster.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = DbConfig::from_env()?;
    if let Some(path) = db_path {
        config.database_path = path.into();
    }

    println!("Roster Seed Data Generator");
    println!("==========================");
    println!("Database: {}", config.database_path.display());
    println!("Members:  {}", count);
    println!();

    let db = Database::new(config).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.members().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} members", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let teams = [db.teams().save("teamA").await?, db.teams().save("teamB").await?];

    println!();
    println!("Generating members...");
    let start = std::time::Instant::now();
    let mut generated = 0;

    for idx in 0..count {
        let mut member = generate_member(idx, &teams)?;
        if let Err(e) = db.members().save(&mut member).await {
            eprintln!("Failed to insert {}: {}", member.username(), e);
            continue;
        }

        generated += 1;
        if generated % 500 == 0 {
            println!("  Generated {} members...", generated);
        }
    }

    println!();
    println!("✓ Generated {} members in {:?}", generated, start.elapsed());
    println!("  Teams:   {}", db.teams().count().await?);
    println!("  Members: {}", db.members().count().await?);

    // Sample the age lookup
    let request = PageRequest::of(0, 3).with_sort(Sort::desc(Field::Username));
    let page = db.members().find_by_age(BASE_AGE, request).await?;
    println!();
    println!(
        "Age {}: page 1 of {} ({} total)",
        BASE_AGE,
        page.total_pages(),
        page.total_elements
    );
    for member in &page.content {
        println!(
            "  #{:<5} {:<12} team {:?}",
            member.id().unwrap_or_default(),
            member.username(),
            member.team_id()
        );
    }

    let stats = db.engine().stats();
    println!();
    println!("✓ Seed complete! ({} statements)", stats.statements);

    Ok(())
}

/// Builds the `idx`-th member: ages cycle, teams alternate, every fifth
/// member has no team.
fn generate_member(idx: usize, teams: &[Team; 2]) -> Result<Member, Box<dyn std::error::Error>> {
    let username = format!("member{}", idx + 1);
    let age = BASE_AGE + i32::try_from(idx % AGE_SPREAD)?;

    let member = if idx % 5 == 4 {
        Member::new(username, age)?
    } else {
        Member::with_team(username, age, &teams[idx % 2])?
    };
    Ok(member)
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=roster=trace` - Show trace for roster crates only
/// - Default: INFO, with roster crates at DEBUG
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,roster=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();
}
