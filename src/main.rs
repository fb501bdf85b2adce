//! TinySteps - command-line front end.
//!
//! Every command works offline against the local store. `sync` pushes
//! pending records to the configured remote.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tinysteps::activities::{MediaUpload, NewActivity};
use tinysteps::storage::config::{
    get_config_path, load_config, load_config_from, save_config, save_config_to,
};
use tinysteps::storage::EntityKind;
use tinysteps::sync::{HttpMediaStore, HttpRemoteStore, PassOutcome, SyncEngine};
use tinysteps::{AppConfig, AppServices, LocalStore, Reward, SystemClock};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "tinysteps")]
#[command(about = "TinySteps - childcare activity tracker", long_about = None)]
#[command(version)]
struct Cli {
    /// Owner id supplied by the identity provider
    #[arg(long, env = "TINYSTEPS_OWNER", global = true)]
    owner: Option<Uuid>,

    /// Use this directory instead of the platform data directory
    #[arg(long, env = "TINYSTEPS_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show points, level, streak and pending sync work
    Status,

    /// Log an activity
    Log {
        /// Activity kind id (e.g. reading, affection)
        kind: String,

        /// Duration in minutes
        #[arg(short, long, default_value = "0")]
        minutes: u32,

        /// Free-text note
        #[arg(short, long)]
        notes: Option<String>,

        /// Photo or clip to attach
        #[arg(long)]
        media: Option<PathBuf>,
    },

    /// Spend points on a reward
    Redeem {
        /// Reward id from the partner catalog
        reward_id: String,

        /// Display name of the reward
        #[arg(long)]
        name: String,

        /// Point cost
        #[arg(long)]
        cost: u32,

        /// Days until the redemption expires
        #[arg(long, default_value = "30")]
        days: u32,
    },

    /// Push pending records to the remote store
    Sync {
        /// Also pull remote records missing locally
        #[arg(long)]
        restore: bool,
    },

    /// Erase all local data for the owner
    SignOut {
        /// Erase even if some records were never synced
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    tracing::debug!("Starting TinySteps v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.data_dir {
        Some(dir) => {
            let path = dir.join("config.toml");
            let config = load_config_from(&path, dir.clone())?;
            if !path.exists() {
                save_config_to(&config, &path)?;
            }
            config
        }
        None => {
            let config = load_config()?;
            if !get_config_path().exists() {
                save_config(&config)?;
                tracing::info!("Wrote default config to {}", get_config_path().display());
            }
            config
        }
    };
    let owner = cli
        .owner
        .context("No owner id; pass --owner or set TINYSTEPS_OWNER")?;

    let store = LocalStore::open(&config.database_path())
        .with_context(|| format!("Opening {}", config.database_path().display()))?;
    let services = AppServices::new(
        store.clone(),
        Arc::new(SystemClock),
        config.calendar.zone()?,
        None,
    );
    // A restore signs in after pulling, so the remote aggregate wins.
    if !matches!(cli.command, Commands::Sync { restore: true }) {
        services.accounts.sign_in(owner, None)?;
    }

    match cli.command {
        Commands::Status => status(&services, owner)?,
        Commands::Log {
            kind,
            minutes,
            notes,
            media,
        } => log_activity(&services, owner, &kind, minutes, notes, media.as_deref())?,
        Commands::Redeem {
            reward_id,
            name,
            cost,
            days,
        } => {
            let reward = Reward::new(&reward_id, &name, cost).valid_for_days(days);
            let redemption = services.rewards.redeem_reward(owner, &reward)?;
            println!(
                "Redeemed {} for {} points. Code: {} (expires {})",
                redemption.reward_name,
                redemption.points_spent,
                redemption.code,
                redemption.expires_at.format("%Y-%m-%d")
            );
        }
        Commands::Sync { restore } => sync(&config, &services, owner, restore).await?,
        Commands::SignOut { force } => {
            let pending: u64 = EntityKind::ALL
                .iter()
                .map(|kind| store.count_unsynced(*kind))
                .sum::<Result<u64, _>>()?;
            if pending > 0 && !force {
                bail!(
                    "{} records have not been synced; run `tinysteps sync` or pass --force",
                    pending
                );
            }
            let summary = services.accounts.sign_out(owner)?;
            println!("Signed out, removed {} local rows", summary.total());
        }
    }

    Ok(())
}

fn status(services: &AppServices, owner: Uuid) -> Result<()> {
    let user = services.accounts.user(owner)?;
    let today = services.points.today();

    println!(
        "{}",
        user.display_name.as_deref().unwrap_or("TinySteps caregiver")
    );
    println!("  Points:     {}", user.points);
    println!("  Level:      {}", user.level);
    println!("  Streak:     {} days", user.current_streak(today));
    println!("  Activities: {}", user.total_activities);

    println!("Today's capped activities:");
    for definition in services.points.catalog().iter() {
        if definition.rule.daily_cap().is_none() {
            continue;
        }
        let limit = services.points.check_daily_limit(owner, &definition.id)?;
        println!(
            "  {:<16} {} earned, {} left",
            definition.name,
            limit.earned_today,
            limit.remaining_points.unwrap_or(0)
        );
    }

    let unlocked = services.achievements.unlocked(owner)?;
    if !unlocked.is_empty() {
        println!("Achievements:");
        for unlock in unlocked {
            println!("  {}", unlock.title);
        }
    }

    services.rewards.expire_stale(owner)?;
    let open: Vec<_> = services
        .rewards
        .list(owner)?
        .into_iter()
        .filter(|r| r.status.is_open())
        .collect();
    if !open.is_empty() {
        println!("Open redemptions:");
        for redemption in open {
            println!(
                "  {} {} ({}, expires {})",
                redemption.code,
                redemption.reward_name,
                redemption.status,
                redemption.expires_at.format("%Y-%m-%d")
            );
        }
    }

    if let Some(assessment) = services.assessments.latest(owner)? {
        println!("Latest EQ assessment: {}/100", assessment.overall_score);
        let focus: Vec<&str> = assessment
            .focus_areas()
            .iter()
            .map(|c| c.display_name())
            .collect();
        if !focus.is_empty() {
            println!("  Focus on: {}", focus.join(", "));
        }
    }

    let mut pending = Vec::new();
    for kind in EntityKind::ALL {
        let count = services.store.count_unsynced(kind)?;
        if count > 0 {
            pending.push(format!("{} {}", count, kind));
        }
    }
    if pending.is_empty() {
        println!("Everything synced");
    } else {
        println!("Waiting to sync: {}", pending.join(", "));
    }
    Ok(())
}

fn log_activity(
    services: &AppServices,
    owner: Uuid,
    kind: &str,
    minutes: u32,
    notes: Option<String>,
    media: Option<&Path>,
) -> Result<()> {
    let mut input = NewActivity::minutes(owner, kind, minutes);
    input.notes = notes;
    if let Some(path) = media {
        let data = std::fs::read(path).with_context(|| format!("Reading {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "media".to_string());
        input = input.with_media(MediaUpload {
            content_type: content_type_for(path).to_string(),
            file_name,
            data,
        });
    }

    let record = services.activities.save_activity(input)?;
    let user = services.accounts.user(owner)?;

    if record.is_attempt() {
        println!("Logged {} as an attempt (too short to earn points)", kind);
    } else {
        println!("Logged {}: +{} points", kind, record.points_awarded);
    }
    println!(
        "Total {} points, level {}, streak {}",
        user.points, user.level, user.streak
    );
    Ok(())
}

fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "heic" => "image/heic",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}

async fn sync(
    config: &AppConfig,
    services: &AppServices,
    owner: Uuid,
    restore: bool,
) -> Result<()> {
    let Some(remote_url) = config.sync.remote_url.as_deref() else {
        bail!(
            "No remote configured; set sync.remote_url in {}",
            get_config_path().display()
        );
    };
    let media_url = config
        .sync
        .media_url
        .clone()
        .unwrap_or_else(|| format!("{}/media", remote_url.trim_end_matches('/')));

    let timeout = config.sync.request_timeout();
    let engine = SyncEngine::new(
        services.store.clone(),
        HttpRemoteStore::new(remote_url, timeout)?,
        HttpMediaStore::new(&media_url, timeout)?,
        config.sync.clone(),
    );

    if restore {
        let restored = engine.restore_owner(owner).await?;
        println!(
            "Restored {} records from the remote",
            restored.values().sum::<usize>()
        );
        services.accounts.sign_in(owner, None)?;
    }

    match engine.force_sync().await {
        PassOutcome::Completed(report) => {
            println!(
                "Pushed {} records, uploaded {} media files",
                report.pushed, report.media_uploaded
            );
            if !report.is_clean() {
                println!(
                    "{} records and {} media files failed; they will be retried",
                    report.failed, report.media_failed
                );
            }
        }
        PassOutcome::Skipped(reason) => println!("Sync skipped: {:?}", reason),
    }

    let status = engine.status()?;
    for note in &status.recent_errors {
        tracing::warn!("{} {:?}: {}", note.kind, note.record_id, note.message);
    }
    Ok(())
}
