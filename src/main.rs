use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;

use newsdesk::app::{App, ArticleRef, ListOptions, ListView};
use newsdesk::config::Config;
use newsdesk::feed::{NewsItem, StrategyKind};
use newsdesk::filter::available_sources;
use newsdesk::storage::{Database, DatabaseError};
use newsdesk::theme::ThemeVariant;
use newsdesk::ui::{self, ListEntry, Styler};
use newsdesk::util::validate_url_for_open;

/// Get the config directory path (~/.config/newsdesk/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("newsdesk"))
}

#[derive(Parser, Debug)]
#[command(name = "newsdesk", about = "Terminal news aggregator with reader mode")]
struct Args {
    /// Feed fetching strategy (overrides the config file)
    #[arg(long, value_enum, global = true)]
    strategy: Option<StrategyKind>,

    /// Config file (default: ~/.config/newsdesk/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Reset database (delete and recreate)
    #[arg(long)]
    reset_db: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch feeds and list articles
    List {
        /// Only show these sources (repeatable; overrides the saved selection)
        #[arg(long = "source", value_name = "NAME")]
        sources: Vec<String>,
        /// Only show saved articles
        #[arg(long)]
        saved: bool,
        /// Include ignored articles
        #[arg(long)]
        show_ignored: bool,
        /// List the last snapshot without fetching
        #[arg(long)]
        offline: bool,
        /// Show at most N articles
        #[arg(
            long,
            value_name = "N",
            value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
        )]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Show an article in reader mode
    Read {
        /// Article number from the last listing, or a link
        article: String,
        /// Bypass the content cache
        #[arg(long)]
        refresh: bool,
        #[arg(long)]
        json: bool,
    },
    /// Open an article in the browser
    Open { article: String },
    /// Save or unsave an article
    Save { article: String },
    /// Ignore or unignore an article
    Ignore { article: String },
    /// Show or change the source selection
    Sources {
        #[command(subcommand)]
        action: Option<SourcesAction>,
    },
    /// Manage feeds
    Feeds {
        #[command(subcommand)]
        action: Option<FeedsAction>,
    },
    /// Show or change the theme
    Theme {
        #[command(subcommand)]
        action: Option<ThemeAction>,
    },
    /// Reader cache maintenance
    Cache {
        #[command(subcommand)]
        action: Option<CacheAction>,
    },
    /// Clear every preference, saved and ignored article
    Reset,
}

#[derive(Subcommand, Debug)]
enum SourcesAction {
    /// Select or deselect one source
    Toggle { name: String },
    /// Replace the selection
    Set {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Show every source
    Clear,
}

#[derive(Subcommand, Debug)]
enum FeedsAction {
    List,
    /// Add feeds from an OPML file
    Import { file: PathBuf },
    /// Write feeds to an OPML file
    Export { file: PathBuf },
    /// Remove a feed by URL
    Remove { url: String },
}

#[derive(Subcommand, Debug)]
enum ThemeAction {
    Light,
    Dark,
    Toggle,
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    Stats,
    /// Delete every cached article (or only expired ones)
    Clear {
        #[arg(long)]
        expired: bool,
    },
}

/// A listed article in `--json` output.
#[derive(Serialize)]
struct JsonEntry<'a> {
    number: usize,
    saved: bool,
    ignored: bool,
    #[serde(flatten)]
    item: &'a NewsItem,
}

#[derive(Serialize)]
struct JsonListing<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    articles: Vec<JsonEntry<'a>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so command output stays pipeable.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        eprintln!("Created config directory: {}", config_dir.display());
    }

    // SEC-007: user-only access to the config directory
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(&config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    tracing::debug!(?config, "Configuration loaded");

    let db_path = config_dir.join("newsdesk.db");
    if args.reset_db && db_path.exists() {
        std::fs::remove_file(&db_path).context("Failed to delete database")?;
        eprintln!("Database reset.");
    }

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of newsdesk appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    let mut app = App::new(config, db)
        .await
        .context("Failed to create application")?;
    tracing::info!(strategy = %app.strategy_kind(), "Application ready");

    let json = matches!(
        args.command,
        Some(Command::List { json: true, .. }) | Some(Command::Read { json: true, .. })
    );
    let color = !json
        && !args.no_color
        && std::env::var_os("NO_COLOR").is_none()
        && std::io::stdout().is_terminal();

    let command = args.command.unwrap_or(Command::List {
        sources: Vec::new(),
        saved: false,
        show_ignored: false,
        offline: false,
        limit: None,
        json: false,
    });

    run(&mut app, command, color).await
}

async fn run(app: &mut App, command: Command, color: bool) -> Result<()> {
    let styler = Styler::new(app.prefs().theme(), color);
    let mut out = std::io::stdout().lock();

    match command {
        Command::List {
            sources,
            saved,
            show_ignored,
            offline,
            limit,
            json,
        } => {
            let view = app
                .list(&ListOptions {
                    sources,
                    saved_only: saved,
                    show_ignored,
                    offline,
                    limit,
                })
                .await?;
            if json {
                print_listing_json(&mut out, &view)?;
            } else {
                print_listing(&mut out, &view, &styler)?;
            }
        }
        Command::Read {
            article,
            refresh,
            json,
        } => {
            let link = app.resolve_ref(&ArticleRef::parse(&article)).await?;
            let outcome = app.read(&link, refresh).await?;
            if json {
                serde_json::to_writer_pretty(&mut out, &outcome.result)?;
                writeln!(out)?;
            } else {
                ui::render_article(&mut out, &outcome.result, &styler, ui::terminal_width())?;
                if outcome.from_cache {
                    tracing::info!(url = %link, "Served from cache");
                }
            }
        }
        Command::Open { article } => {
            let link = app.resolve_ref(&ArticleRef::parse(&article)).await?;
            let url = validate_url_for_open(&link).map_err(anyhow::Error::msg)?;
            open::that(url.as_str())
                .with_context(|| format!("Failed to open {} in the browser", url))?;
            writeln!(out, "Opened {}", url)?;
        }
        Command::Save { article } => {
            let link = app.resolve_ref(&ArticleRef::parse(&article)).await?;
            let saved = app.prefs().toggle_save_article(&link).await?;
            writeln!(out, "{} {}", if saved { "Saved" } else { "Unsaved" }, link)?;
        }
        Command::Ignore { article } => {
            let link = app.resolve_ref(&ArticleRef::parse(&article)).await?;
            let ignored = app.prefs().toggle_ignore_article(&link).await?;
            writeln!(
                out,
                "{} {}",
                if ignored { "Ignored" } else { "Unignored" },
                link
            )?;
        }
        Command::Sources { action } => {
            match action {
                None => {}
                Some(SourcesAction::Toggle { name }) => {
                    let selected = app.prefs_mut().toggle_source(&name).await?;
                    writeln!(
                        out,
                        "{} {}",
                        if selected { "Selected" } else { "Deselected" },
                        name
                    )?;
                }
                Some(SourcesAction::Set { names }) => {
                    app.prefs_mut().update_selected_sources(names).await?;
                }
                Some(SourcesAction::Clear) => {
                    app.prefs_mut().update_selected_sources(Vec::new()).await?;
                }
            }
            let snapshot = app.db().get_snapshot().await?;
            ui::render_sources(
                &mut out,
                &available_sources(&snapshot),
                app.prefs().selected_sources(),
                &styler,
            )?;
        }
        Command::Feeds { action } => match action.unwrap_or(FeedsAction::List) {
            FeedsAction::List => {
                ui::render_feeds(&mut out, &app.feeds().await?, &styler)?;
            }
            FeedsAction::Import { file } => {
                let (found, added) = app.import_opml(&file).await?;
                writeln!(
                    out,
                    "Imported {} of {} feeds from {}",
                    added,
                    found,
                    file.display()
                )?;
            }
            FeedsAction::Export { file } => {
                let count = app.export_opml(&file).await?;
                writeln!(out, "Exported {} feeds to {}", count, file.display())?;
            }
            FeedsAction::Remove { url } => {
                if !app.remove_feed(&url).await? {
                    bail!("No feed with URL {}", url);
                }
                writeln!(out, "Removed {}", url)?;
            }
        },
        Command::Theme { action } => {
            let theme = match action {
                None => app.prefs().theme(),
                Some(ThemeAction::Toggle) => app.prefs_mut().toggle_theme().await?,
                Some(ThemeAction::Light) => set_theme(app, ThemeVariant::Light).await?,
                Some(ThemeAction::Dark) => set_theme(app, ThemeVariant::Dark).await?,
            };
            writeln!(out, "Theme: {}", theme)?;
        }
        Command::Cache { action } => match action.unwrap_or(CacheAction::Stats) {
            CacheAction::Stats => {
                let stats = app.db().cache_stats().await?;
                writeln!(out, "Cached articles: {}", stats.total_entries)?;
                writeln!(out, "Expired:         {}", stats.expired_entries)?;
                writeln!(out, "Size:            {} bytes", stats.total_size_bytes)?;
                if let (Some(oldest), Some(newest)) = (&stats.oldest_entry, &stats.newest_entry) {
                    writeln!(out, "Oldest:          {}", oldest)?;
                    writeln!(out, "Newest:          {}", newest)?;
                }
                writeln!(out, "\nReader providers:")?;
                for (kind, until) in app.reader_status().await {
                    match until {
                        Some(until) => writeln!(
                            out,
                            "  {:<24} suppressed until {}",
                            kind.name(),
                            until.with_timezone(&chrono::Local).format("%H:%M:%S")
                        )?,
                        None => writeln!(out, "  {:<24} available", kind.name())?,
                    }
                }
            }
            CacheAction::Clear { expired } => {
                let removed = if expired {
                    app.db().evict_expired().await?
                } else {
                    app.db().clear_cache().await?
                };
                writeln!(out, "Removed {} cached articles", removed)?;
            }
        },
        Command::Reset => {
            app.prefs_mut().clear_all().await?;
            writeln!(out, "Preferences, saved and ignored articles cleared.")?;
        }
    }

    out.flush()?;
    Ok(())
}

async fn set_theme(app: &mut App, theme: ThemeVariant) -> Result<ThemeVariant> {
    app.prefs_mut().update_theme(theme).await?;
    Ok(theme)
}

fn print_listing<W: Write>(out: &mut W, view: &ListView, styler: &Styler) -> Result<()> {
    if let Some(message) = view.message() {
        writeln!(out, "{}", message)?;
        if view.visible.is_empty() {
            return Ok(());
        }
        writeln!(out)?;
    }

    let entries: Vec<ListEntry<'_>> = view
        .visible
        .iter()
        .map(|&i| {
            let item = &view.items[i];
            ListEntry {
                number: i + 1,
                item,
                saved: view.saved.contains(&item.link),
                ignored: view.ignored.contains(&item.link),
            }
        })
        .collect();
    ui::render_articles(out, &entries, styler, ui::terminal_width(), Utc::now())?;
    Ok(())
}

fn print_listing_json<W: Write>(out: &mut W, view: &ListView) -> Result<()> {
    let listing = JsonListing {
        message: view.message(),
        articles: view
            .visible
            .iter()
            .map(|&i| {
                let item = &view.items[i];
                JsonEntry {
                    number: i + 1,
                    saved: view.saved.contains(&item.link),
                    ignored: view.ignored.contains(&item.link),
                    item,
                }
            })
            .collect(),
    };
    serde_json::to_writer_pretty(&mut *out, &listing)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_limit_must_be_positive() {
        assert!(Args::try_parse_from(["newsdesk", "list", "--limit", "0"]).is_err());

        let args = Args::try_parse_from(["newsdesk", "list", "--limit", "5"]).unwrap();
        assert!(matches!(
            args.command,
            Some(Command::List { limit: Some(5), .. })
        ));
    }
}
