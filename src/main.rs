use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use combo_meta::api::board::{run_pass, DisplayOptions, Page, RenderModel};
use combo_meta::api::build_router;
use combo_meta::api::state::AppState;
use combo_meta::config::AppConfig;
use combo_meta::fetch::{FetcherConfig, SheetLoader};
use combo_meta::models::{
    resolve_pass, ControlOverrides, FinishTier, GroupKey, NavParams, Period, View,
};

#[derive(Parser)]
#[command(name = "combo-meta")]
#[command(about = "Beyblade combo usage leaderboards from a shared spreadsheet")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); defaults to the config value
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Override the spreadsheet URL
    #[arg(long)]
    sheet_url: Option<String>,

    /// Override the results tab name
    #[arg(long)]
    tab: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Log every HTTP request
        #[arg(long)]
        access_log: bool,
    },

    /// Print a usage leaderboard
    Leaderboard {
        /// combo, blade, ratchet or bit
        #[arg(long, value_parser = parse_mode)]
        mode: Option<GroupKey>,

        /// 1st, top3 or all
        #[arg(long, value_parser = parse_finish)]
        finish: Option<FinishTier>,

        /// 1m, 3m or 6m
        #[arg(long, value_parser = parse_period)]
        period: Option<Period>,

        /// Hide entries used fewer times than this
        #[arg(long)]
        min_usage: Option<usize>,

        /// Include part image URLs
        #[arg(long)]
        images: bool,
    },

    /// Print every result behind one leaderboard entry
    Detail {
        #[arg(long, value_parser = parse_mode)]
        mode: GroupKey,

        /// Exact leaderboard label, e.g. "Wizard Rod 9-60 Ball"
        #[arg(long)]
        item: String,

        #[arg(long, value_parser = parse_finish)]
        finish: Option<FinishTier>,

        #[arg(long, value_parser = parse_period)]
        period: Option<Period>,
    },

    /// Run one render pass from a query string and print the JSON model
    Render {
        /// Navigation query, e.g. "view=detail&mode=bit&item=Ball"
        #[arg(long, default_value = "")]
        query: String,

        #[arg(long, value_parser = parse_view)]
        view: Option<View>,

        #[arg(long, value_parser = parse_mode)]
        mode: Option<GroupKey>,

        #[arg(long, value_parser = parse_finish)]
        finish: Option<FinishTier>,

        #[arg(long, value_parser = parse_period)]
        period: Option<Period>,
    },

    /// Print the results tab as exported
    Raw {
        /// Maximum number of records to print
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn parse_mode(s: &str) -> Result<GroupKey, String> {
    GroupKey::from_slug(s).ok_or_else(|| format!("expected combo, blade, ratchet or bit, got {}", s))
}

fn parse_finish(s: &str) -> Result<FinishTier, String> {
    FinishTier::from_slug(s).ok_or_else(|| format!("expected 1st, top3 or all, got {}", s))
}

fn parse_period(s: &str) -> Result<Period, String> {
    Period::from_slug(s).ok_or_else(|| format!("expected 1m, 3m or 6m, got {}", s))
}

fn parse_view(s: &str) -> Result<View, String> {
    View::from_slug(s).ok_or_else(|| format!("expected home or detail, got {}", s))
}

fn init_tracing(level: &str, json_logs: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    if let Some(url) = cli.sheet_url {
        config.sheet.url = url;
    }
    if let Some(tab) = cli.tab {
        config.sheet.main_tab = tab;
    }

    init_tracing(
        cli.log_level.as_deref().unwrap_or(&config.log_level),
        cli.json_logs,
    );
    tracing::info!("Starting combo-meta v{}", env!("CARGO_PKG_VERSION"));

    let loader = SheetLoader::http(&FetcherConfig {
        cache_ttl: config.cache.sheet_ttl(),
        timeout: config.cache.request_timeout(),
        ..Default::default()
    })?;
    let state = AppState::new(&config, loader);
    let now = chrono::Local::now().naive_local();

    match cli.command {
        Commands::Serve {
            host,
            port,
            access_log,
        } => {
            let mut app = build_router(state, &config.server.cors_origin);
            if access_log {
                app = app.layer(TraceLayer::new_for_http());
            }
            let addr = format!(
                "{}:{}",
                host.unwrap_or(config.server.host),
                port.unwrap_or(config.server.port)
            );
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("Leaderboard API: http://{}/api/board", addr);
            axum::serve(listener, app).await?;
        }
        Commands::Leaderboard {
            mode,
            finish,
            period,
            min_usage,
            images,
        } => {
            let controls = ControlOverrides {
                view: Some(View::Home),
                mode,
                finish,
                period,
            };
            let pass = resolve_pass(&NavParams::default(), &controls);
            let options = DisplayOptions {
                min_usage: min_usage.unwrap_or(state.min_usage),
                show_images: images || state.show_images,
            };
            let model = run_pass(&state, &pass, &options, now).await?;
            print_model(&model);
        }
        Commands::Detail {
            mode,
            item,
            finish,
            period,
        } => {
            let read = NavParams {
                item: Some(item),
                ..Default::default()
            };
            let controls = ControlOverrides {
                view: Some(View::Detail),
                mode: Some(mode),
                finish,
                period,
            };
            let pass = resolve_pass(&read, &controls);
            let model = run_pass(&state, &pass, &DisplayOptions::default(), now).await?;
            print_model(&model);
        }
        Commands::Render {
            query,
            view,
            mode,
            finish,
            period,
        } => {
            let controls = ControlOverrides {
                view,
                mode,
                finish,
                period,
            };
            let pass = resolve_pass(&NavParams::from_query(&query), &controls);
            if pass.changed {
                tracing::debug!("Canonical query: {}", pass.canonical.to_query());
            }
            let options = DisplayOptions {
                min_usage: state.min_usage,
                show_images: state.show_images,
            };
            let model = run_pass(&state, &pass, &options, now).await?;
            println!("{}", serde_json::to_string_pretty(&model)?);
        }
        Commands::Raw { limit } => {
            let table = state
                .loader
                .load(&state.sheet.url, &state.sheet.main_tab)
                .await?;
            let shown = limit.unwrap_or(table.len()).min(table.len());

            println!("\n=== Raw data: {} ({} rows) ===", state.sheet.main_tab, table.len());
            println!("{}", table.headers.join(" | "));
            for record in table.records.iter().take(shown) {
                println!("{}", record.join(" | "));
            }
            if shown < table.len() {
                println!("... {} more rows", table.len() - shown);
            }
        }
    }

    Ok(())
}

fn print_model(model: &RenderModel) {
    match &model.page {
        Page::Home {
            heading,
            total,
            leaderboard,
            notice,
        } => {
            println!(
                "\n=== {}: {} ({}, {}) ===",
                heading, model.labels.mode, model.labels.finish, model.labels.period
            );
            println!("Results counted: {}", total);
            println!();
            for (rank, row) in leaderboard.iter().enumerate() {
                println!(
                    "{:>3}. {:<45} {:>5} {:>7}",
                    rank + 1,
                    row.label,
                    row.usage,
                    row.share_display
                );
                if let Some(image) = &row.image {
                    println!("     {}", image);
                }
            }
            if let Some(notice) = notice {
                println!("{}", notice);
            }
        }
        Page::Detail {
            heading,
            usage,
            share_display,
            rows,
            notice,
            ..
        } => {
            println!("\n=== {} ===", heading);
            println!("Usage: {} ({})", usage, share_display);
            println!();
            for row in rows {
                println!(
                    "{:<12} {:<30} {:>4} {:<16} {}",
                    row.date.as_deref().unwrap_or("-"),
                    row.event.as_deref().unwrap_or("-"),
                    row.placement
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    row.username.as_deref().unwrap_or("-"),
                    row.combo
                );
            }
            if let Some(notice) = notice {
                println!("{}", notice);
            }
        }
    }

    for note in &model.notes {
        println!("Note: {}", note);
    }
    println!("\nData version: {}", model.data_version);
}
