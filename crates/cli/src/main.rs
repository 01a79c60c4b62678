use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lifetools_core::config::Settings;
use lifetools_core::language::AppLanguage;
use lifetools_core::llm::gemini::GeminiClient;
use lifetools_core::recipe::{Participant, RecipeChat};
use lifetools_core::recommend::{ContentType, MediaCriteria, RecommendationRecord};
use lifetools_core::spinner::{SpinnerSession, WedgeSet};
use lifetools_core::tip::DayPart;
use lifetools_core::update::ReleaseClient;

#[derive(Debug, Parser)]
#[command(name = "lifetools", version)]
struct Args {
    /// Answer language (`tr` or `en`). Defaults to LIFETOOLS_LANGUAGE.
    #[arg(long, global = true)]
    lang: Option<String>,

    /// Print JSON instead of plain text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Spin a wheel over the given items and print the winner.
    Spin {
        #[arg(long = "item", required = true)]
        items: Vec<String>,

        /// Seed for a reproducible spin.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Ask the model for movie or series suggestions.
    Movies {
        #[arg(long)]
        series: bool,

        #[arg(long = "genre")]
        genres: Vec<String>,

        #[arg(long)]
        year: Option<String>,

        #[arg(long = "platform")]
        platforms: Vec<String>,

        /// Just one suggestion for tonight.
        #[arg(long)]
        single: bool,
    },
    /// Recipe ideas for the ingredients you have.
    Recipe { ingredients: String },
    /// Truth-or-dare questions.
    Truth {
        #[arg(long)]
        single: bool,
    },
    /// Tip of the day for the current time of day.
    Tip {
        /// Override the local hour (0-23).
        #[arg(long)]
        hour: Option<u32>,
    },
    /// Compare the running version with the latest GitHub release.
    CheckUpdate {
        /// Download the release package here when an update is available.
        #[arg(long)]
        download: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let language = match args.lang.as_deref() {
        Some(code) => AppLanguage::from_code(Some(code)),
        None => settings.language,
    };

    let result = run(&settings, language, args.json, args.command).await;
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %err, "command failed");
    }
    result
}

async fn run(
    settings: &Settings,
    language: AppLanguage,
    json: bool,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Spin { items, seed } => spin(&items, seed, json),
        Command::Movies {
            series,
            genres,
            year,
            platforms,
            single,
        } => {
            let model = GeminiClient::from_settings(settings)?;
            let content_type = if series {
                ContentType::Series
            } else {
                ContentType::Movie
            };

            if single {
                let record = lifetools_core::recommend::recommend_single(&model, content_type, language)
                    .await
                    .context("the model did not return a recommendation")?;
                return print_records(std::slice::from_ref(&record), json);
            }

            let mut criteria = MediaCriteria::default();
            criteria.set_content_type(content_type);
            for genre in &genres {
                criteria.toggle_genre(genre);
            }
            for platform in &platforms {
                criteria.toggle_platform(platform);
            }
            if let Some(year) = year.as_deref() {
                anyhow::ensure!(criteria.set_year(year), "year must be at most 4 digits: {year:?}");
            }

            let records = lifetools_core::recommend::recommend(&model, &criteria, language).await?;
            if records.is_empty() {
                tracing::warn!("no recommendations could be read from the model response");
            }
            print_records(&records, json)
        }
        Command::Recipe { ingredients } => {
            let model = GeminiClient::from_settings(settings)?;
            let mut chat = RecipeChat::new();
            let reply = chat.send(&model, &ingredients, language).await?.clone();
            if json {
                println!("{}", serde_json::to_string_pretty(chat.messages())?);
                return Ok(());
            }
            match reply.participant {
                Participant::Error => anyhow::bail!("{}", reply.text),
                _ => println!("{}", reply.text),
            }
            Ok(())
        }
        Command::Truth { single } => {
            let model = GeminiClient::from_settings(settings)?;
            let questions = if single {
                lifetools_core::truth::fetch_single_question(&model, language)
                    .await
                    .into_iter()
                    .collect()
            } else {
                lifetools_core::truth::fetch_questions(&model, language).await?
            };
            anyhow::ensure!(!questions.is_empty(), "the model did not return a question");
            if json {
                println!("{}", serde_json::to_string_pretty(&questions)?);
            } else {
                for q in &questions {
                    println!("{q}");
                }
            }
            Ok(())
        }
        Command::Tip { hour } => {
            let model = GeminiClient::from_settings(settings)?;
            let part = hour.map(DayPart::from_hour).unwrap_or_else(DayPart::now);
            let tip = lifetools_core::tip::fetch_tip(&model, part, language).await;
            if json {
                let out = serde_json::json!({
                    "day_part": part,
                    "tip": tip,
                    "generated_at": chrono::Utc::now(),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{tip}");
            }
            Ok(())
        }
        Command::CheckUpdate { download } => {
            let releases = ReleaseClient::from_settings(settings)?;
            let status =
                lifetools_core::update::check_for_update(&releases, &settings.current_version)
                    .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else if status.update_available {
                println!(
                    "update available: {} -> {}",
                    status.current_version, status.latest_version
                );
            } else {
                println!("up to date ({})", status.current_version);
            }

            let (Some(dest), Some(url)) = (download, status.download_url.as_deref()) else {
                return Ok(());
            };
            let mut last_percent = None;
            let bytes = releases
                .download_asset(url, &dest, |done, total| {
                    let Some(total) = total.filter(|t| *t > 0) else {
                        return;
                    };
                    let percent = done * 100 / total;
                    if last_percent != Some(percent) && percent % 10 == 0 {
                        last_percent = Some(percent);
                        tracing::info!(percent, "downloading");
                    }
                })
                .await?;
            println!("saved {bytes} bytes to {}", dest.display());
            Ok(())
        }
    }
}

fn spin(items: &[String], seed: Option<u64>, json: bool) -> anyhow::Result<()> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut session = SpinnerSession::new(WedgeSet::from_labels(items)?);
    let outcome = session.spin(&mut rng)?;
    let winner = session.complete_spin()?.to_string();

    if json {
        let out = serde_json::json!({
            "winner": winner,
            "winning_index": outcome.winning_index,
            "target_rotation_degrees": outcome.target_rotation_degrees,
            "items": session.wedges(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{winner}");
    }
    Ok(())
}

fn print_records(records: &[RecommendationRecord], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }
    for (i, r) in records.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{} ({})", r.title, r.year);
        if !r.rating.is_empty() {
            println!("  rating:    {}", r.rating);
        }
        if !r.platforms.is_empty() {
            println!("  platforms: {}", r.platforms);
        }
        if !r.description.is_empty() {
            println!("  {}", r.description);
        }
    }
    Ok(())
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
