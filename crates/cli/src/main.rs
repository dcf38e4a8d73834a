use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use waypoint_agents::{PlannerSettings, PlanningSession, RoutePlanner, SessionPhase};
use waypoint_core::{Language, OriginHub, PlanRequest, RetryPolicy};
use waypoint_observability::{init_tracing, AppMetrics};
use waypoint_storage::{Store, TourRepository};

#[derive(Debug, Parser)]
#[command(name = "waypoint")]
#[command(about = "Waypoint day-trip planner CLI")]
struct Cli {
    #[arg(long, env = "WAYPOINT_DATABASE_URL")]
    database_url: Option<String>,

    #[command(flatten)]
    planner: PlannerArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct PlannerArgs {
    #[arg(long, env = "WAYPOINT_RETRY_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,
    #[arg(long, env = "WAYPOINT_RETRY_DELAY_MS", default_value_t = 1_000)]
    retry_delay_ms: u64,
    #[arg(long, env = "WAYPOINT_INFERENCE_DEADLINE_MS", default_value_t = 15_000)]
    deadline_ms: u64,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Plan one route and print it as JSON.
    Plan {
        #[arg(long, value_parser = parse_hub, default_value = "kutaisi")]
        hub: OriginHub,
        #[arg(long, default_value = "1 day")]
        duration: String,
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long)]
        wish: Option<String>,
        #[arg(long, default_value = "en")]
        lang: String,
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Save the planned route as an accepted tour.
        #[arg(long)]
        accept: bool,
    },
    Tours {
        #[command(subcommand)]
        command: ToursCommand,
    },
    /// Interactive plan, accept, reset loop.
    Session {
        #[arg(long, default_value = "en")]
        lang: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[derive(Debug, Subcommand)]
enum ToursCommand {
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("waypoint_cli");
    let cli = Cli::parse();

    let planner = Arc::new(build_planner(&cli.planner)?);
    let store = match cli.database_url.as_deref() {
        Some(url) if !url.trim().is_empty() => Store::sqlite(url).await?,
        _ => Store::memory(),
    };

    match cli.command {
        Command::Plan {
            hub,
            duration,
            tags,
            wish,
            lang,
            date,
            accept,
        } => {
            let request = PlanRequest {
                origin_hub: hub,
                duration_label: duration,
                interest_tags: tags.into_iter().collect(),
                free_text_wish: wish,
                language: Language::from_optional_str(Some(&lang)),
                travel_date: date.unwrap_or_else(today),
            };

            let mut session = PlanningSession::new(planner);
            session.submit(request).await?;
            if let Some(message) = session.validation_message() {
                anyhow::bail!(message);
            }

            let route = session.route().context("session produced no route")?;
            println!("{}", serde_json::to_string_pretty(route)?);
            if let Some(notice) = session.notice() {
                eprintln!("{notice}");
            }

            if accept {
                let tour = session.accept(&store).await?;
                eprintln!("saved tour {}", tour.id);
            }
        }
        Command::Tours { command } => match command {
            ToursCommand::List => {
                let tours = store.list().await.context("failed to list tours")?;
                println!("{}", serde_json::to_string_pretty(&tours)?);
            }
        },
        Command::Session { lang, date } => {
            let language = Language::from_optional_str(Some(&lang));
            run_session(
                PlanningSession::new(planner),
                &store,
                language,
                date.unwrap_or_else(today),
            )
            .await?;
        }
    }

    Ok(())
}

async fn run_session(
    mut session: PlanningSession,
    store: &Store,
    language: Language,
    travel_date: NaiveDate,
) -> Result<()> {
    println!("Waypoint session. type 'exit' to quit.");

    loop {
        match session.phase() {
            SessionPhase::Input => {
                if let Some(message) = session.validation_message() {
                    println!("{message}");
                }

                let Some(hub) = read_line("hub [kutaisi/tbilisi/batumi]> ")? else {
                    break;
                };
                let hub = if hub.is_empty() { "kutaisi" } else { hub.as_str() };
                let Some(hub) = OriginHub::parse(hub) else {
                    println!("unknown hub");
                    continue;
                };
                let Some(tags) = read_line("interests (comma separated)> ")? else {
                    break;
                };
                let Some(wish) = read_line("anything else?> ")? else {
                    break;
                };

                let request = PlanRequest {
                    origin_hub: hub,
                    duration_label: "1 day".to_string(),
                    interest_tags: tags
                        .split(',')
                        .map(str::trim)
                        .filter(|tag| !tag.is_empty())
                        .map(ToString::to_string)
                        .collect(),
                    free_text_wish: Some(wish).filter(|wish| !wish.is_empty()),
                    language,
                    travel_date,
                };
                println!("planning...");
                session.submit(request).await?;
            }
            // submit returns only once planning has settled
            SessionPhase::Loading => break,
            SessionPhase::Result => {
                if let Some(route) = session.route() {
                    println!("\n{}", route.stops.join(" -> "));
                    println!("{:.0} km, {}", route.total_distance_km, route.duration_label);
                    if let Some(reasoning) = route.reasoning.as_deref() {
                        println!("{reasoning}");
                    }
                }
                if let Some(notice) = session.notice() {
                    println!("({notice})");
                }

                let Some(choice) = read_line("[a]ccept, [r]eset, e[x]it> ")? else {
                    break;
                };
                match choice.as_str() {
                    "a" | "accept" => match session.accept(store).await {
                        Ok(tour) => println!("saved tour {}", tour.id),
                        Err(err) => println!("{err:#}"),
                    },
                    "r" | "reset" => session.reset()?,
                    _ => {}
                }
            }
        }
    }

    Ok(())
}

/// `None` on end of input or an exit command.
fn read_line(prompt: &str) -> Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Ok(None);
    }

    let line = line.trim();
    if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") || line == "x" {
        return Ok(None);
    }
    Ok(Some(line.to_string()))
}

fn build_planner(args: &PlannerArgs) -> Result<RoutePlanner> {
    let settings = PlannerSettings {
        retry: RetryPolicy::new(args.max_attempts, Duration::from_millis(args.retry_delay_ms)),
        deadline: Duration::from_millis(args.deadline_ms.max(1)),
        ..PlannerSettings::default()
    };

    Ok(RoutePlanner::from_env(AppMetrics::shared())?.with_settings(settings))
}

fn parse_hub(value: &str) -> Result<OriginHub, String> {
    OriginHub::parse(value).ok_or_else(|| format!("unknown hub '{value}'"))
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}
