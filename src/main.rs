use chrono::{Local, NaiveTime};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use winter_arc::alarm::{alarm_message, next_fire_at, AlarmSettings};
use winter_arc::auth::login_url;
use winter_arc::client::{DEFAULT_HISTORY_LIMIT, DEFAULT_LEADERBOARD_LIMIT};
use winter_arc::models::{HabitCategory, NewHabit, NewHabitLog};
use winter_arc::stats::progress_to_next_title;
use winter_arc::{ApiClient, Config, Store, SyncContext};

#[derive(Debug, Parser)]
#[command(name = "winter-arc")]
#[command(about = "Winter Arc habit tracker client")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Restore the session and reload habits and chat
    Sync,
    /// Print the URL to open for signing in
    LoginUrl {
        /// Deep link the auth page should redirect back to
        redirect: String,
    },
    /// Finish sign-in from the redirect URL (carries #session_id=...)
    Login { redirect_url: String },
    Logout,
    /// List habits, or add/remove one
    Habits {
        #[command(subcommand)]
        action: Option<HabitAction>,
    },
    /// Log progress on a habit
    Log {
        habit_id: String,
        value: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List what was logged today
    Today,
    /// Talk to the coach
    Chat { message: String },
    Leaderboard {
        #[arg(long, default_value_t = DEFAULT_LEADERBOARD_LIMIT)]
        limit: u32,
    },
    /// Refresh score and print profile statistics
    Stats,
    /// Show when an alarm at HH:MM would next fire
    Alarm {
        time: String,
        #[arg(long)]
        message: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum HabitAction {
    Add {
        name: String,
        /// fitness, diet, discipline, sleep or anything else
        category: String,
        #[arg(long)]
        target: Option<String>,
        #[arg(long)]
        unit: Option<String>,
    },
    Rm {
        habit_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let args = Args::parse();
    let config = Config::from_env();

    let store = Store::hydrate(config.store_path.clone()).await;
    let api = ApiClient::new(&config.backend_url)?;
    let ctx = SyncContext::new(store, api);

    match args.command {
        Command::Sync => match ctx.refresh_all().await? {
            Some(user) => {
                let data = ctx.store().snapshot().await;
                info!(
                    user = %user.name,
                    title = %user.winter_title,
                    score = user.total_score,
                    streak = user.streak_days,
                    habits = data.habits.len(),
                    chat_messages = data.chat_messages.len(),
                    "synced"
                );
            }
            None => warn!("not signed in"),
        },
        Command::LoginUrl { redirect } => {
            println!("{}", login_url(&config.auth_url, &redirect));
        }
        Command::Login { redirect_url } => {
            let user = ctx.login_with_redirect(&redirect_url).await?;
            ctx.load_habits().await?;
            ctx.load_chat(DEFAULT_HISTORY_LIMIT).await?;
            println!("Welcome, {} ({})", user.name, user.winter_title);
        }
        Command::Logout => ctx.logout().await?,
        Command::Habits { action: None } => {
            for habit in ctx.load_habits().await? {
                let target = match (&habit.target_value, &habit.unit) {
                    (Some(value), Some(unit)) => format!(" [{value} {unit}]"),
                    (Some(value), None) => format!(" [{value}]"),
                    _ => String::new(),
                };
                println!("{}  {:<10} {}{}", habit.id, habit.category(), habit.name, target);
            }
        }
        Command::Habits {
            action:
                Some(HabitAction::Add {
                    name,
                    category,
                    target,
                    unit,
                }),
        } => {
            let mut habit = NewHabit::new(name, HabitCategory::from(category.as_str()));
            habit.target_value = target;
            habit.unit = unit;
            let created = ctx.create_habit(habit).await?;
            println!("{}", created.id);
        }
        Command::Habits {
            action: Some(HabitAction::Rm { habit_id }),
        } => ctx.delete_habit(&habit_id).await?,
        Command::Log {
            habit_id,
            value,
            notes,
        } => {
            let log = ctx
                .log_habit(NewHabitLog {
                    habit_id,
                    value: value.trim().to_string(),
                    notes: notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
                })
                .await?;
            if let Some(feedback) = log.ai_response {
                println!("Winter Coach says: {feedback}");
            }
        }
        Command::Today => {
            for log in ctx.todays_logs().await? {
                let notes = log.notes.as_deref().unwrap_or("");
                println!("{}  {}  {}  {}", log.logged_at, log.habit_id, log.value, notes);
            }
        }
        Command::Chat { message } => {
            let reply = ctx.send_chat_message(&message).await?;
            println!("{}", reply.message);
        }
        Command::Leaderboard { limit } => {
            let board = ctx.leaderboard(limit).await?;
            for entry in &board {
                println!(
                    "{:>3}. {:<20} {:>6}  {:>3}d  {}",
                    entry.rank, entry.name, entry.total_score, entry.streak_days, entry.winter_title
                );
            }
            if let Some(mine) = ctx.my_rank(&board).await {
                println!("Your rank: #{} with {} points", mine.rank, mine.total_score);
            }
        }
        Command::Stats => {
            let update = ctx.refresh_score().await?;
            let stats = ctx.profile_stats().await?;
            println!("{} ({} points)", update.title, update.score);
            println!("{}", serde_json::to_string_pretty(&stats)?);
            if let Some(user) = ctx.store().user().await {
                match progress_to_next_title(&user) {
                    Some(next) => println!(
                        "Next: {} ({} points, {} streak days to go)",
                        next.next_title, next.score_needed, next.streak_needed
                    ),
                    None => println!("Top of the ladder."),
                }
            }
        }
        Command::Alarm { time, message } => {
            let settings = AlarmSettings {
                enabled: true,
                time: NaiveTime::parse_from_str(&time, "%H:%M")?,
                custom_message: message,
                ..AlarmSettings::default()
            };
            match next_fire_at(&Local::now(), settings.time) {
                Some(fire_at) => println!("{}: {}", fire_at.format("%a %H:%M"), alarm_message(&settings)),
                None => warn!("{time} does not exist locally today or tomorrow"),
            }
        }
    }

    Ok(())
}
