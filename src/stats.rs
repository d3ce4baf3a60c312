use crate::models::{HabitLog, LeaderboardEntry, User};
use crate::time_utils::parse_timestamp;
use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinterTitle {
    pub title: &'static str,
    pub min_score: i64,
    pub min_streak: i64,
    pub description: &'static str,
}

pub const WINTER_TITLES: [WinterTitle; 6] = [
    WinterTitle {
        title: "Frozen Recruit",
        min_score: 0,
        min_streak: 0,
        description: "Just started the journey",
    },
    WinterTitle {
        title: "Ice Apprentice",
        min_score: 100,
        min_streak: 0,
        description: "Learning the ways of winter",
    },
    WinterTitle {
        title: "Frost Walker",
        min_score: 200,
        min_streak: 7,
        description: "Walking the path of discipline",
    },
    WinterTitle {
        title: "Winter Guardian",
        min_score: 500,
        min_streak: 14,
        description: "Protecting the winter ways",
    },
    WinterTitle {
        title: "Frozen Warrior",
        min_score: 700,
        min_streak: 21,
        description: "Battle-tested in the ice",
    },
    WinterTitle {
        title: "Ice Emperor",
        min_score: 1000,
        min_streak: 30,
        description: "Master of the Winter Arc",
    },
];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TitleProgress {
    pub next_title: &'static str,
    pub score_needed: i64,
    pub streak_needed: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProfileStats {
    pub total_habits: usize,
    pub total_logs: usize,
    pub average_daily: f64,
    pub best_streak: i64,
}

pub fn build_profile_stats(user: &User, total_habits: usize, total_logs: usize) -> ProfileStats {
    build_profile_stats_at(Utc::now(), user, total_habits, total_logs)
}

pub fn build_profile_stats_at(
    now: DateTime<Utc>,
    user: &User,
    total_habits: usize,
    total_logs: usize,
) -> ProfileStats {
    let days = days_since_start(now, &user.created_at);
    let average_daily = (total_logs as f64 / days as f64 * 10.0).round() / 10.0;

    ProfileStats {
        total_habits,
        total_logs,
        average_daily,
        best_streak: user.longest_streak,
    }
}

/// `None` at the top of the ladder or when the held title is not on it.
pub fn progress_to_next_title(user: &User) -> Option<TitleProgress> {
    let current = WINTER_TITLES
        .iter()
        .position(|rung| rung.title == user.winter_title)?;
    let next = WINTER_TITLES.get(current + 1)?;
    Some(TitleProgress {
        next_title: next.title,
        score_needed: (next.min_score - user.total_score).max(0),
        streak_needed: (next.min_streak - user.streak_days).max(0),
    })
}

pub fn rank_of<'a>(user_id: &str, entries: &'a [LeaderboardEntry]) -> Option<&'a LeaderboardEntry> {
    entries.iter().find(|entry| entry.user_id == user_id)
}

pub fn todays_logs(logs: &[HabitLog]) -> Vec<HabitLog> {
    todays_logs_at(&Local::now(), logs)
}

/// Logs whose timestamp falls on the same calendar day as `now`, in `now`'s
/// timezone. Unparseable timestamps never match.
pub fn todays_logs_at<Tz: TimeZone>(now: &DateTime<Tz>, logs: &[HabitLog]) -> Vec<HabitLog> {
    let tz = now.timezone();
    let today = now.date_naive();
    logs.iter()
        .filter(|log| {
            parse_timestamp(&log.logged_at)
                .is_some_and(|logged| logged.with_timezone(&tz).date_naive() == today)
        })
        .cloned()
        .collect()
}

/// Whole days since the account was created, never less than one. An
/// unparseable creation time counts as a brand new account.
fn days_since_start(now: DateTime<Utc>, created_at: &str) -> i64 {
    parse_timestamp(created_at)
        .map(|created| (now - created).num_days())
        .unwrap_or(0)
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn user(created_at: &str, longest_streak: i64) -> User {
        User {
            id: "u1".into(),
            email: "frost@example.com".into(),
            name: "Frost".into(),
            picture: None,
            winter_title: "Frozen Recruit".into(),
            total_score: 0,
            streak_days: 0,
            longest_streak,
            created_at: created_at.into(),
            last_active: String::new(),
        }
    }

    #[test]
    fn average_is_rounded_to_one_decimal() {
        let now = Utc.with_ymd_and_hms(2025, 11, 10, 12, 0, 0).unwrap();
        let stats = build_profile_stats_at(now, &user("2025-11-01T12:00:00", 6), 3, 20);
        assert_eq!(stats.total_habits, 3);
        assert_eq!(stats.total_logs, 20);
        assert_eq!(stats.average_daily, 2.2);
        assert_eq!(stats.best_streak, 6);
    }

    #[test]
    fn first_day_counts_as_one_day() {
        let now = Utc.with_ymd_and_hms(2025, 11, 1, 18, 0, 0).unwrap();
        let stats = build_profile_stats_at(now, &user("2025-11-01T08:00:00Z", 0), 1, 3);
        assert_eq!(stats.average_daily, 3.0);

        let stats = build_profile_stats_at(now, &user("not a date", 0), 1, 4);
        assert_eq!(stats.average_daily, 4.0);
    }

    #[test]
    fn progress_counts_what_is_still_missing() {
        let mut frost = user("2025-11-01T00:00:00Z", 0);
        frost.winter_title = "Ice Apprentice".into();
        frost.total_score = 150;
        frost.streak_days = 9;

        let progress = progress_to_next_title(&frost).unwrap();
        assert_eq!(progress.next_title, "Frost Walker");
        assert_eq!(progress.score_needed, 50);
        assert_eq!(progress.streak_needed, 0);

        frost.winter_title = "Ice Emperor".into();
        assert_eq!(progress_to_next_title(&frost), None);
        frost.winter_title = "Snow Tourist".into();
        assert_eq!(progress_to_next_title(&frost), None);
    }

    #[test]
    fn rank_is_found_by_user_id() {
        let entry = |user_id: &str, rank: u32| LeaderboardEntry {
            user_id: user_id.into(),
            name: user_id.to_uppercase(),
            picture: None,
            total_score: 0,
            streak_days: 0,
            winter_title: "Frozen Recruit".into(),
            rank,
        };
        let board = vec![entry("u7", 1), entry("u1", 2), entry("u3", 3)];
        assert_eq!(rank_of("u1", &board).map(|entry| entry.rank), Some(2));
        assert_eq!(rank_of("u9", &board), None);
    }

    #[test]
    fn todays_logs_use_the_local_calendar_day() {
        let log = |id: &str, logged_at: &str| HabitLog {
            id: id.into(),
            user_id: "u1".into(),
            habit_id: "h1".into(),
            value: "1".into(),
            notes: None,
            logged_at: logged_at.into(),
            ai_response: None,
        };
        let logs = vec![
            log("yesterday", "2025-11-09T10:00:00Z"),
            log("late", "2025-11-09T23:30:00"),
            log("morning", "2025-11-10T07:00:00Z"),
            log("garbage", "soon"),
        ];

        let utc_now = Utc.with_ymd_and_hms(2025, 11, 10, 12, 0, 0).unwrap();
        let ids: Vec<String> = todays_logs_at(&utc_now, &logs)
            .into_iter()
            .map(|log| log.id)
            .collect();
        assert_eq!(ids, ["morning"]);

        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let tokyo_now = utc_now.with_timezone(&tokyo);
        let ids: Vec<String> = todays_logs_at(&tokyo_now, &logs)
            .into_iter()
            .map(|log| log.id)
            .collect();
        assert_eq!(ids, ["late", "morning"]);
    }
}
