use chrono::{DateTime, Days, NaiveTime, TimeZone};
use rand::seq::SliceRandom;

pub const ALARM_TITLE: &str = "WINTER ARC ALARM";
pub const PROOF_PHRASE: &str = "I am disciplined and ready";

const ROASTS: &[&str] = &[
    "Wake up, ice cube! The winter doesn't wait for weaklings.",
    "Still in bed? Pathetic. Champions rise while you dream.",
    "The frost is calling, but you're too comfortable being mediocre.",
    "Every second you waste is another step backwards in your Winter Arc.",
    "Real warriors don't need snooze buttons. Prove you're not fake.",
    "The cold doesn't care about your excuses. Neither do I.",
    "While you sleep, your goals are freezing to death.",
    "Discipline starts now, not in 5 more minutes.",
    "The winter arc begins with getting your lazy bones out of bed.",
    "Congratulations, you just failed your first test of the day.",
];

const SNOOZE_ROASTS: &[&str] = &[
    "Snoozing again? You're weaker than I thought.",
    "This is exactly why you'll never reach your goals.",
    "The winter is laughing at your lack of discipline.",
    "Every snooze is proof you're not ready for greatness.",
    "Your future self is disgusted by your current weakness.",
];

#[derive(Debug, Clone, PartialEq)]
pub struct AlarmSettings {
    pub enabled: bool,
    pub time: NaiveTime,
    pub require_proof: bool,
    pub custom_message: Option<String>,
    pub voice_enabled: bool,
}

impl Default for AlarmSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            time: NaiveTime::from_hms_opt(6, 0, 0).unwrap_or_default(),
            require_proof: false,
            custom_message: None,
            voice_enabled: true,
        }
    }
}

pub trait Notifier {
    type Error: std::error::Error;

    fn cancel_all(&mut self) -> Result<(), Self::Error>;

    fn schedule<Tz: TimeZone>(
        &mut self,
        fire_at: DateTime<Tz>,
        title: &str,
        body: &str,
    ) -> Result<(), Self::Error>;
}

/// Today at `time` if that is still ahead of `now`, otherwise tomorrow.
pub fn next_fire_at<Tz: TimeZone>(now: &DateTime<Tz>, time: NaiveTime) -> Option<DateTime<Tz>> {
    let tz = now.timezone();
    let today = now.date_naive();
    let candidate = tz
        .from_local_datetime(&today.and_time(time))
        .earliest()?;
    if candidate > *now {
        return Some(candidate);
    }
    let tomorrow = today.checked_add_days(Days::new(1))?;
    tz.from_local_datetime(&tomorrow.and_time(time)).earliest()
}

/// Replaces any pending alarm with the next one. Returns the fire time, or
/// `None` when the alarm is disabled.
pub fn schedule_alarm<N: Notifier, Tz: TimeZone>(
    notifier: &mut N,
    settings: &AlarmSettings,
    now: &DateTime<Tz>,
) -> Result<Option<DateTime<Tz>>, N::Error> {
    if !settings.enabled {
        return Ok(None);
    }
    notifier.cancel_all()?;
    let Some(fire_at) = next_fire_at(now, settings.time) else {
        return Ok(None);
    };
    notifier.schedule(fire_at.clone(), ALARM_TITLE, &alarm_message(settings))?;
    Ok(Some(fire_at))
}

pub fn alarm_message(settings: &AlarmSettings) -> String {
    match settings.custom_message.as_deref().map(str::trim) {
        Some(custom) if !custom.is_empty() => custom.to_string(),
        _ => pick(ROASTS),
    }
}

pub fn snooze_roast() -> String {
    pick(SNOOZE_ROASTS)
}

pub fn verify_proof(input: &str) -> bool {
    input.trim().to_lowercase() == PROOF_PHRASE.to_lowercase()
}

pub fn can_dismiss(settings: &AlarmSettings, proof: &str) -> bool {
    !settings.require_proof || verify_proof(proof)
}

fn pick(lines: &[&str]) -> String {
    lines
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or_default()
        .to_string()
}
