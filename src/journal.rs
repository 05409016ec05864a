//! Journal analytics: daily prompts, search and the weekly digest.

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, Duration, NaiveDateTime};
use serde::Serialize;

use crate::store::{parse_timestamp, JournalEntry};

/// Length of the trailing digest window, in days.
pub const WEEK_DAYS: i64 = 7;

/// Mood reported when there is nothing to count.
pub const NEUTRAL_MOOD: &str = "neutral";

/// Summary text for an empty week.
pub const EMPTY_WEEK_SUMMARY: &str =
    "No journal entries this week. Start journaling to see insights!";

/// Number of recent entries quoted in the digest prompt.
const PROMPT_ENTRIES: usize = 5;

/// Characters of each quoted entry.
const PROMPT_EXCERPT_CHARS: usize = 100;

/// Prompts shown per day.
const PROMPTS_PER_DAY: usize = 3;

pub const DAILY_PROMPTS: [&str; 8] = [
    "What went well today?",
    "What challenged you today?",
    "What are you grateful for?",
    "What did you learn today?",
    "How did you feel throughout the day?",
    "What could you improve tomorrow?",
    "What made you smile today?",
    "What's weighing on your mind?",
];

/// Three consecutive prompts (wrapping) starting at the weekday index,
/// Monday = 0.
pub fn daily_prompts(now: NaiveDateTime) -> Vec<&'static str> {
    let start = now.weekday().num_days_from_monday() as usize;
    (0..PROMPTS_PER_DAY)
        .map(|i| DAILY_PROMPTS[(start + i) % DAILY_PROMPTS.len()])
        .collect()
}

/// Entries whose text or mood contains `query`, case-insensitively.
pub fn search<'a>(entries: &'a [JournalEntry], query: &str) -> Vec<&'a JournalEntry> {
    let needle = query.to_lowercase();
    entries
        .iter()
        .filter(|e| {
            e.entry.to_lowercase().contains(&needle)
                || e.mood
                    .as_deref()
                    .is_some_and(|m| m.to_lowercase().contains(&needle))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Weekly digest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyStats {
    pub total_entries: usize,
    pub most_common_mood: String,
    pub days_journaled: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklySummary {
    pub summary: String,
    pub stats: WeeklyStats,
}

impl WeeklySummary {
    pub fn empty() -> Self {
        Self {
            summary: EMPTY_WEEK_SUMMARY.to_string(),
            stats: WeeklyStats {
                total_entries: 0,
                most_common_mood: NEUTRAL_MOOD.to_string(),
                days_journaled: 0,
            },
        }
    }
}

/// Entries timestamped at or after `now - 7 days`, in stored order.
/// Entries whose timestamp can't be parsed are skipped.
pub fn qualifying_entries(entries: &[JournalEntry], now: NaiveDateTime) -> Vec<&JournalEntry> {
    let cutoff = now - Duration::days(WEEK_DAYS);
    entries
        .iter()
        .filter(|e| parse_timestamp(&e.timestamp).is_some_and(|ts| ts >= cutoff))
        .collect()
}

/// The most frequent mood. Ties go to the mood seen first.
pub fn most_common_mood(entries: &[&JournalEntry]) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for mood in entries.iter().filter_map(|e| e.mood.as_deref()) {
        let count = counts.entry(mood).or_insert(0);
        if *count == 0 {
            order.push(mood);
        }
        *count += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for mood in order {
        let count = counts[mood];
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((mood, count));
        }
    }
    best.map(|(m, _)| m.to_string())
        .unwrap_or_else(|| NEUTRAL_MOOD.to_string())
}

/// Distinct calendar dates among the entries.
pub fn days_journaled(entries: &[&JournalEntry]) -> usize {
    entries
        .iter()
        .filter_map(|e| parse_timestamp(&e.timestamp))
        .map(|ts| ts.date())
        .collect::<HashSet<_>>()
        .len()
}

pub fn weekly_stats(entries: &[&JournalEntry]) -> WeeklyStats {
    WeeklyStats {
        total_entries: entries.len(),
        most_common_mood: most_common_mood(entries),
        days_journaled: days_journaled(entries),
    }
}

/// User message asking the model for the weekly digest.
pub fn build_summary_prompt(entries: &[&JournalEntry], stats: &WeeklyStats) -> String {
    let start = entries.len().saturating_sub(PROMPT_ENTRIES);
    let excerpts = entries[start..]
        .iter()
        .map(|e| {
            let excerpt: String = e.entry.chars().take(PROMPT_EXCERPT_CHARS).collect();
            format!("- {}...", excerpt)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Analyze these journal entries from the past week:\n\n\
         {}\n\n\
         Most common mood: {}\n\
         Total entries: {}\n\n\
         Provide a supportive 3-4 sentence summary highlighting:\n\
         1. Positive patterns or achievements\n\
         2. Any recurring themes\n\
         3. One actionable insight for growth",
        excerpts, stats.most_common_mood, stats.total_entries
    )
}

/// User message sent when a new entry is written.
pub fn entry_prompt(entry: &str, mood: &str) -> String {
    format!("The user is feeling {} and shared: {}", mood, entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::format_timestamp;
    use chrono::NaiveDate;

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn entry(id: u64, text: &str, mood: Option<&str>, ts: NaiveDateTime) -> JournalEntry {
        JournalEntry {
            id,
            entry: text.to_string(),
            mood: mood.map(|m| m.to_string()),
            ai_response: String::new(),
            timestamp: format_timestamp(ts),
            date: ts.format("%B %d, %Y").to_string(),
        }
    }

    #[test]
    fn test_daily_prompts_rotate_by_weekday() {
        // 2025-03-03 is a Monday.
        let monday = daily_prompts(at(3, 9));
        assert_eq!(
            monday,
            vec![
                "What went well today?",
                "What challenged you today?",
                "What are you grateful for?",
            ]
        );

        // Sunday = 6 wraps around the end of the list.
        let sunday = daily_prompts(at(9, 9));
        assert_eq!(
            sunday,
            vec![
                "What made you smile today?",
                "What's weighing on your mind?",
                "What went well today?",
            ]
        );
    }

    #[test]
    fn test_search_matches_text_and_mood() {
        let entries = vec![
            entry(1, "Went hiking with Sam", Some("happy"), at(1, 10)),
            entry(2, "Stressful deadline at work", Some("Anxious"), at(2, 10)),
            entry(3, "Quiet evening", None, at(3, 10)),
        ];
        let ids = |q: &str| search(&entries, q).iter().map(|e| e.id).collect::<Vec<_>>();

        assert_eq!(ids("HIKING"), vec![1]);
        assert_eq!(ids("anxious"), vec![2]);
        assert_eq!(ids("e"), vec![1, 2, 3]);
        assert_eq!(ids(""), vec![1, 2, 3]);
        assert!(ids("volcano").is_empty());
    }

    #[test]
    fn test_qualifying_window_is_inclusive() {
        let now = at(10, 12);
        let entries = vec![
            entry(1, "too old", Some("sad"), at(3, 11)),
            entry(2, "exactly on the cutoff", Some("calm"), at(3, 12)),
            entry(3, "recent", Some("happy"), at(9, 8)),
            JournalEntry {
                timestamp: "last tuesday".into(),
                ..entry(4, "bad timestamp", Some("happy"), at(9, 8))
            },
        ];
        let ids: Vec<u64> = qualifying_entries(&entries, now).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_most_common_mood_ties_go_to_first_seen() {
        let e = [
            entry(1, "a", Some("tired"), at(1, 1)),
            entry(2, "b", Some("happy"), at(1, 2)),
            entry(3, "c", Some("happy"), at(1, 3)),
            entry(4, "d", Some("tired"), at(1, 4)),
        ];
        let refs: Vec<&JournalEntry> = e.iter().collect();
        assert_eq!(most_common_mood(&refs), "tired");

        let refs: Vec<&JournalEntry> = e[1..].iter().collect();
        assert_eq!(most_common_mood(&refs), "happy");
    }

    #[test]
    fn test_most_common_mood_without_moods_is_neutral() {
        let e = [entry(1, "a", None, at(1, 1))];
        let refs: Vec<&JournalEntry> = e.iter().collect();
        assert_eq!(most_common_mood(&refs), "neutral");
        assert_eq!(most_common_mood(&[]), "neutral");
    }

    #[test]
    fn test_days_journaled_counts_distinct_dates() {
        let e = [
            entry(1, "a", None, at(4, 8)),
            entry(2, "b", None, at(4, 22)),
            entry(3, "c", None, at(5, 7)),
        ];
        let refs: Vec<&JournalEntry> = e.iter().collect();
        assert_eq!(days_journaled(&refs), 2);
        assert_eq!(weekly_stats(&refs).total_entries, 3);
    }

    #[test]
    fn test_summary_prompt_quotes_last_five() {
        let long = "x".repeat(150);
        let e: Vec<JournalEntry> = (1..=7)
            .map(|i| {
                let text = if i == 7 { long.clone() } else { format!("entry number {}", i) };
                entry(i, &text, Some("hopeful"), at(4, i as u32))
            })
            .collect();
        let refs: Vec<&JournalEntry> = e.iter().collect();
        let stats = weekly_stats(&refs);
        let prompt = build_summary_prompt(&refs, &stats);

        assert!(!prompt.contains("entry number 2..."));
        assert!(prompt.contains("- entry number 3..."));
        assert!(prompt.contains(&format!("- {}...", "x".repeat(100))));
        assert!(!prompt.contains(&"x".repeat(101)));
        assert!(prompt.contains("Most common mood: hopeful"));
        assert!(prompt.contains("Total entries: 7"));
    }

    #[test]
    fn test_empty_summary_shape() {
        let empty = WeeklySummary::empty();
        assert_eq!(empty.summary, EMPTY_WEEK_SUMMARY);
        assert_eq!(empty.stats.total_entries, 0);
        assert_eq!(empty.stats.most_common_mood, "neutral");
        assert_eq!(empty.stats.days_journaled, 0);
    }

    #[test]
    fn test_entry_prompt() {
        assert_eq!(
            entry_prompt("I finished the marathon", "proud"),
            "The user is feeling proud and shared: I finished the marathon"
        );
    }
}
