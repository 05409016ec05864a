//! Task extraction from free-form assistant replies.
//!
//! Two lexical heuristics, tried in priority order:
//! 1. time blocks: `9:00 AM - 10:30 AM: Write the report`
//! 2. numbered items: `1. Write the report`
//!
//! The second runs only when the first finds nothing. Digits are ASCII.

use std::sync::LazyLock;

use regex::Regex;

/// Maximum number of tasks returned for one reply.
pub const MAX_TASKS: usize = 15;

/// Minimum length (in characters, after trimming) of an extracted task.
pub const MIN_TASK_CHARS: usize = 15;

/// A heuristic that mines candidate task strings from text.
pub type Matcher = fn(&str) -> Vec<String>;

static TIME_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)([0-9]{1,2}:[0-9]{2}\s*(?:AM|PM)?(?:\s*-\s*[0-9]{1,2}:[0-9]{2}\s*(?:AM|PM)?)?)[:\-]\s*([^\n]{15,})",
    )
    .expect("valid time block regex")
});

/// Extract at most `MAX_TASKS` tasks from `text`, in order of appearance.
pub fn extract_tasks(text: &str) -> Vec<String> {
    let mut tasks = first_non_empty(text, &[match_time_blocks, match_numbered_items]);
    tasks.truncate(MAX_TASKS);
    tasks
}

/// Run `matchers` in order and return the first non-empty result.
pub fn first_non_empty(text: &str, matchers: &[Matcher]) -> Vec<String> {
    matchers
        .iter()
        .map(|matcher| matcher(text))
        .find(|candidates| !candidates.is_empty())
        .unwrap_or_default()
}

/// Lines carrying a clock time (optionally a range, optionally AM/PM)
/// followed by `:` or `-` and at least 15 characters of description.
///
/// Each match becomes `"<time>: <description>"`.
pub fn match_time_blocks(text: &str) -> Vec<String> {
    TIME_BLOCK_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let time = caps.get(1)?.as_str();
            let description = caps.get(2)?.as_str().trim();
            let task = format!("{}: {}", time, description);
            long_enough(&task).then_some(task)
        })
        .collect()
}

/// Numbered items (`1.` or `1)`). Each item runs to the next numbered
/// marker, a blank line, or the end of the text, and is at least 15
/// characters long. Whitespace inside an item collapses to single spaces.
///
/// Matching behaves like the lazy backtracking pattern
/// `[0-9]+[.)]\s*(.{15,}?)(?=[0-9]+[.)]|\n\n|$)` with `.` matching newlines.
pub fn match_numbered_items(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut items = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        match numbered_item_at(&chars, pos) {
            Some((start, end)) => {
                let item = collapse_whitespace(&chars[start..end]);
                if long_enough(&item) {
                    items.push(item);
                }
                pos = end;
            }
            None => pos += 1,
        }
    }

    items
}

/// Try to match one numbered item starting exactly at `pos`.
/// Returns the captured range on success.
fn numbered_item_at(chars: &[char], pos: usize) -> Option<(usize, usize)> {
    let marker_end = marker_len(chars, pos).map(|len| pos + len)?;

    let mut ws_end = marker_end;
    while chars.get(ws_end).is_some_and(|c| c.is_whitespace()) {
        ws_end += 1;
    }

    // Greedy `\s*` gives whitespace back one character at a time.
    (marker_end..=ws_end)
        .rev()
        .find_map(|start| lazy_capture_end(chars, start).map(|end| (start, end)))
}

/// Smallest end >= start + MIN_TASK_CHARS at which an item may stop.
fn lazy_capture_end(chars: &[char], start: usize) -> Option<usize> {
    let mut end = start + MIN_TASK_CHARS;
    while end <= chars.len() {
        if item_boundary(chars, end) {
            return Some(end);
        }
        end += 1;
    }
    None
}

/// Next numbered marker, blank line, or end of text (optionally after one
/// trailing newline).
fn item_boundary(chars: &[char], pos: usize) -> bool {
    if marker_len(chars, pos).is_some() {
        return true;
    }
    let rest = &chars[pos.min(chars.len())..];
    matches!(rest, [] | ['\n'] | ['\n', '\n', ..])
}

/// Length of a `[0-9]+[.)]` marker at `pos`, if there is one.
fn marker_len(chars: &[char], pos: usize) -> Option<usize> {
    let digits = chars
        .get(pos..)?
        .iter()
        .take_while(|c| c.is_ascii_digit())
        .count();
    if digits == 0 {
        return None;
    }
    match chars.get(pos + digits) {
        Some('.') | Some(')') => Some(digits + 1),
        _ => None,
    }
}

fn collapse_whitespace(chars: &[char]) -> String {
    let raw: String = chars.iter().collect();
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn long_enough(task: &str) -> bool {
    task.trim().chars().count() >= MIN_TASK_CHARS
}
