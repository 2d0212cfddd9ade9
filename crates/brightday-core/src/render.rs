use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::{format_iso, format_short};
use crate::entry::BirthdayEntry;
use crate::filter::{ListedEntry, Summary};

pub const EMPTY_LIST_MESSAGE: &str = "No birthdays found. Use 'brightday add' to add someone.";

const AVATAR_PALETTE: [&str; 11] = [
    "#ef4444", "#f97316", "#f59e0b", "#eab308", "#84cc16", "#10b981", "#06b6d4", "#3b82f6",
    "#6366f1", "#8b5cf6", "#ec4899",
];

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    soon_days: u32,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
            soon_days: cfg.soon_days()?,
        })
    }

    /// A renderer that never emits escape codes.
    pub fn plain(soon_days: u32) -> Self {
        Self {
            color: false,
            soon_days,
        }
    }

    pub fn print_list(&self, rows: &[ListedEntry<'_>], summary: &Summary<'_>) -> anyhow::Result<()> {
        self.write_list(io::stdout().lock(), rows, summary)
    }

    pub fn print_entry_info(&self, entry: &BirthdayEntry, days: u32) -> anyhow::Result<()> {
        self.write_entry_info(io::stdout().lock(), entry, days)
    }

    pub fn print_summary(&self, summary: &Summary<'_>) -> anyhow::Result<()> {
        self.write_summary(io::stdout().lock(), summary)
    }

    #[tracing::instrument(skip_all, fields(rows = rows.len()))]
    pub fn write_list<W: Write>(
        &self,
        mut out: W,
        rows: &[ListedEntry<'_>],
        summary: &Summary<'_>,
    ) -> anyhow::Result<()> {
        if rows.is_empty() {
            writeln!(out, "{EMPTY_LIST_MESSAGE}")?;
        } else {
            let headers = vec![
                "ID".to_string(),
                String::new(),
                "Name".to_string(),
                "Date".to_string(),
                "When".to_string(),
                "Note".to_string(),
            ];

            let table_rows = rows
                .iter()
                .map(|row| {
                    let entry = row.entry;
                    let when = day_label(row.days);
                    let when = if row.days <= self.soon_days {
                        self.paint(&when, "1;35")
                    } else {
                        when
                    };
                    vec![
                        self.paint(entry.id(), "33"),
                        self.paint_avatar(entry.name()),
                        entry.name().to_string(),
                        format_short(entry.date()),
                        when,
                        entry.note().unwrap_or_default().to_string(),
                    ]
                })
                .collect();

            write_table(&mut out, headers, table_rows)?;
        }

        writeln!(out)?;
        writeln!(out, "{}", summary_line(summary))?;
        Ok(())
    }

    pub fn write_entry_info<W: Write>(
        &self,
        mut out: W,
        entry: &BirthdayEntry,
        days: u32,
    ) -> anyhow::Result<()> {
        writeln!(out, "id      {}", entry.id())?;
        writeln!(out, "name    {}", entry.name())?;
        writeln!(out, "date    {}", format_iso(entry.date()))?;
        writeln!(out, "next    {} ({})", day_label(days), format_short(entry.date()))?;
        writeln!(out, "note    {}", entry.note().unwrap_or_default())?;
        Ok(())
    }

    pub fn write_summary<W: Write>(&self, mut out: W, summary: &Summary<'_>) -> anyhow::Result<()> {
        writeln!(out, "{}", summary_line(summary))?;
        if summary.this_month.is_empty() {
            return Ok(());
        }

        writeln!(out)?;
        writeln!(out, "This month")?;
        for entry in &summary.this_month {
            writeln!(out, "  {:<7} {}", format_short(entry.date()), entry.name())?;
        }
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }

    fn paint_avatar(&self, name: &str) -> String {
        let initials = initials(name);
        match hex_to_ansi(avatar_color(name)) {
            Some(code) => self.paint(&initials, &code),
            None => initials,
        }
    }
}

/// `Today`, `Tomorrow`, or `N days`.
pub fn day_label(days: u32) -> String {
    match days {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        n => format!("{n} days"),
    }
}

/// Up to two uppercase initials.
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect()
}

/// Palette colour picked by the sum of the lowercased name's code points.
pub fn avatar_color(name: &str) -> &'static str {
    let sum: u64 = name
        .to_lowercase()
        .chars()
        .map(|c| u64::from(u32::from(c)))
        .sum();
    AVATAR_PALETTE[(sum % AVATAR_PALETTE.len() as u64) as usize]
}

fn summary_line(summary: &Summary<'_>) -> String {
    format!(
        "{} total, {} this week, {} today",
        summary.total, summary.this_week, summary.today
    )
}

fn hex_to_ansi(hex: &str) -> Option<String> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    let (r, g, b) = (channel(0..2)?, channel(2..4)?, channel(4..6)?);
    Some(format!("1;38;2;{r};{g};{b}"))
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    write_row(&mut writer, &headers, &widths)?;

    let rules: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    write_row(&mut writer, &rules, &widths)?;

    for row in &rows {
        write_row(&mut writer, row, &widths)?;
    }

    Ok(())
}

fn write_row<W: Write>(writer: &mut W, cells: &[String], widths: &[usize]) -> anyhow::Result<()> {
    let mut line = String::new();
    for (cell, width) in cells.iter().zip(widths) {
        let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
        let padding = width.saturating_sub(visible_width);
        line.push_str(cell);
        line.push_str(&" ".repeat(padding + 1));
    }
    writeln!(writer, "{}", line.trim_end())?;
    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::datetime::LeapDayPolicy;
    use crate::filter::{ListQuery, build_view};

    fn entries() -> Vec<BirthdayEntry> {
        vec![
            BirthdayEntry::new("id_a", "Alice Morgan", "1990-06-21", Some("Brunch at 11"))
                .expect("valid"),
            BirthdayEntry::new("id_b", "jia chen", "1988-06-20", None).expect("valid"),
        ]
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 20).expect("valid date")
    }

    #[test]
    fn labels_match_day_counts() {
        assert_eq!(day_label(0), "Today");
        assert_eq!(day_label(1), "Tomorrow");
        assert_eq!(day_label(12), "12 days");
    }

    #[test]
    fn initials_take_first_two_words() {
        assert_eq!(initials("Alice Morgan"), "AM");
        assert_eq!(initials("jia  chen li"), "JC");
        assert_eq!(initials("Cher"), "C");
        assert_eq!(initials("   "), "");
    }

    #[test]
    fn avatar_color_is_case_insensitive_and_in_palette() {
        assert_eq!(avatar_color("Alice"), avatar_color("alice"));
        assert!(AVATAR_PALETTE.contains(&avatar_color("Ben Carter")));
        // "a" is 97, 97 % 11 == 9
        assert_eq!(avatar_color("a"), "#8b5cf6");
    }

    #[test]
    fn plain_list_renders_table_and_summary() {
        let entries = entries();
        let rows = build_view(&entries, &ListQuery::default(), today(), LeapDayPolicy::default());
        let summary = Summary::compute(&entries, today(), LeapDayPolicy::default());

        let mut out = Vec::new();
        Renderer::plain(3)
            .write_list(&mut out, &rows, &summary)
            .expect("render");
        let text = String::from_utf8(out).expect("utf8");

        let expected = "\
ID      Name         Date   When     Note
---- -- ------------ ------ -------- ------------
id_b JC jia chen     Jun 20 Today
id_a AM Alice Morgan Jun 21 Tomorrow Brunch at 11

2 total, 2 this week, 1 today
";
        assert_eq!(text, expected);
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn empty_list_prints_hint() {
        let summary = Summary::compute(&[], today(), LeapDayPolicy::default());
        let mut out = Vec::new();
        Renderer::plain(3)
            .write_list(&mut out, &[], &summary)
            .expect("render");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.starts_with(EMPTY_LIST_MESSAGE));
        assert!(text.ends_with("0 total, 0 this week, 0 today\n"));
    }

    #[test]
    fn summary_lists_this_month() {
        let entries = entries();
        let summary = Summary::compute(&entries, today(), LeapDayPolicy::default());
        let mut out = Vec::new();
        Renderer::plain(3)
            .write_summary(&mut out, &summary)
            .expect("render");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("This month\n  Jun 21  Alice Morgan\n  Jun 20  jia chen\n"));
    }

    #[test]
    fn hex_colors_become_truecolor_codes() {
        assert_eq!(hex_to_ansi("#ef4444").as_deref(), Some("1;38;2;239;68;68"));
        assert_eq!(hex_to_ansi("red"), None);
    }
}
