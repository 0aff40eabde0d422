//! Message text for every job. Telegram HTML subset.

use chrono::NaiveDate;

/// Escape the three characters Telegram HTML treats specially.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn day(date: NaiveDate) -> String {
    date.format("%a %b %d, %Y").to_string()
}

fn qty(value: f64) -> String {
    if value.fract().abs() < 1e-9 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

/// Plural display names for the unit types items are counted in.
const UNIT_TYPES: &[(&str, &str)] = &[
    ("case", "cases"),
    ("quart", "quarts"),
    ("tray", "trays"),
    ("bag", "bags"),
    ("bottle", "bottles"),
    ("container", "containers"),
    ("box", "boxes"),
];

/// `n` units; unknown unit types are shown as given.
fn units(n: u32, unit: &str) -> String {
    if n == 1 {
        return format!("{n} {unit}");
    }
    let name = UNIT_TYPES
        .iter()
        .find(|(singular, _)| singular.eq_ignore_ascii_case(unit))
        .map_or(unit, |(_, plural)| *plural);
    format!("{n} {name}")
}

fn items(n: usize) -> String {
    if n == 1 { "1 item".to_string() } else { format!("{n} items") }
}

/// One requested line on an order message.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub item: String,
    pub unit_type: String,
    pub on_hand: f64,
    pub par_level: f64,
    pub cases: u32,
}

pub fn auto_request(location: &str, date: NaiveDate, lines: &[OrderLine]) -> String {
    let mut out = format!("🛒 <b>Auto-request · {}</b>\n{}\n", escape(location), day(date));
    if lines.is_empty() {
        out.push_str("\nEverything is at or above par. Nothing to order.");
        return out;
    }
    out.push('\n');
    for line in lines {
        out.push_str(&format!(
            "• <b>{}</b>: {} ({} on hand, par {})\n",
            escape(&line.item),
            escape(&units(line.cases, &line.unit_type)),
            qty(line.on_hand),
            qty(line.par_level),
        ));
    }
    let total: u32 = lines.iter().map(|l| l.cases).sum();
    out.push_str(&format!("\nTotal: {total} across {}", items(lines.len())));
    out
}

/// Sent when every location was skipped for missing counts.
pub fn auto_request_skipped(date: NaiveDate, skipped: &[(String, usize, usize)]) -> String {
    let mut out = format!(
        "⚠️ <b>Auto-request skipped</b>\n{}\n\nToo many on-hand counts are missing to order safely:\n",
        day(date)
    );
    for (location, missing, total) in skipped {
        out.push_str(&format!("• {}: {missing} of {total} missing\n", escape(location)));
    }
    out.push_str("\nEnter counts and run the job again.");
    out
}

#[derive(Debug, Clone, PartialEq)]
pub enum Standing {
    Missing,
    Critical { on_hand: f64, days: f64 },
    Watch { on_hand: f64, par_level: f64 },
}

pub fn reassurance(location: &str, date: NaiveDate, flagged: &[(String, Standing)], ok_count: usize) -> String {
    let mut out = format!("📋 <b>Evening check · {}</b>\n{}\n", escape(location), day(date));
    if flagged.is_empty() {
        out.push_str(&format!("\n✅ All clear. {} at or above par.", items(ok_count)));
        return out;
    }

    let section = |title: &str, rows: Vec<String>, out: &mut String| {
        if !rows.is_empty() {
            out.push_str(&format!("\n<b>{title}</b>\n"));
            for row in rows {
                out.push_str(&format!("• {row}\n"));
            }
        }
    };

    let critical = flagged
        .iter()
        .filter_map(|(item, s)| match s {
            Standing::Critical { on_hand, days } => {
                Some(format!("{}: {} on hand, {days:.1} days left", escape(item), qty(*on_hand)))
            }
            _ => None,
        })
        .collect();
    let watch = flagged
        .iter()
        .filter_map(|(item, s)| match s {
            Standing::Watch { on_hand, par_level } => {
                Some(format!("{}: {} of par {}", escape(item), qty(*on_hand), qty(*par_level)))
            }
            _ => None,
        })
        .collect();
    let missing = flagged
        .iter()
        .filter(|(_, s)| matches!(s, Standing::Missing))
        .map(|(item, _)| escape(item))
        .collect();

    section("🔴 Critical", critical, &mut out);
    section("🟡 Below par", watch, &mut out);
    section("❔ No count today", missing, &mut out);
    if ok_count > 0 {
        let others = if ok_count == 1 { "1 other item".to_string() } else { format!("{ok_count} other items") };
        out.push_str(&format!("\n{others} OK."));
    }
    out
}

pub fn reassurance_no_data(date: NaiveDate) -> String {
    format!(
        "📭 <b>No inventory data today</b>\n{}\n\nNo on-hand counts were entered at any location.",
        day(date)
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum Flag {
    NoCount,
    LowSupply { days: f64 },
    NoUsage,
}

pub fn missing_counts(date: NaiveDate, flagged: &[(String, String, Flag)]) -> String {
    let mut out = format!("🚨 <b>Count check</b>\n{}\n\n", day(date));
    let mut location = "";
    for (loc, item, flag) in flagged {
        if loc.as_str() != location {
            out.push_str(&format!("<b>{}</b>\n", escape(loc)));
            location = loc.as_str();
        }
        let reason = match flag {
            Flag::NoCount => "no count entered today".to_string(),
            Flag::LowSupply { days } => format!("{days:.1} days of supply"),
            Flag::NoUsage => "no usage rate set".to_string(),
        };
        out.push_str(&format!("• {}: {reason}\n", escape(item)));
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("Mac & <Cheese>"), "Mac &amp; &lt;Cheese&gt;");
    }

    #[test]
    fn test_auto_request_lists_items() {
        let lines = vec![
            OrderLine { item: "Steak".into(), unit_type: "case".into(), on_hand: 2.0, par_level: 6.0, cases: 4 },
            OrderLine { item: "Buns".into(), unit_type: "tray".into(), on_hand: 9.5, par_level: 10.0, cases: 1 },
        ];
        let text = auto_request("Avondale", date(), &lines);
        assert!(text.starts_with("🛒 <b>Auto-request · Avondale</b>\nTue Oct 20, 2026"));
        assert!(text.contains("• <b>Steak</b>: 4 cases (2 on hand, par 6)"));
        assert!(text.contains("• <b>Buns</b>: 1 tray (9.5 on hand, par 10)"));
        assert!(text.ends_with("Total: 5 across 2 items"));
    }

    #[test]
    fn test_unit_names_and_counts() {
        assert_eq!(units(3, "box"), "3 boxes");
        assert_eq!(units(2, "bottle"), "2 bottles");
        assert_eq!(units(1, "box"), "1 box");
        assert_eq!(units(4, "lb"), "4 lb");

        let one = vec![OrderLine { item: "Ice".into(), unit_type: "bag".into(), on_hand: 0.0, par_level: 2.0, cases: 2 }];
        assert!(auto_request("Avondale", date(), &one).ends_with("Total: 2 across 1 item"));
        assert!(reassurance("Avondale", date(), &[], 1).contains("All clear. 1 item at or above par."));
        let flagged = vec![("Salt".to_string(), Standing::Missing)];
        assert!(reassurance("Avondale", date(), &flagged, 1).ends_with("1 other item OK."));
    }

    #[test]
    fn test_auto_request_nothing_to_order() {
        let text = auto_request("Avondale", date(), &[]);
        assert!(text.contains("Nothing to order"));
    }

    #[test]
    fn test_reassurance_sections() {
        let flagged = vec![
            ("Steak".to_string(), Standing::Critical { on_hand: 1.0, days: 0.5 }),
            ("Buns".to_string(), Standing::Watch { on_hand: 4.0, par_level: 10.0 }),
            ("Salt".to_string(), Standing::Missing),
        ];
        let text = reassurance("Avondale", date(), &flagged, 3);
        assert!(text.contains("🔴 Critical</b>\n• Steak: 1 on hand, 0.5 days left"));
        assert!(text.contains("🟡 Below par</b>\n• Buns: 4 of par 10"));
        assert!(text.contains("❔ No count today</b>\n• Salt"));
        assert!(text.ends_with("3 other items OK."));

        let clear = reassurance("Avondale", date(), &[], 5);
        assert!(clear.contains("All clear. 5 items"));
    }

    #[test]
    fn test_missing_counts_groups_by_location() {
        let flagged = vec![
            ("Avondale".to_string(), "Steak".to_string(), Flag::NoCount),
            ("Avondale".to_string(), "Buns".to_string(), Flag::LowSupply { days: 0.4 }),
            ("Midtown".to_string(), "Salt".to_string(), Flag::NoUsage),
        ];
        let text = missing_counts(date(), &flagged);
        assert_eq!(text.matches("<b>Avondale</b>").count(), 1);
        assert!(text.contains("• Buns: 0.4 days of supply"));
        assert!(text.ends_with("• Salt: no usage rate set"));
    }
}
