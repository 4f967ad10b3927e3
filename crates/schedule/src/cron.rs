//! Cron normalization for the `cron` crate dialect.

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for seconds.
///
/// The `cron` crate requires 6 fields: `sec min hour day-of-month month day-of-week`
/// and numbers weekdays 1-7 starting at Sunday. Source files use standard
/// 5-field cron with weekdays 0-6 (Sunday = 0 or 7), so the weekday field is
/// shifted as well. Six/seven-field expressions and `@` descriptors pass through.
pub(crate) fn normalize_cron(expression: &str) -> String {
    let trimmed = expression.trim();
    if trimmed.starts_with('@') {
        return trimmed.to_string();
    }

    let fields: Vec<&str> = trimmed.split_whitespace().collect();
    if fields.len() == 5 {
        format!(
            "0 {} {} {} {} {}",
            fields[0],
            fields[1],
            fields[2],
            fields[3],
            map_day_of_week(fields[4])
        )
    } else {
        trimmed.to_string()
    }
}

fn map_day_of_week(field: &str) -> String {
    field
        .split(',')
        .map(map_day_of_week_item)
        .collect::<Vec<_>>()
        .join(",")
}

/// Map one list item (`n`, `a-b`, with optional `/step`). Names, `*` and
/// anything non-numeric are left for the parser to judge.
fn map_day_of_week_item(item: &str) -> String {
    let (range, step) = match item.split_once('/') {
        Some((range, step)) => (range, Some(step)),
        None => (item, None),
    };

    let mapped = match range.split_once('-') {
        Some((lo, hi)) => match (lo.parse::<u32>(), hi.parse::<u32>()) {
            // A range running up to Sunday-as-7 wraps to the crate's Sunday = 1.
            (Ok(lo), Ok(7)) if lo <= 6 => {
                let body = format!("{}-7", lo + 1);
                return match step {
                    Some(step) => match step.parse::<u32>() {
                        // Sunday-as-7 is only hit when the stride lands on it.
                        Ok(n) if n > 0 && lo > 0 && (7 - lo) % n == 0 => format!("{body}/{step},1"),
                        _ => format!("{body}/{step}"),
                    },
                    None if lo == 0 => body,
                    None => format!("{body},1"),
                };
            }
            (Ok(lo), Ok(hi)) if lo <= 6 && hi <= 6 => format!("{}-{}", lo + 1, hi + 1),
            _ => range.to_string(),
        },
        None => shift_day(range).unwrap_or_else(|| range.to_string()),
    };

    match step {
        Some(step) => format!("{mapped}/{step}"),
        None => mapped,
    }
}

fn shift_day(token: &str) -> Option<String> {
    let day = token.parse::<u32>().ok().filter(|d| *d <= 7)?;
    Some(if day == 7 { 1 } else { day + 1 }.to_string())
}
