//! Human-facing date labels.

use time::{Date, OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

const SHORT_DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[month repr:short] [day], [year]");
const LONG_TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[month repr:long] [day padding:none], [year] at [hour repr:12 padding:none]:[minute] [period]"
);

/// `May 01, 2024`, optionally followed by a coarse relative age such as `(3mo ago)`.
pub fn format_date(date: Date, relative_to: Option<Date>) -> String {
    let full = date
        .format(SHORT_DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string());

    match relative_to {
        Some(today) => format!("{full} ({})", relative_age(date, today)),
        None => full,
    }
}

/// Compares calendar fields one at a time: years, then months, then days.
pub fn relative_age(date: Date, today: Date) -> String {
    let years = today.year() - date.year();
    let months = i32::from(u8::from(today.month())) - i32::from(u8::from(date.month()));
    let days = i32::from(today.day()) - i32::from(date.day());

    if years > 0 {
        format!("{years}y ago")
    } else if months > 0 {
        format!("{months}mo ago")
    } else if days > 0 {
        format!("{days}d ago")
    } else {
        "Today".to_string()
    }
}

/// `January 5, 2025 at 3:04 PM`.
pub fn format_timestamp(timestamp: OffsetDateTime) -> String {
    timestamp
        .format(LONG_TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| timestamp.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn formats_short_dates() {
        assert_eq!(format_date(date!(2024 - 05 - 01), None), "May 01, 2024");
    }

    #[test]
    fn appends_relative_age() {
        let today = date!(2024 - 08 - 20);
        assert_eq!(
            format_date(date!(2023 - 12 - 30), Some(today)),
            "Dec 30, 2023 (1y ago)"
        );
        assert_eq!(relative_age(date!(2024 - 05 - 25), today), "3mo ago");
        assert_eq!(relative_age(date!(2024 - 08 - 02), today), "18d ago");
        assert_eq!(relative_age(today, today), "Today");
    }

    #[test]
    fn formats_generation_timestamps() {
        assert_eq!(
            format_timestamp(datetime!(2025-01-05 15:04 UTC)),
            "January 5, 2025 at 3:04 PM"
        );
    }
}
