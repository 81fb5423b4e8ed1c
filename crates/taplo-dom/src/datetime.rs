//! Validation of TOML date and time literals.

/// Which of the four TOML date-time types a literal is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateTimeKind {
    /// `1979-05-27T07:32:00Z`
    OffsetDateTime,
    /// `1979-05-27T07:32:00`
    LocalDateTime,
    /// `1979-05-27`
    LocalDate,
    /// `07:32:00`
    LocalTime,
}

/// Parse a date-time literal, returning its kind and its RFC 3339 form
/// (`T` separator, upper-case `Z`).
///
/// The kind is decided by the shape of the text alone, so a value that
/// went through a plain string (e.g. JSON) can be recovered.
pub fn parse_date_time(text: &str) -> Result<(DateTimeKind, String), String> {
    let b = text.as_bytes();

    if b.len() >= 10 && b[4] == b'-' {
        check_date(text.get(..10).ok_or("invalid date")?)?;
        if b.len() == 10 {
            return Ok((DateTimeKind::LocalDate, text.to_string()));
        }
        if !matches!(b[10], b'T' | b't' | b' ') {
            return Err("expected `T` between date and time".into());
        }
        let rest = &text[11..];
        let time_len = check_time(rest)?;
        let mut normalized = format!("{}T{}", &text[..10], &rest[..time_len]);
        let offset = &rest[time_len..];
        if offset.is_empty() {
            return Ok((DateTimeKind::LocalDateTime, normalized));
        }
        check_offset(offset)?;
        normalized.push_str(&offset.to_ascii_uppercase());
        return Ok((DateTimeKind::OffsetDateTime, normalized));
    }

    let time_len = check_time(text)?;
    if time_len != text.len() {
        return Err("unexpected text after time".into());
    }
    Ok((DateTimeKind::LocalTime, text.to_string()))
}

fn number(text: &str, what: &str) -> Result<u32, String> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid {what}"));
    }
    text.parse().map_err(|_| format!("invalid {what}"))
}

fn check_date(date: &str) -> Result<(), String> {
    let b = date.as_bytes();
    if b.len() != 10 || b[4] != b'-' || b[7] != b'-' {
        return Err("expected a date like `1979-05-27`".into());
    }
    let year = number(&date[0..4], "year")?;
    let month = number(&date[5..7], "month")?;
    let day = number(&date[8..10], "day")?;
    if !(1..=12).contains(&month) {
        return Err(format!("month {month} is out of range"));
    }
    let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    let days = match month {
        2 if leap => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    };
    if day == 0 || day > days {
        return Err(format!("day {day} is out of range"));
    }
    Ok(())
}

/// Returns the length of the time part, which may be followed by an offset.
fn check_time(text: &str) -> Result<usize, String> {
    let b = text.as_bytes();
    if b.len() < 8 || b[2] != b':' || b[5] != b':' {
        return Err("expected a time like `07:32:00`".into());
    }
    let hour = number(&text[0..2], "hour")?;
    let minute = number(&text[3..5], "minute")?;
    let second = number(&text[6..8], "second")?;
    if hour > 23 {
        return Err(format!("hour {hour} is out of range"));
    }
    if minute > 59 {
        return Err(format!("minute {minute} is out of range"));
    }
    // 60 allows for leap seconds.
    if second > 60 {
        return Err(format!("second {second} is out of range"));
    }
    let mut len = 8;
    if b.get(8) == Some(&b'.') {
        let frac = b[9..].iter().take_while(|c| c.is_ascii_digit()).count();
        if frac == 0 {
            return Err("expected digits after `.`".into());
        }
        len = 9 + frac;
    }
    Ok(len)
}

fn check_offset(offset: &str) -> Result<(), String> {
    if offset.eq_ignore_ascii_case("z") {
        return Ok(());
    }
    let b = offset.as_bytes();
    if b.len() != 6 || !matches!(b[0], b'+' | b'-') || b[3] != b':' {
        return Err(format!("invalid offset `{offset}`"));
    }
    let hour = number(&offset[1..3], "offset hour")?;
    let minute = number(&offset[4..6], "offset minute")?;
    if hour > 23 || minute > 59 {
        return Err(format!("offset `{offset}` is out of range"));
    }
    Ok(())
}
