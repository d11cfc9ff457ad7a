use chrono::NaiveDate;
use chrono::TimeDelta;
use iso8601_duration::Duration as IsoDuration;
use serde::Serialize;
use std::fmt::Display;

/// Types of cell data in spreadsheet files.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean values stored as "1"/"0"
    Boolean,
    /// Numeric values
    Number,
    /// Date/time values stored as numbers from 1900 epoch
    NumberDateTime1900,
    /// Date values stored as numbers from 1900 epoch
    NumberDate1900,
    /// Time values stored as numbers from 1900 epoch
    NumberTime1900,
    /// Date/time values stored as numbers from 1904 epoch
    NumberDateTime1904,
    /// Date values stored as numbers from 1904 epoch
    NumberDate1904,
    /// Time values stored as numbers from 1904 epoch
    NumberTime1904,
    /// ISO 8601 date/time strings
    IsoDateTime,
    /// ISO 8601 duration strings
    IsoDuration,
    /// Inline string values
    InlineString,
    /// Shared string table references
    SharedString,
    /// Error values such as `#DIV/0!`
    Error,
}

impl CellType {
    /// Parses built-in Excel number format IDs to determine cell type.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "22" => Some(if is_1904 { Self::NumberDateTime1904 } else { Self::NumberDateTime1900 }),
            "14" | "15" | "16" | "17" => Some(if is_1904 { Self::NumberDate1904 } else { Self::NumberDate1900 }),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(if is_1904 { Self::NumberTime1904 } else { Self::NumberTime1900 }),
            _ => None,
        }
    }

    /// Parses custom number format strings to determine cell type.
    /// Literal text, escapes and bracketed sections do not count as date/time tokens.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_date = false;
        let mut is_time = false;
        let mut is_color = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_color => is_literal = true,

                ']' if is_color => is_color = false,
                '[' if !is_literal => is_color = true,
                _ if is_literal || is_color => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time, is_1904) {
            (true, true, false) => Self::NumberDateTime1900,
            (true, true, true) => Self::NumberDateTime1904,
            (true, false, false) => Self::NumberDate1900,
            (true, false, true) => Self::NumberDate1904,
            (false, true, false) => Self::NumberTime1900,
            (false, true, true) => Self::NumberTime1904,
            (false, false, _) => Self::Number,
        }
    }
}

/// A raw cell as read from the workbook: position, declared type and the stored text.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    /// Row index (0-based)
    pub(crate) row: usize,
    /// Column index (0-based)
    pub(crate) col: usize,
    /// Cell data type
    pub(crate) kind: CellType,
    /// Cell value as stored in the file
    pub(crate) value: String,
}

impl Cell {
    /// Interprets the stored text according to the cell type.
    ///
    /// Dates and times become ISO text, booleans become `true`/`false`. A value
    /// that does not parse as its declared type is kept as text.
    pub(crate) fn to_value(&self) -> CellValue {
        let text = || CellValue::Text(self.value.to_owned());
        match self.kind {
            CellType::Empty => CellValue::Empty,
            CellType::Boolean => CellValue::Text(if self.value == "1" { "true" } else { "false" }.to_owned()),
            CellType::Number => self.value.parse::<f64>().map(CellValue::Number).unwrap_or_else(|_| text()),
            CellType::NumberDateTime1900 => to_datetime_string(&self.value, false).map(CellValue::Text).unwrap_or_else(text),
            CellType::NumberDateTime1904 => to_datetime_string(&self.value, true).map(CellValue::Text).unwrap_or_else(text),
            CellType::NumberDate1900 => to_date_string(&self.value, false).map(CellValue::Text).unwrap_or_else(text),
            CellType::NumberDate1904 => to_date_string(&self.value, true).map(CellValue::Text).unwrap_or_else(text),
            CellType::NumberTime1900 | CellType::NumberTime1904 => {
                to_time_string(&self.value).map(CellValue::Text).unwrap_or_else(text)
            }
            CellType::IsoDateTime => CellValue::Text(self.value.replace('T', " ")),
            CellType::IsoDuration => match self.value.parse::<IsoDuration>() {
                Ok(duration) => CellValue::Text(format!(
                    "{:02}:{:02}:{:02}",
                    duration.day as u64 * 24 + duration.hour as u64,
                    duration.minute as u64,
                    duration.second as u64
                )),
                Err(_) => text(),
            },
            CellType::InlineString | CellType::SharedString | CellType::Error => text(),
        }
    }
}

/// A single grid cell after loading: nothing, a number or text.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl Display for CellValue {
    /// Whole numbers print without a fractional part; empty cells print as "".
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                write!(f, "{}", *value as i64)
            }
            CellValue::Number(value) => write!(f, "{}", value),
            CellValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_owned())
    }
}

/// Converts Excel numeric date to ISO date string.
/// Handles Lotus 1-2-3 leap year bug for 1900 epoch.
/// Serials outside chrono's calendar yield `None`.
fn to_date_string(value: &str, is_1904: bool) -> Option<String> {
    let serial = value.parse::<f64>().ok()?.trunc();
    if !serial.is_finite() {
        return None;
    }
    let days = serial as i64;
    let offset = if is_1904 {
        1462
    } else if days < 60 {
        1
    } else {
        0
    };
    let duration = TimeDelta::try_days(days.checked_add(offset)?)?;
    let date = NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(duration)?;
    Some(date.format("%Y-%m-%d").to_string())
}

/// Converts Excel numeric time (fraction of a day) to ISO time string.
fn to_time_string(value: &str) -> Option<String> {
    let factor = value.parse::<f64>().ok()?.fract();
    let mut hours = (factor * 86_400_000f64).round() as i64;
    let milliseconds = hours % 1_000; hours /= 1_000;
    let seconds = hours % 60; hours /= 60;
    let minutes = hours % 60; hours /= 60;
    let timestamp = if milliseconds > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}.{milliseconds:03}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    };
    Some(timestamp)
}

/// Converts Excel numeric datetime to ISO datetime string.
fn to_datetime_string(value: &str, is_1904: bool) -> Option<String> {
    let date = to_date_string(value, is_1904)?;
    let time = to_time_string(value)?;
    Some(format!("{date} {time}"))
}
