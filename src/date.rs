use std::fmt;
use std::str::FromStr;

/// "YYYY-MM" month of a dump file, ordered chronologically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: u16,
    pub month: u8, // 1..=12
}

impl YearMonth {
    pub fn new(year: u16, month: u8) -> Self {
        assert!((1..=12).contains(&month), "Month must be 1..=12");
        Self { year, month }
    }

    /// Whether `self` falls inside the inclusive, optionally open-ended range.
    pub fn within(self, start: Option<YearMonth>, end: Option<YearMonth>) -> bool {
        start.map_or(true, |s| self >= s) && end.map_or(true, |e| self <= e)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s.split_once('-').ok_or("expected YYYY-MM")?;
        let year: u16 = y.parse().map_err(|_| "invalid year")?;
        let month: u8 = m.parse().map_err(|_| "invalid month")?;
        if !(1..=12).contains(&month) {
            return Err("month must be 01..12".into());
        }
        Ok(Self { year, month })
    }
}

/// Label used in artifact names: `all`, `2006-01_2006-04`, `from_2006-01`, `to_2006-04`.
pub fn range_label(start: Option<YearMonth>, end: Option<YearMonth>) -> String {
    match (start, end) {
        (None, None) => "all".to_string(),
        (Some(s), Some(e)) => format!("{s}_{e}"),
        (Some(s), None) => format!("from_{s}"),
        (None, Some(e)) => format!("to_{e}"),
    }
}
