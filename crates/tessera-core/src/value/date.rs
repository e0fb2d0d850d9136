use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;
use time::Month;

// Julian day number of 1970-01-01.
const UNIX_EPOCH_JULIAN_DAY: i32 = 2_440_588;

///
/// Date
///
/// Day-precision calendar date, stored as days since 1970-01-01.
/// Text form is ISO `YYYY-MM-DD`.
///

#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct Date(i32);

impl Date {
    pub const EPOCH: Self = Self(0);

    /// Earliest supported date, -9999-01-01.
    pub const MIN: Self = Self(-4_371_587);

    /// Latest supported date, 9999-12-31.
    pub const MAX: Self = Self(2_932_896);

    /// Build a date from calendar parts; impossible dates give `None`.
    #[must_use]
    pub fn new_checked(year: i32, month: u8, day: u8) -> Option<Self> {
        let month = Month::try_from(month).ok()?;
        let date = time::Date::from_calendar_date(year, month, day).ok()?;

        Some(Self(date.to_julian_day() - UNIX_EPOCH_JULIAN_DAY))
    }

    /// Date `days` after the unix epoch; `None` outside `MIN..=MAX`.
    #[must_use]
    pub const fn from_days(days: i32) -> Option<Self> {
        if days < Self::MIN.0 || days > Self::MAX.0 {
            return None;
        }

        Some(Self(days))
    }

    /// Days since the unix epoch.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }

    #[must_use]
    pub fn year(self) -> i32 {
        self.calendar().0
    }

    #[must_use]
    pub fn month(self) -> u8 {
        self.calendar().1
    }

    #[must_use]
    pub fn day(self) -> u8 {
        self.calendar().2
    }

    /// Parse `YYYY-MM-DD`, with a leading `-` for years before year zero.
    /// Surrounding whitespace is ignored.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (negative, text) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };

        let mut parts = text.splitn(3, '-');
        let (year, month, day) = (parts.next()?, parts.next()?, parts.next()?);

        let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if year.len() < 4 || !digits(year) || month.len() != 2 || !digits(month) {
            return None;
        }
        if day.len() != 2 || !digits(day) {
            return None;
        }

        let year: i32 = year.parse().ok()?;
        let year = if negative { -year } else { year };

        Self::new_checked(year, month.parse().ok()?, day.parse().ok()?)
    }

    // Constructors keep the day count inside `MIN..=MAX`.
    fn calendar(self) -> (i32, u8, u8) {
        let date = time::Date::from_julian_day(self.0 + UNIX_EPOCH_JULIAN_DAY)
            .unwrap_or(time::Date::MIN);

        (date.year(), date.month().into(), date.day())
    }
}

impl fmt::Debug for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Date({self})")
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (year, month, day) = self.calendar();
        if year < 0 {
            f.write_str("-")?;
        }

        write!(f, "{:04}-{month:02}-{day:02}", year.unsigned_abs())
    }
}

impl Serialize for Date {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Date {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;

        Self::parse(&text).ok_or_else(|| de::Error::custom(format!("invalid date '{text}'")))
    }
}
