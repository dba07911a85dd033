//! Cron schedule codec for notification tasks.
//!
//! Tasks only vary minute, hour and day-of-week, so the stored expression is
//! always `"<minute> <hour> * * <days>"`. Encoding turns a time of day and a
//! weekday selection into that string; decoding produces the short label
//! shown in the task list, and [`parse_schedule`] recovers the form values for
//! editing.

use crate::error::{ConsoleError, Result};

/// Weekday names indexed by cron day code, Sunday = 0
pub const WEEKDAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Days shown by name before the label switches to "and N more"
const MAX_NAMED_DAYS: usize = 3;

/// A time of day with minute precision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionTime {
    pub hour: u8,
    pub minute: u8,
}

impl ExecutionTime {
    /// Build a time, rejecting out-of-range fields.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `hour > 23` or `minute > 59`
    pub fn new(hour: u8, minute: u8) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(ConsoleError::Validation(format!(
                "Invalid execution time {hour}:{minute:02}"
            )));
        }
        Ok(Self { hour, minute })
    }
}

impl std::str::FromStr for ExecutionTime {
    type Err = ConsoleError;

    /// Parses `H:MM` or `HH:MM`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConsoleError::Validation(
                "Please set the execution time".to_string(),
            ));
        }

        let invalid = || ConsoleError::Validation(format!("Invalid execution time '{s}'"));
        let (hour, minute) = s.split_once(':').ok_or_else(invalid)?;
        if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return Err(invalid());
        }
        let hour: u8 = hour.parse().map_err(|_| invalid())?;
        let minute: u8 = minute.parse().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }
}

impl std::fmt::Display for ExecutionTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Set of weekdays keyed by cron day code (Sunday = 0)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    const ALL_BITS: u8 = 0b0111_1111;

    #[must_use]
    pub fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub fn all() -> Self {
        Self(Self::ALL_BITS)
    }

    /// Build a set from day codes.
    ///
    /// # Errors
    ///
    /// Returns a validation error for any code above 6
    pub fn from_days(days: &[u8]) -> Result<Self> {
        let mut set = Self::empty();
        for &day in days {
            if day > 6 {
                return Err(ConsoleError::Validation(format!(
                    "Invalid weekday {day}, expected 0 (Sunday) to 6 (Saturday)"
                )));
            }
            set.insert(day);
        }
        Ok(set)
    }

    pub fn insert(&mut self, day: u8) {
        if day <= 6 {
            self.0 |= 1 << day;
        }
    }

    pub fn remove(&mut self, day: u8) {
        if day <= 6 {
            self.0 &= !(1 << day);
        }
    }

    /// Flip one day; returns whether it is selected afterwards.
    pub fn toggle(&mut self, day: u8) -> bool {
        if self.contains(day) {
            self.remove(day);
            false
        } else {
            self.insert(day);
            self.contains(day)
        }
    }

    #[must_use]
    pub fn contains(self, day: u8) -> bool {
        day <= 6 && self.0 & (1 << day) != 0
    }

    #[must_use]
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub fn is_all(self) -> bool {
        self.0 == Self::ALL_BITS
    }

    /// Day codes in ascending order
    pub fn days(self) -> impl Iterator<Item = u8> {
        (0..7u8).filter(move |day| self.contains(*day))
    }
}

impl std::str::FromStr for WeekdaySet {
    type Err = ConsoleError;

    /// Parses a comma-separated list of day codes such as `1,3,5`.
    fn from_str(s: &str) -> Result<Self> {
        let mut days = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let day = part.parse::<u8>().map_err(|_| {
                ConsoleError::Validation(format!("Invalid weekday '{part}'"))
            })?;
            days.push(day);
        }
        Self::from_days(&days)
    }
}

/// Encode a schedule as a 5-field cron expression.
///
/// # Errors
///
/// Returns a validation error when no weekday is selected
pub fn encode(time: ExecutionTime, days: WeekdaySet) -> Result<String> {
    if days.is_empty() {
        return Err(ConsoleError::Validation(
            "Please select at least one day".to_string(),
        ));
    }

    let day_field = if days.is_all() {
        "*".to_string()
    } else {
        days.days()
            .map(|day| day.to_string())
            .collect::<Vec<_>>()
            .join(",")
    };

    Ok(format!("{} {} * * {day_field}", time.minute, time.hour))
}

/// Summarise a cron expression for display.
///
/// This is lossy and for display only; the stored expression stays canonical.
#[must_use]
pub fn describe(expression: &str) -> String {
    let expression = expression.trim();
    if expression.is_empty() {
        return "invalid time".to_string();
    }

    let parts: Vec<&str> = expression.split_whitespace().collect();
    if parts.len() < 5 {
        return expression.to_string();
    }

    let time = format!("{:0>2}:{:0>2}", parts[1], parts[0]);
    let day_field = parts[4];

    if day_field == "*" {
        return format!("every day {time}");
    }

    let mut days = WeekdaySet::empty();
    for code in day_field.split(',') {
        if let Ok(day) = code.trim().parse::<u8>() {
            days.insert(day);
        }
    }

    let names: Vec<&str> = days.days().map(|day| WEEKDAY_NAMES[day as usize]).collect();

    if days.is_all() {
        format!("every day {time}")
    } else if names.is_empty() {
        time
    } else if names.len() <= MAX_NAMED_DAYS {
        format!("every {} {time}", names.join("、"))
    } else {
        format!(
            "every {} and {} more {time}",
            names[..2].join("、"),
            names.len() - 2
        )
    }
}

/// Recover the execution time and weekday selection from a stored expression.
///
/// # Errors
///
/// Returns a validation error if the expression does not have 5 fields or its
/// minute, hour or day fields are malformed
pub fn parse_schedule(expression: &str) -> Result<(ExecutionTime, WeekdaySet)> {
    let parts: Vec<&str> = expression.split_whitespace().collect();
    if parts.len() != 5 {
        return Err(ConsoleError::Validation(format!(
            "Unsupported schedule '{expression}'"
        )));
    }

    let invalid = || ConsoleError::Validation(format!("Unsupported schedule '{expression}'"));
    let minute: u8 = parts[0].parse().map_err(|_| invalid())?;
    let hour: u8 = parts[1].parse().map_err(|_| invalid())?;
    let time = ExecutionTime::new(hour, minute)?;

    let days = if parts[4] == "*" {
        WeekdaySet::all()
    } else {
        parts[4].parse()?
    };

    Ok((time, days))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(s: &str) -> ExecutionTime {
        s.parse().unwrap()
    }

    #[test]
    fn test_encode_every_day() {
        let cron = encode(time("09:00"), WeekdaySet::all()).unwrap();
        assert_eq!(cron, "0 9 * * *");
        assert_eq!(describe(&cron), "every day 09:00");
    }

    #[test]
    fn test_encode_selected_days() {
        let days = WeekdaySet::from_days(&[5, 1, 3]).unwrap();
        let cron = encode(time("14:30"), days).unwrap();
        assert_eq!(cron, "30 14 * * 1,3,5");
        assert_eq!(describe(&cron), "every Mon、Wed、Fri 14:30");
    }

    #[test]
    fn test_encode_rejects_empty_day_set() {
        let err = encode(time("09:00"), WeekdaySet::empty()).unwrap_err();
        assert!(matches!(err, ConsoleError::Validation(_)));
    }

    #[test]
    fn test_describe_more_than_three_days() {
        assert_eq!(describe("0 9 * * 1,2,3,4"), "every Mon、Tue and 2 more 09:00");
    }

    #[test]
    fn test_describe_all_days_listed_collapses() {
        assert_eq!(describe("5 7 * * 0,1,2,3,4,5,6"), "every day 07:05");
    }

    #[test]
    fn test_describe_edge_inputs() {
        assert_eq!(describe(""), "invalid time");
        assert_eq!(describe("0 9 *"), "0 9 *");
        assert_eq!(describe("0 9 * * 8,9"), "09:00");
        assert_eq!(describe("0 9 * * 1,1,1"), "every Mon 09:00");
    }

    #[test]
    fn test_cardinality_rule_holds_for_every_subset() {
        for bits in 1u8..=0b0111_1111 {
            let days: Vec<u8> = (0..7).filter(|d| bits & (1 << d) != 0).collect();
            let set = WeekdaySet::from_days(&days).unwrap();
            for (hour, minute) in [(0, 0), (9, 5), (23, 59)] {
                let t = ExecutionTime::new(hour, minute).unwrap();
                let label = describe(&encode(t, set).unwrap());
                let time_label = t.to_string();
                assert!(label.ends_with(&time_label), "{label}");

                match days.len() {
                    7 => assert_eq!(label, format!("every day {time_label}")),
                    1..=3 => {
                        for day in &days {
                            assert!(label.contains(WEEKDAY_NAMES[*day as usize]), "{label}");
                        }
                        assert!(!label.contains("more"));
                    }
                    n => {
                        assert!(label.contains(&format!("and {} more", n - 2)), "{label}");
                        assert!(label.contains(WEEKDAY_NAMES[days[0] as usize]));
                        assert!(label.contains(WEEKDAY_NAMES[days[1] as usize]));
                    }
                }
            }
        }
    }

    #[test]
    fn test_parse_schedule_inverts_encode() {
        for bits in 1u8..=0b0111_1111 {
            let days: Vec<u8> = (0..7).filter(|d| bits & (1 << d) != 0).collect();
            let set = WeekdaySet::from_days(&days).unwrap();
            let t = ExecutionTime::new(18, 45).unwrap();
            let (parsed_time, parsed_days) = parse_schedule(&encode(t, set).unwrap()).unwrap();
            assert_eq!(parsed_time, t);
            assert_eq!(parsed_days, set);
        }
    }

    #[test]
    fn test_execution_time_parsing() {
        assert_eq!(time("9:05"), ExecutionTime { hour: 9, minute: 5 });
        assert_eq!(time("23:59").to_string(), "23:59");
        assert!("".parse::<ExecutionTime>().is_err());
        assert!("24:00".parse::<ExecutionTime>().is_err());
        assert!("12:60".parse::<ExecutionTime>().is_err());
        assert!("12:5".parse::<ExecutionTime>().is_err());
        assert!("noon".parse::<ExecutionTime>().is_err());
    }

    #[test]
    fn test_weekday_set_toggle_and_parse() {
        let mut set: WeekdaySet = "1, 3".parse().unwrap();
        assert!(set.toggle(5));
        assert!(!set.toggle(1));
        assert_eq!(set.days().collect::<Vec<_>>(), vec![3, 5]);
        assert!("7".parse::<WeekdaySet>().is_err());
        assert!("mon".parse::<WeekdaySet>().is_err());
    }
}
