use std::fmt;

use crate::error::CronError;

/// One column of a cron expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CronField {
    Second,
    Minute,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
}

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const DAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

impl CronField {
    pub const fn min(self) -> u32 {
        match self {
            CronField::DayOfMonth | CronField::Month => 1,
            _ => 0,
        }
    }

    /// Day-of-week allows 7 as a second spelling of Sunday.
    pub const fn max(self) -> u32 {
        match self {
            CronField::Second | CronField::Minute => 59,
            CronField::Hour => 23,
            CronField::DayOfMonth => 31,
            CronField::Month => 12,
            CronField::DayOfWeek => 7,
        }
    }

    /// Number of distinct values, which is also the modulus that
    /// wraparound ranges are taken in.
    pub const fn size(self) -> u32 {
        self.max() - self.min() + 1
    }

    pub const fn name(self) -> &'static str {
        match self {
            CronField::Second => "second",
            CronField::Minute => "minute",
            CronField::Hour => "hour",
            CronField::DayOfMonth => "day-of-month",
            CronField::Month => "month",
            CronField::DayOfWeek => "day-of-week",
        }
    }

    fn value_of(self, token: &str, text: &str) -> Result<u32, CronError> {
        let value = match number(text) {
            Some(n) => n,
            None => self
                .alias(text)
                .ok_or_else(|| CronError::parse(self, token, format!("`{text}` is not a number")))?,
        };
        if value < self.min() || value > self.max() {
            return Err(CronError::parse(
                self,
                token,
                format!("{value} is out of range {}-{}", self.min(), self.max()),
            ));
        }
        Ok(value)
    }

    fn alias(self, text: &str) -> Option<u32> {
        let (names, first): (&[&str], u32) = match self {
            CronField::Month => (&MONTH_NAMES[..], 1),
            CronField::DayOfWeek => (&DAY_NAMES[..], 0),
            _ => return None,
        };
        names
            .iter()
            .position(|name| name.eq_ignore_ascii_case(text))
            .map(|index| index as u32 + first)
    }
}

/// Plain decimal digits only, so signs like `+5` are rejected.
fn number(text: &str) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

impl fmt::Display for CronField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Membership set over the values of one cron field.
///
/// Bit `n` is set when value `n` is allowed. Every field fits in 64 bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldMask {
    field: CronField,
    bits: u64,
    restricted: bool,
}

impl FieldMask {
    /// A mask allowing every value, as if parsed from `*`.
    pub fn all(field: CronField) -> Self {
        let mut mask = Self::empty(field, false);
        mask.insert_range(field.min(), field.max(), 1);
        mask
    }

    /// A mask allowing exactly one value.
    pub fn single(field: CronField, value: u32) -> Result<Self, CronError> {
        Self::parse(field, &value.to_string())
    }

    fn empty(field: CronField, restricted: bool) -> Self {
        Self {
            field,
            bits: 0,
            restricted,
        }
    }

    /// Parses one field of a cron expression: a comma separated list of
    /// `*`, `N`, `A-B`, `A-B/S`, `A/S` or `*/S`.
    ///
    /// A range whose start is above its end wraps past the field's maximum
    /// back to its minimum, so `7-3` on day-of-week is `{7, 0, 1, 2, 3}`.
    pub fn parse(field: CronField, text: &str) -> Result<Self, CronError> {
        let mut mask = Self::empty(field, !text.starts_with('*'));
        for item in text.split(',') {
            mask.parse_item(item)?;
        }
        Ok(mask)
    }

    fn parse_item(&mut self, item: &str) -> Result<(), CronError> {
        let field = self.field;
        if item.is_empty() {
            return Err(CronError::parse(field, item, "empty list item"));
        }
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step = number(step).ok_or_else(|| {
                    CronError::parse(field, item, format!("step `{step}` is not a number"))
                })?;
                if step == 0 {
                    return Err(CronError::parse(field, item, "step must be positive"));
                }
                (range, Some(step))
            }
            None => (item, None),
        };
        let (start, end) = if range == "*" {
            (field.min(), field.max())
        } else {
            match range.split_once('-') {
                Some((start, end)) => (field.value_of(item, start)?, field.value_of(item, end)?),
                None => {
                    let start = field.value_of(item, range)?;
                    match step {
                        Some(_) => (start, field.max()),
                        None => (start, start),
                    }
                }
            }
        };
        self.insert_range(start, end, step.unwrap_or(1));
        Ok(())
    }

    fn insert_range(&mut self, start: u32, end: u32, step: u32) {
        let (min, size) = (self.field.min(), self.field.size());
        let span = (end + size - start) % size;
        for offset in (0..=span).step_by(step as usize) {
            let value = min + (start - min + offset) % size;
            self.bits |= 1u64 << value;
        }
    }

    pub fn field(&self) -> CronField {
        self.field
    }

    pub fn contains(&self, value: u32) -> bool {
        value < 64 && self.bits & (1u64 << value) != 0
    }

    /// False when the field was written starting with `*`.
    pub fn is_restricted(&self) -> bool {
        self.restricted
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Smallest allowed value.
    pub fn first(&self) -> Option<u32> {
        self.next_at_or_after(0)
    }

    /// Smallest allowed value that is `>= value`.
    pub fn next_at_or_after(&self, value: u32) -> Option<u32> {
        if value >= 64 {
            return None;
        }
        let remaining = self.bits >> value;
        if remaining == 0 {
            None
        } else {
            Some(value + remaining.trailing_zeros())
        }
    }

    /// Allowed values in ascending order.
    pub fn values(&self) -> impl Iterator<Item = u32> + '_ {
        (0..64).filter(move |&v| self.contains(v))
    }
}
