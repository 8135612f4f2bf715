//! Three-field (day / month / year) keyboard date entry.
//!
//! Replaces the native date input on mobile with three numeric inputs. The
//! model value is always `YYYY-MM-DD` or empty.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One of the three keyboard inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Segment {
    Day,
    Month,
    Year,
}

impl Segment {
    pub fn max_len(self) -> usize {
        match self {
            Segment::Day | Segment::Month => 2,
            Segment::Year => 4,
        }
    }

    pub fn placeholder(self) -> &'static str {
        match self {
            Segment::Day => "DD",
            Segment::Month => "MM",
            Segment::Year => "YYYY",
        }
    }

    pub fn next(self) -> Option<Segment> {
        match self {
            Segment::Day => Some(Segment::Month),
            Segment::Month => Some(Segment::Year),
            Segment::Year => None,
        }
    }

    pub fn previous(self) -> Option<Segment> {
        match self {
            Segment::Day => None,
            Segment::Month => Some(Segment::Day),
            Segment::Year => Some(Segment::Month),
        }
    }
}

/// What the field model should do after an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelUpdate {
    /// All three parts form a real date.
    Set(String),
    /// Input is incomplete; the model value is cleared.
    Clear,
    /// Complete but not a calendar date; leave the model alone.
    Unchanged,
}

/// Result of typing into one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputOutcome {
    /// Sanitized text to write back into the input.
    pub value: String,
    /// Segment that should take focus next, if any.
    pub focus: Option<Segment>,
    pub update: ModelUpdate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSegments {
    pub day: String,
    pub month: String,
    pub year: String,
}

impl DateSegments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a `YYYY-MM-DD` model value into segments.
    pub fn from_value(value: &str) -> Option<Self> {
        let mut parts = value.split('-');
        let (Some(year), Some(month), Some(day), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return None;
        };
        Some(Self {
            day: day.to_string(),
            month: month.to_string(),
            year: year.to_string(),
        })
    }

    pub fn get(&self, segment: Segment) -> &str {
        match segment {
            Segment::Day => &self.day,
            Segment::Month => &self.month,
            Segment::Year => &self.year,
        }
    }

    fn get_mut(&mut self, segment: Segment) -> &mut String {
        match segment {
            Segment::Day => &mut self.day,
            Segment::Month => &mut self.month,
            Segment::Year => &mut self.year,
        }
    }

    /// Apply raw keyboard input to a segment.
    ///
    /// Non-digits are dropped and the input is cut to the segment's length.
    /// A full day or month moves focus on to the next segment.
    pub fn input(&mut self, segment: Segment, raw: &str) -> InputOutcome {
        let digits: String = raw
            .chars()
            .filter(char::is_ascii_digit)
            .take(segment.max_len())
            .collect();
        let focus = match segment {
            Segment::Day | Segment::Month if digits.len() == 2 => segment.next(),
            _ => None,
        };
        *self.get_mut(segment) = digits.clone();
        InputOutcome {
            value: digits,
            focus,
            update: self.model_update(),
        }
    }

    /// Where focus goes when backspace is pressed in `segment`.
    pub fn backspace(&self, segment: Segment) -> Option<Segment> {
        if self.get(segment).is_empty() {
            segment.previous()
        } else {
            None
        }
    }

    /// Normalize on blur: pad single digits and drop out-of-range day or month.
    pub fn validate_and_format(&mut self) -> ModelUpdate {
        for segment in [Segment::Day, Segment::Month] {
            let value = self.get_mut(segment);
            if value.len() == 1 {
                *value = format!("0{value}");
            }
        }

        if out_of_range(&self.day, 1..=31) {
            self.day.clear();
        }
        if out_of_range(&self.month, 1..=12) {
            self.month.clear();
        }

        self.model_update()
    }

    pub fn model_update(&self) -> ModelUpdate {
        if self.year.len() != 4 {
            return ModelUpdate::Clear;
        }
        let day = format!("{:0>2}", self.day);
        let month = format!("{:0>2}", self.month);
        let value = format!("{}-{month}-{day}", self.year);
        match NaiveDate::parse_from_str(&value, "%Y-%m-%d") {
            Ok(_) => ModelUpdate::Set(value),
            Err(_) => ModelUpdate::Unchanged,
        }
    }
}

/// A zero value reads as "not entered yet", not as out of range.
fn out_of_range(value: &str, range: std::ops::RangeInclusive<u32>) -> bool {
    match value.parse::<u32>() {
        Ok(0) | Err(_) => false,
        Ok(n) => !range.contains(&n),
    }
}

/// Interactive flags of the picker, mirrored from field state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldView {
    pub enabled: bool,
    pub read_only: bool,
    pub visible: bool,
}

impl Default for FieldView {
    fn default() -> Self {
        Self {
            enabled: true,
            read_only: false,
            visible: true,
        }
    }
}

impl FieldView {
    /// Apply the flags present in a field state object; absent keys keep
    /// their current value.
    pub fn apply(&mut self, state: &Value) {
        if let Some(enabled) = state.get("enabled").and_then(Value::as_bool) {
            self.enabled = enabled;
        }
        if let Some(read_only) = state.get("readOnly").and_then(Value::as_bool) {
            self.read_only = read_only;
        }
        if let Some(visible) = state.get("visible").and_then(Value::as_bool) {
            self.visible = visible;
        }
    }

    /// The calendar picker opens only for editable fields.
    pub fn picker_disabled(&self) -> bool {
        !self.enabled || self.read_only
    }

    pub fn inputs_disabled(&self) -> bool {
        !self.enabled
    }
}
