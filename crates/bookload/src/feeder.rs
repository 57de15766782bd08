//! Synthetic booking records.
//!
//! [`BookingFeeder`] is an endless iterator of [`FeederRecord`]s drawn from an
//! explicitly supplied random source. Seed the source to make a run
//! reproducible; the iterator itself cannot be rewound.

use crate::session::Value;
use chrono::{Days, NaiveDate};
use rand::Rng;
use std::collections::BTreeMap;

/// The two `additionalneeds` values a booking can carry
pub const NEEDS: [&str; 2] = ["Breakfast", "Late checkout"];

/// Prefix of generated first names
pub const FIRSTNAME_PREFIX: &str = "User";

/// Prefix of generated last names
pub const LASTNAME_PREFIX: &str = "Perf";

/// One generated record, field name to value
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeederRecord {
    fields: BTreeMap<String, Value>,
}

impl FeederRecord {
    /// Create an empty record
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Look up a field
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Number of fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl IntoIterator for FeederRecord {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Endless generator of booking records
#[derive(Debug)]
pub struct BookingFeeder<R> {
    rng: R,
    today: NaiveDate,
}

impl<R: Rng> BookingFeeder<R> {
    /// Create a feeder anchored at the local date
    pub fn new(rng: R) -> Self {
        Self::with_today(rng, chrono::Local::now().date_naive())
    }

    /// Create a feeder anchored at a fixed date
    pub fn with_today(rng: R, today: NaiveDate) -> Self {
        Self { rng, today }
    }

    /// Date check-in offsets are counted from
    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Draw the next record
    pub fn draw(&mut self) -> FeederRecord {
        let rng = &mut self.rng;
        let checkin = add_days(self.today, rng.random_range(1..10));
        let checkout = add_days(checkin, rng.random_range(1..5));

        FeederRecord::new()
            .with(
                "firstname",
                format!("{FIRSTNAME_PREFIX}{}", rng.random_range(0..100_000)),
            )
            .with(
                "lastname",
                format!("{LASTNAME_PREFIX}{}", rng.random_range(0..100_000)),
            )
            .with("totalprice", rng.random_range(50_i64..500))
            .with("depositpaid", rng.random_bool(0.5))
            .with("checkin", checkin)
            .with("checkout", checkout)
            .with("needs", NEEDS[usize::from(rng.random_bool(0.5))])
    }
}

impl<R: Rng> Iterator for BookingFeeder<R> {
    type Item = FeederRecord;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.draw())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

fn add_days(date: NaiveDate, days: u64) -> NaiveDate {
    // Past year 262143 chrono cannot represent the date; stay put.
    date.checked_add_days(Days::new(days)).unwrap_or(date)
}
