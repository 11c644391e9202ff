use crate::types::{Category, GeneratedPoint, OrderRecord, PaymentType, UserType};
use anyhow::{ensure, Result};
use chrono::{Duration, NaiveDate};
use rand::seq::SliceRandom;
use rand::Rng;

/// Half-open range of ship dates, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        ensure!(start < end, "ship date range is empty: {} .. {}", start, end);
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> NaiveDate {
        let days = (self.end - self.start).num_days();
        self.start + Duration::days(rng.gen_range(0..days))
    }
}

impl Default for DateRange {
    /// Calendar year 2024.
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(NaiveDate::MIN),
            end: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or(NaiveDate::MAX),
        }
    }
}

const NON_INVOICE: [PaymentType; 4] = [
    PaymentType::Cash,
    PaymentType::Card,
    PaymentType::QrCode,
    PaymentType::Credit,
];

/// Turns sampled locations into order rows with random business fields.
pub fn enrich<R: Rng>(points: &[GeneratedPoint], dates: DateRange, rng: &mut R) -> Vec<OrderRecord> {
    points
        .iter()
        .map(|p| {
            let type_user = pick(UserType::ALL, rng);
            OrderRecord {
                latitude: p.latitude,
                longitude: p.longitude,
                type_user,
                category_name: pick(Category::ALL, rng),
                ship_date: dates.sample(rng),
                price_of_order: random_price(rng),
                type_of_payment: payment_for(type_user, rng),
            }
        })
        .collect()
}

fn pick<T: Copy, R: Rng>(values: &[T], rng: &mut R) -> T {
    // Value sets are non-empty constants.
    *values.choose(rng).unwrap_or(&values[0])
}

/// A number of 1 to 9 digits, the digit count itself uniform.
fn random_price<R: Rng>(rng: &mut R) -> u64 {
    let digits = rng.gen_range(1..=9u32);
    rng.gen_range(0..10u64.pow(digits))
}

fn payment_for<R: Rng>(user: UserType, rng: &mut R) -> PaymentType {
    if user.pays_by_invoice() {
        PaymentType::Invoice
    } else {
        pick(&NON_INVOICE, rng)
    }
}
