use crate::types::{Category, OrderRecord, PaymentType, UserType};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;
use tracing::{info, warn};

/// Writes the order table, replacing any previous file.
pub fn write_orders(path: &Path, records: &[OrderRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
    }

    let file = File::create(path).with_context(|| format!("Failed to create order table: {:?}", path))?;
    let mut wtr = WriterBuilder::new().from_writer(file);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;

    info!("Wrote {} orders to {:?}", records.len(), path);
    Ok(())
}

/// In-memory handle over the order table. Owned by whoever serves
/// queries; nothing here is global.
#[derive(Debug, Clone, Default)]
pub struct OrderStore {
    records: Vec<OrderRecord>,
}

impl OrderStore {
    pub fn from_records(records: Vec<OrderRecord>) -> Self {
        Self { records }
    }

    /// Loads the table. A missing file gives an empty store so the API
    /// can still come up; a malformed row is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Order table {:?} not found, serving an empty dataset", path);
            return Ok(Self::default());
        }

        let file = File::open(path).with_context(|| format!("Failed to open order table: {:?}", path))?;
        let mut rdr = ReaderBuilder::new().from_reader(file);

        let mut records = Vec::new();
        for (line, result) in rdr.deserialize().enumerate() {
            let record: OrderRecord =
                result.with_context(|| format!("Malformed order on data row {}", line + 1))?;
            records.push(record);
        }

        info!("Loaded {} orders from {:?}", records.len(), path);
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[OrderRecord] {
        &self.records
    }

    pub fn filter(&self, filter: &OrderFilter) -> Vec<&OrderRecord> {
        self.records.iter().filter(|r| filter.matches(r)).collect()
    }

    /// Values and ranges the dashboard offers as filter controls. Value
    /// lists are sorted by label.
    pub fn options(&self) -> FilterOptions {
        if self.records.is_empty() {
            return FilterOptions::empty();
        }

        let mut user_types = BTreeSet::new();
        let mut categories = BTreeSet::new();
        let mut payment_types = BTreeSet::new();
        let (mut min_price, mut max_price) = (u64::MAX, u64::MIN);
        let (mut min_date, mut max_date) = (NaiveDate::MAX, NaiveDate::MIN);

        for r in &self.records {
            user_types.insert(r.type_user);
            categories.insert(r.category_name);
            payment_types.insert(r.type_of_payment);
            min_price = min_price.min(r.price_of_order);
            max_price = max_price.max(r.price_of_order);
            min_date = min_date.min(r.ship_date);
            max_date = max_date.max(r.ship_date);
        }

        FilterOptions {
            user_types: by_label(user_types, UserType::as_str),
            categories: by_label(categories, Category::as_str),
            payment_types: by_label(payment_types, PaymentType::as_str),
            min_price,
            max_price,
            min_date,
            max_date,
        }
    }
}

/// A conjunction of optional predicates. Empty lists and `None` bounds
/// do not constrain anything; all bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderFilter {
    pub user_types: Vec<UserType>,
    pub categories: Vec<Category>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,
    pub payment_types: Vec<PaymentType>,
}

impl OrderFilter {
    pub fn matches(&self, r: &OrderRecord) -> bool {
        one_of(&self.user_types, &r.type_user)
            && one_of(&self.categories, &r.category_name)
            && one_of(&self.payment_types, &r.type_of_payment)
            && self.start_date.map_or(true, |d| r.ship_date >= d)
            && self.end_date.map_or(true, |d| r.ship_date <= d)
            && self.min_price.map_or(true, |p| r.price_of_order >= p)
            && self.max_price.map_or(true, |p| r.price_of_order <= p)
    }
}

/// Distinct values ordered by their table label, as a dropdown shows them.
fn by_label<T: Copy>(values: BTreeSet<T>, label: fn(T) -> &'static str) -> Vec<T> {
    let mut values: Vec<T> = values.into_iter().collect();
    values.sort_by_key(|v| label(*v));
    values
}

fn one_of<T: PartialEq>(allowed: &[T], value: &T) -> bool {
    allowed.is_empty() || allowed.contains(value)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOptions {
    pub user_types: Vec<UserType>,
    pub categories: Vec<Category>,
    pub payment_types: Vec<PaymentType>,
    pub min_price: u64,
    pub max_price: u64,
    pub min_date: NaiveDate,
    pub max_date: NaiveDate,
}

impl FilterOptions {
    /// Control defaults when there is no data to derive them from.
    fn empty() -> Self {
        Self {
            user_types: Vec::new(),
            categories: Vec::new(),
            payment_types: Vec::new(),
            min_price: 0,
            max_price: 1000,
            min_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or(NaiveDate::MIN),
            max_date: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap_or(NaiveDate::MAX),
        }
    }
}
