//! Expense records as extracted from a model response, and their spreadsheet row form.

use crate::error::Res;
use crate::model::Amount;
use anyhow::{bail, Context};
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

/// The literal written in the Date column. No date resolution is performed.
pub const TODAY: &str = "Today";

/// The six header cells written to `A1:F1` when the sheet has no header yet. The last two form a
/// running total over the Amount column.
pub const HEADER: [&str; 6] = ["Date", "Item", "Amount", "Category", "TOTAL:", "=SUM(C:C)"];

/// The spending categories the model is asked to choose from.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
pub enum Category {
    Food,
    Transport,
    Shopping,
    Other,
}

serde_plain::derive_display_from_serialize!(Category);

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Food,
        Category::Transport,
        Category::Shopping,
        Category::Other,
    ];
}

impl FromStr for Category {
    type Err = anyhow::Error;

    /// Matches case-insensitively, ignoring surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.to_string().eq_ignore_ascii_case(s))
            .with_context(|| {
                format!("Invalid category '{s}', expected one of Food, Transport, Shopping, Other")
            })
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Category::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// One expense as returned by the model.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    #[serde(deserialize_with = "trimmed")]
    item: String,
    amount: Amount,
    category: Category,
}

impl ExpenseRecord {
    /// Creates a validated record. The item must be non-empty and the amount must be positive.
    pub fn new(item: impl Into<String>, amount: Amount, category: Category) -> Res<Self> {
        let record = Self {
            item: item.into().trim().to_string(),
            amount,
            category,
        };
        record.validate()?;
        Ok(record)
    }

    fn validate(&self) -> Res<()> {
        if self.item.trim().is_empty() {
            bail!("An expense item must not be empty");
        }
        if !self.amount.is_positive() {
            bail!(
                "The amount for '{}' must be positive, got {}",
                self.item,
                self.amount
            );
        }
        Ok(())
    }

    pub fn item(&self) -> &str {
        &self.item
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Flattens the record into the four cells written to `A{row}:D{row}`.
    pub fn sheet_row(&self) -> SheetRow {
        SheetRow([
            TODAY.to_string(),
            self.item.clone(),
            self.amount.to_string(),
            self.category.to_string(),
        ])
    }
}

fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(String::deserialize(deserializer)?.trim().to_string())
}

/// The on-the-wire shape of a ledger row: `[Date, Item, Amount, Category]`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct SheetRow([String; 4]);

impl SheetRow {
    pub fn cells(&self) -> &[String; 4] {
        &self.0
    }

    pub(crate) fn into_values(self) -> Vec<Vec<String>> {
        vec![self.0.to_vec()]
    }
}

/// The ordered records extracted from one line of input.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct ExtractionBatch {
    records: Vec<ExpenseRecord>,
    total: Amount,
}

/// The JSON object the model is instructed to return.
#[derive(Debug, Deserialize)]
struct Payload {
    items: Vec<ExpenseRecord>,
}

impl ExtractionBatch {
    /// Creates a batch. Fails if the amounts cannot be summed without overflowing.
    pub fn new(records: Vec<ExpenseRecord>) -> Res<Self> {
        let total = Amount::checked_sum(records.iter().map(ExpenseRecord::amount))
            .context("The amounts are too large to add up")?;
        Ok(Self { records, total })
    }

    /// Decodes `{"items": [...]}` into a batch, rejecting missing fields, unknown categories,
    /// empty items and non-positive amounts.
    pub fn from_json(json: &str) -> Res<Self> {
        let payload: Payload =
            serde_json::from_str(json).context("The response is not a valid expense payload")?;
        for (ix, record) in payload.items.iter().enumerate() {
            record
                .validate()
                .with_context(|| format!("Invalid expense at index {ix}"))?;
        }
        Self::new(payload.items)
    }

    pub fn records(&self) -> &[ExpenseRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The local sum of all amounts in the batch.
    pub fn total(&self) -> Amount {
        self.total
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExpenseRecord> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a ExtractionBatch {
    type Item = &'a ExpenseRecord;
    type IntoIter = std::slice::Iter<'a, ExpenseRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
