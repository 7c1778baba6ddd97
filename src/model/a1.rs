//! A1 notation for addressing spreadsheet ranges, e.g. `A1:F1`, `A:A` or `'Expenses'!A2:D2`.
//!
//! Rows are 1-indexed. Columns are stored 0-indexed and displayed as letters (A..Z, AA..).

use std::fmt;
use std::str::FromStr;

/// One end of a range. `row` is `None` for whole-column references such as the `A` in `A:A`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Cell {
    col: u32,
    row: Option<u32>,
}

impl Cell {
    /// Creates a cell reference. `col` is 0-indexed, `row` is 1-indexed.
    pub fn new(col: u32, row: u32) -> Self {
        Self {
            col,
            row: Some(row),
        }
    }

    /// Creates a whole-column reference.
    pub fn column(col: u32) -> Self {
        Self { col, row: None }
    }

    pub fn col(&self) -> u32 {
        self.col
    }

    pub fn row(&self) -> Option<u32> {
        self.row
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", column_letters(self.col))?;
        if let Some(row) = self.row {
            write!(f, "{row}")?;
        }
        Ok(())
    }
}

impl FromStr for Cell {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(s.len());
        let (letters, digits) = s.split_at(split);
        let col = column_index(letters)?;
        if digits.is_empty() {
            return Ok(Cell::column(col));
        }
        let row = digits
            .parse::<u32>()
            .map_err(|e| anyhow::anyhow!("Invalid row in cell reference '{s}': {e}"))?;
        if row == 0 {
            anyhow::bail!("Rows are 1-indexed, got row 0 in '{s}'");
        }
        Ok(Cell::new(col, row))
    }
}

/// A rectangular range on an optional tab. A single cell is a range whose start and end are equal.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct A1Range {
    tab: Option<String>,
    start: Cell,
    end: Cell,
}

impl A1Range {
    pub fn new(start: Cell, end: Cell) -> Self {
        Self {
            tab: None,
            start,
            end,
        }
    }

    /// The range spanning columns `first_col..=last_col` of a single 1-indexed `row`.
    pub fn row_span(row: u32, first_col: u32, last_col: u32) -> Self {
        Self::new(Cell::new(first_col, row), Cell::new(last_col, row))
    }

    /// The whole of column `col`.
    pub fn whole_column(col: u32) -> Self {
        Self::new(Cell::column(col), Cell::column(col))
    }

    /// Returns the same range addressed on `tab`, or on the default tab when `tab` is `None`.
    pub fn on_tab(mut self, tab: Option<&str>) -> Self {
        self.tab = tab.map(str::to_string);
        self
    }

    pub fn tab(&self) -> Option<&str> {
        self.tab.as_deref()
    }

    pub fn start(&self) -> Cell {
        self.start
    }

    pub fn end(&self) -> Cell {
        self.end
    }
}

impl fmt::Display for A1Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tab) = &self.tab {
            write!(f, "'{}'!", tab.replace('\'', "''"))?;
        }
        write!(f, "{}:{}", self.start, self.end)
    }
}

impl FromStr for A1Range {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (tab, cells) = match s.rsplit_once('!') {
            Some((tab, cells)) => (Some(unquote_tab(tab)), cells),
            None => (None, s),
        };
        let (start, end) = match cells.split_once(':') {
            Some((start, end)) => (start.parse::<Cell>()?, end.parse::<Cell>()?),
            None => {
                let cell = cells.parse::<Cell>()?;
                (cell, cell)
            }
        };
        if start.row.is_some() != end.row.is_some() {
            anyhow::bail!("Mixed whole-column and cell references are not supported: {s}");
        }
        Ok(Self { tab, start, end })
    }
}

fn unquote_tab(tab: &str) -> String {
    let tab = tab.trim();
    match tab.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        Some(inner) => inner.replace("''", "'"),
        None => tab.to_string(),
    }
}

/// Converts a 0-indexed column into its letters: 0 -> A, 25 -> Z, 26 -> AA.
pub fn column_letters(col: u32) -> String {
    let mut n = col + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Converts column letters into a 0-indexed column: A -> 0, Z -> 25, AA -> 26.
pub fn column_index(letters: &str) -> anyhow::Result<u32> {
    if letters.is_empty() {
        anyhow::bail!("A cell reference must start with a column letter");
    }
    let mut n: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            anyhow::bail!("Invalid column letters '{letters}'");
        }
        let digit = (c.to_ascii_uppercase() as u32) - ('A' as u32) + 1;
        n = n
            .checked_mul(26)
            .and_then(|n| n.checked_add(digit))
            .ok_or_else(|| anyhow::anyhow!("Column '{letters}' is out of range"))?;
    }
    Ok(n - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(3), "D");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(701), "ZZ");
        assert_eq!(column_letters(702), "AAA");
    }

    #[test]
    fn test_column_index() {
        assert_eq!(column_index("A").unwrap(), 0);
        assert_eq!(column_index("f").unwrap(), 5);
        assert_eq!(column_index("AA").unwrap(), 26);
        assert!(column_index("").is_err());
        assert!(column_index("A1").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(A1Range::row_span(1, 0, 5).to_string(), "A1:F1");
        assert_eq!(A1Range::row_span(7, 0, 3).to_string(), "A7:D7");
        assert_eq!(A1Range::whole_column(0).to_string(), "A:A");
        assert_eq!(
            A1Range::row_span(2, 0, 3)
                .on_tab(Some("Bob's"))
                .to_string(),
            "'Bob''s'!A2:D2"
        );
    }

    #[test]
    fn test_from_str() {
        let r: A1Range = "A2:D2".parse().unwrap();
        assert_eq!(r, A1Range::row_span(2, 0, 3));

        let r: A1Range = "A:A".parse().unwrap();
        assert_eq!(r, A1Range::whole_column(0));

        let r: A1Range = "'Bob''s'!A2:D2".parse().unwrap();
        assert_eq!(r.tab(), Some("Bob's"));
        assert_eq!(r.start(), Cell::new(0, 2));

        let r: A1Range = "Sheet1!C5".parse().unwrap();
        assert_eq!(r.tab(), Some("Sheet1"));
        assert_eq!(r.start(), r.end());
    }

    #[test]
    fn test_from_str_invalid() {
        assert!("".parse::<A1Range>().is_err());
        assert!("A0:B1".parse::<A1Range>().is_err());
        assert!("A:B2".parse::<A1Range>().is_err());
        assert!("12:13".parse::<A1Range>().is_err());
    }
}
