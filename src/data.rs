//! Historical market table: CSV loading with Polars and in-memory queries

use crate::error::{Result, TierError};
use polars::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::path::Path;

pub const BRAND_COLUMN: &str = "brand";
pub const PRICE_COLUMN: &str = "price_usd";
pub const TIER_COLUMN: &str = "price_tier";

/// Read-only columnar view of the historical listings.
///
/// Missing values are `None`: unparseable prices, rows without a brand and
/// rows the trainer did not assign a tier.
#[derive(Debug, Clone, Default)]
pub struct HistoricalTable {
    brands: Vec<Option<String>>,
    prices: Vec<Option<f64>>,
    tiers: Vec<Option<usize>>,
}

/// One row of [`HistoricalTable`], borrowed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Row<'a> {
    pub index: usize,
    pub brand: Option<&'a str>,
    pub price: Option<f64>,
    pub tier: Option<usize>,
}

/// Brand with its occurrence count
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrandCount {
    pub brand: String,
    pub count: usize,
}

impl HistoricalTable {
    pub fn new(
        brands: Vec<Option<String>>,
        prices: Vec<Option<f64>>,
        tiers: Vec<Option<usize>>,
    ) -> Result<Self> {
        if brands.len() != prices.len() || tiers.len() != prices.len() {
            return Err(TierError::ShapeMismatch(format!(
                "brand={}, price={}, tier={}",
                brands.len(),
                prices.len(),
                tiers.len()
            )));
        }

        Ok(Self {
            brands,
            prices,
            tiers,
        })
    }

    /// Table with only a price column
    pub fn from_prices(prices: Vec<Option<f64>>) -> Self {
        let n = prices.len();
        Self {
            brands: vec![None; n],
            prices,
            tiers: vec![None; n],
        }
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        if index >= self.len() {
            return None;
        }

        Some(Row {
            index,
            brand: self.brands[index].as_deref(),
            price: self.prices[index],
            tier: self.tiers[index],
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        (0..self.len()).filter_map(move |i| self.row(i))
    }

    /// Raw price column, including missing entries
    pub fn prices(&self) -> &[Option<f64>] {
        &self.prices
    }

    /// Present prices in table order
    pub fn price_column(&self) -> Vec<f64> {
        self.prices.iter().flatten().copied().collect()
    }

    /// Replace the tier column
    pub fn with_tiers(mut self, tiers: Vec<Option<usize>>) -> Result<Self> {
        if tiers.len() != self.len() {
            return Err(TierError::ShapeMismatch(format!(
                "{} tier assignments for {} rows",
                tiers.len(),
                self.len()
            )));
        }
        self.tiers = tiers;
        Ok(self)
    }

    /// Indices of rows matching the predicate, ascending
    pub fn filter<P>(&self, predicate: P) -> Vec<usize>
    where
        P: Fn(&Row<'_>) -> bool,
    {
        self.rows()
            .filter(|row| predicate(row))
            .map(|row| row.index)
            .collect()
    }

    /// Number of rows per assigned tier id
    pub fn count_by_tier(&self) -> BTreeMap<usize, usize> {
        let mut counts = BTreeMap::new();
        for tier in self.tiers.iter().flatten() {
            *counts.entry(*tier).or_insert(0) += 1;
        }
        counts
    }

    /// Most frequent brands among the given rows.
    ///
    /// Ties keep the order in which brands first appear among `indices`, so
    /// the result does not depend on hashing. Rows without a brand are skipped.
    pub fn top_brands(&self, indices: &[usize], k: usize) -> Vec<BrandCount> {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        let mut position: HashMap<&str, usize> = HashMap::new();

        for &i in indices {
            let Some(brand) = self.brands.get(i).and_then(|b| b.as_deref()) else {
                continue;
            };
            match position.get(brand) {
                Some(&p) => counts[p].1 += 1,
                None => {
                    position.insert(brand, counts.len());
                    counts.push((brand, 1));
                }
            }
        }

        // stable sort keeps first-seen order among equal counts
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
            .into_iter()
            .take(k)
            .map(|(brand, count)| BrandCount {
                brand: brand.to_string(),
                count,
            })
            .collect()
    }
}

/// Load a CSV file into a DataFrame with every column read as text.
///
/// Typed columns are produced later by lenient casts, so a stray non-numeric
/// price becomes missing instead of failing the read.
pub fn read_frame(path: impl AsRef<Path>) -> Result<DataFrame> {
    let df = LazyCsvReader::new(path.as_ref())
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()?
        .collect()?;

    Ok(df)
}

/// Build the table from a DataFrame.
///
/// The price column is required; brand and tier columns are optional.
pub fn table_from_frame(df: &DataFrame) -> Result<HistoricalTable> {
    let n = df.height();

    let price_series = df
        .column(PRICE_COLUMN)
        .map_err(|_| TierError::MissingColumn(PRICE_COLUMN.to_string()))?;
    let prices = float_values(price_series)?;

    let brands = match df.column(BRAND_COLUMN) {
        Ok(series) => series
            .cast(&DataType::String)?
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_owned))
            .collect(),
        Err(_) => vec![None; n],
    };

    let tiers = match df.column(TIER_COLUMN) {
        Ok(series) => float_values(series)?
            .into_iter()
            .map(|v| v.and_then(tier_id))
            .collect(),
        Err(_) => vec![None; n],
    };

    HistoricalTable::new(brands, prices, tiers)
}

/// Load the historical table from CSV
pub fn load_table(path: impl AsRef<Path>) -> Result<HistoricalTable> {
    let df = read_frame(path.as_ref())?;
    let table = table_from_frame(&df)?;
    log::info!(
        "Loaded {} rows ({} with a usable price) from {}",
        table.len(),
        table.price_column().len(),
        path.as_ref().display()
    );
    Ok(table)
}

/// Append (or replace) the tier column and write the frame as CSV
pub fn write_labeled_frame(
    df: &mut DataFrame,
    tiers: &[Option<usize>],
    path: impl AsRef<Path>,
) -> Result<()> {
    let values: Vec<Option<u32>> = tiers.iter().map(|t| t.map(|id| id as u32)).collect();
    df.with_column(Series::new(TIER_COLUMN, values))?;

    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(path.as_ref())?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

/// Lenient numeric view of a column: unparseable and NaN entries become `None`
fn float_values(series: &Series) -> Result<Vec<Option<f64>>> {
    let values = series
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(values)
}

fn tier_id(value: f64) -> Option<usize> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
        Some(value as usize)
    } else {
        None
    }
}
