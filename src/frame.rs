//! Date-indexed series and tables.
//!
//! Every numeric input and output of the engines travels as a [`Series`] or a
//! [`Frame`]: values carried on an explicit, sorted, unique [`NaiveDate`]
//! index. Range queries are binary searches over the index, and missing
//! observations are explicit `Option<f64>` values rather than silent NaNs.
//! Each transform documents its fill policy; nothing back-fills.

use crate::error::{BacktestError, Result};
use chrono::{Datelike, Days, Months, NaiveDate};
use serde::Serialize;

/// Annualization factor for monthly observations.
pub const MONTHS_PER_YEAR: f64 = 12.0;

/// Last calendar day of the month containing `date`.
pub fn month_end(date: NaiveDate) -> NaiveDate {
    let first = NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap();
    first + Months::new(1) - Days::new(1)
}

/// Shift a date by whole calendar years, clamping to the end of the month
/// when the target day does not exist (Feb 29 -> Feb 28).
pub fn add_years(date: NaiveDate, years: i32) -> NaiveDate {
    let year = date.year() + years;
    NaiveDate::from_ymd_opt(year, date.month(), date.day()).unwrap_or_else(|| {
        month_end(NaiveDate::from_ymd_opt(year, date.month(), 1).unwrap())
    })
}

/// Sorted intersection of two ascending date slices.
pub fn intersect_dates(a: &[NaiveDate], b: &[NaiveDate]) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

fn check_ascending(dates: &[NaiveDate]) -> Result<()> {
    for pair in dates.windows(2) {
        if pair[1] <= pair[0] {
            return Err(BacktestError::InvalidIndex(format!(
                "dates must be strictly increasing, found {} after {}",
                pair[1], pair[0]
            )));
        }
    }
    Ok(())
}

/// First position whose date is >= `date`.
fn lower_bound(dates: &[NaiveDate], date: NaiveDate) -> usize {
    dates.partition_point(|&d| d < date)
}

/// First position whose date is > `date`.
fn upper_bound(dates: &[NaiveDate], date: NaiveDate) -> usize {
    dates.partition_point(|&d| d <= date)
}

fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(var.sqrt())
}

/// A single date-indexed numeric series with explicit missing values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    dates: Vec<NaiveDate>,
    values: Vec<Option<f64>>,
}

impl Series {
    /// Create a series. Dates must be strictly increasing and match the
    /// value count.
    pub fn new(dates: Vec<NaiveDate>, values: Vec<Option<f64>>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(BacktestError::DataError(format!(
                "series length mismatch: {} dates, {} values",
                dates.len(),
                values.len()
            )));
        }
        check_ascending(&dates)?;
        Ok(Self { dates, values })
    }

    /// An empty series.
    pub fn empty() -> Self {
        Self {
            dates: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, Option<f64>)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }

    /// Value at an exact date, if the date is on the index.
    pub fn at(&self, date: NaiveDate) -> Option<Option<f64>> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|i| self.values[i])
    }

    /// Number of non-missing observations.
    pub fn count_valid(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// Date of the first non-missing observation.
    pub fn first_valid_date(&self) -> Option<NaiveDate> {
        self.iter().find(|(_, v)| v.is_some()).map(|(d, _)| d)
    }

    /// Percent change over `periods` observations. The first `periods`
    /// entries are missing, as is any entry whose base is missing or zero.
    pub fn pct_change(&self, periods: usize) -> Self {
        let values = (0..self.len())
            .map(|i| {
                if i < periods {
                    return None;
                }
                match (self.values[i - periods], self.values[i]) {
                    (Some(prev), Some(cur)) if prev != 0.0 => Some(cur / prev - 1.0),
                    _ => None,
                }
            })
            .collect();
        Self {
            dates: self.dates.clone(),
            values,
        }
    }

    /// Difference against the previous observation.
    pub fn diff(&self) -> Self {
        let values = (0..self.len())
            .map(|i| {
                if i == 0 {
                    return None;
                }
                match (self.values[i - 1], self.values[i]) {
                    (Some(prev), Some(cur)) => Some(cur - prev),
                    _ => None,
                }
            })
            .collect();
        Self {
            dates: self.dates.clone(),
            values,
        }
    }

    /// Rolling mean over a full window: missing unless all `window` trailing
    /// observations are present.
    pub fn rolling_mean(&self, window: usize) -> Self {
        self.rolling(window, |vals| {
            Some(vals.iter().sum::<f64>() / vals.len() as f64)
        })
    }

    /// Rolling sample standard deviation (n-1 denominator) over a full
    /// window: missing unless all `window` trailing observations are present.
    pub fn rolling_std(&self, window: usize) -> Self {
        self.rolling(window, sample_std)
    }

    fn rolling<F>(&self, window: usize, f: F) -> Self
    where
        F: Fn(&[f64]) -> Option<f64>,
    {
        let mut values = vec![None; self.len()];
        if window == 0 {
            return Self {
                dates: self.dates.clone(),
                values,
            };
        }
        let mut buf = Vec::with_capacity(window);
        for i in 0..self.len() {
            if i + 1 < window {
                continue;
            }
            buf.clear();
            for v in &self.values[i + 1 - window..=i] {
                match v {
                    Some(x) => buf.push(*x),
                    None => break,
                }
            }
            if buf.len() == window {
                values[i] = f(&buf);
            }
        }
        Self {
            dates: self.dates.clone(),
            values,
        }
    }

    /// Shift values forward by `periods`, leaving leading entries missing.
    pub fn shift(&self, periods: usize) -> Self {
        let values = (0..self.len())
            .map(|i| {
                if i < periods {
                    None
                } else {
                    self.values[i - periods]
                }
            })
            .collect();
        Self {
            dates: self.dates.clone(),
            values,
        }
    }

    /// Forward-fill missing values. Leading gaps stay missing; nothing is
    /// ever back-filled.
    pub fn ffill(&self) -> Self {
        let mut last = None;
        let values = self
            .values
            .iter()
            .map(|v| {
                if v.is_some() {
                    last = *v;
                }
                last
            })
            .collect();
        Self {
            dates: self.dates.clone(),
            values,
        }
    }

    /// Drop missing entries, keeping the index of the survivors.
    pub fn dropna(&self) -> Self {
        let (dates, values) = self
            .iter()
            .filter(|(_, v)| v.is_some())
            .unzip();
        Self { dates, values }
    }

    /// Apply a function to every present value, leaving missing entries
    /// missing.
    pub fn map_values<F>(&self, f: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        let values = self.values.iter().map(|v| v.map(&f)).collect();
        Self {
            dates: self.dates.clone(),
            values,
        }
    }

    /// Replace missing entries with a constant.
    pub fn fill_none(&self, fill: f64) -> Self {
        let values = self.values.iter().map(|v| Some(v.unwrap_or(fill))).collect();
        Self {
            dates: self.dates.clone(),
            values,
        }
    }

    /// Mean of the non-missing observations.
    pub fn mean(&self) -> Option<f64> {
        let valid: Vec<f64> = self.values.iter().flatten().copied().collect();
        if valid.is_empty() {
            return None;
        }
        Some(valid.iter().sum::<f64>() / valid.len() as f64)
    }

    /// Sample standard deviation of the non-missing observations.
    pub fn std(&self) -> Option<f64> {
        let valid: Vec<f64> = self.values.iter().flatten().copied().collect();
        sample_std(&valid)
    }

    /// Inclusive date-range slice.
    pub fn slice(&self, start: NaiveDate, end: NaiveDate) -> Self {
        let lo = lower_bound(&self.dates, start);
        let hi = upper_bound(&self.dates, end);
        let hi = hi.max(lo);
        Self {
            dates: self.dates[lo..hi].to_vec(),
            values: self.values[lo..hi].to_vec(),
        }
    }

    /// Slice from the beginning through `end`, inclusive.
    pub fn slice_through(&self, end: NaiveDate) -> Self {
        let hi = upper_bound(&self.dates, end);
        Self {
            dates: self.dates[..hi].to_vec(),
            values: self.values[..hi].to_vec(),
        }
    }

    /// Slice from `start`, inclusive, through the end.
    pub fn slice_from(&self, start: NaiveDate) -> Self {
        let lo = lower_bound(&self.dates, start);
        Self {
            dates: self.dates[lo..].to_vec(),
            values: self.values[lo..].to_vec(),
        }
    }

    /// Last valid observation per calendar month, stamped on the calendar
    /// month-end date. Months with no valid observation stay missing.
    pub fn resample_month_end_last(&self) -> Self {
        let mut dates = Vec::new();
        let mut values = Vec::new();
        let mut i = 0;
        while i < self.len() {
            let (year, month) = (self.dates[i].year(), self.dates[i].month());
            let mut last = None;
            while i < self.len()
                && self.dates[i].year() == year
                && self.dates[i].month() == month
            {
                if self.values[i].is_some() {
                    last = self.values[i];
                }
                i += 1;
            }
            dates.push(month_end(NaiveDate::from_ymd_opt(year, month, 1).unwrap()));
            values.push(last);
        }
        Self { dates, values }
    }

    /// Cumulative growth curve: running product of `1 + value`, with missing
    /// entries contributing zero return.
    pub fn cum_growth(&self) -> Self {
        let mut level = 1.0;
        let values = self
            .values
            .iter()
            .map(|v| {
                level *= 1.0 + v.unwrap_or(0.0);
                Some(level)
            })
            .collect();
        Self {
            dates: self.dates.clone(),
            values,
        }
    }

    /// Combine two series on an identical index.
    pub fn zip_with<F>(&self, other: &Series, f: F) -> Result<Series>
    where
        F: Fn(Option<f64>, Option<f64>) -> Option<f64>,
    {
        if self.dates != other.dates {
            return Err(BacktestError::DataError(
                "cannot combine series on different date indexes".to_string(),
            ));
        }
        let values = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| f(*a, *b))
            .collect();
        Series::new(self.dates.clone(), values)
    }

    /// Concatenate slices, sort ascending, and drop duplicate dates keeping
    /// the first occurrence in `pieces` order.
    pub fn concat_dedup_first(pieces: &[Series]) -> Result<Series> {
        let mut pairs: Vec<(NaiveDate, Option<f64>)> =
            pieces.iter().flat_map(|s| s.iter()).collect();
        pairs.sort_by_key(|(d, _)| *d);
        pairs.dedup_by_key(|(d, _)| *d);
        let (dates, values) = pairs.into_iter().unzip();
        Series::new(dates, values)
    }
}

/// A date-indexed table of named numeric columns sharing one index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    dates: Vec<NaiveDate>,
    columns: Vec<String>,
    /// Column-major storage: `values[col][row]`.
    values: Vec<Vec<Option<f64>>>,
}

impl Frame {
    /// Create a frame from column-major values. Dates must be strictly
    /// increasing; column names must be unique; every column must match the
    /// index length.
    pub fn new(
        dates: Vec<NaiveDate>,
        columns: Vec<String>,
        values: Vec<Vec<Option<f64>>>,
    ) -> Result<Self> {
        check_ascending(&dates)?;
        if columns.len() != values.len() {
            return Err(BacktestError::DataError(format!(
                "frame has {} column names but {} value columns",
                columns.len(),
                values.len()
            )));
        }
        for (name, col) in columns.iter().zip(values.iter()) {
            if col.len() != dates.len() {
                return Err(BacktestError::DataError(format!(
                    "column {} has {} values for {} dates",
                    name,
                    col.len(),
                    dates.len()
                )));
            }
        }
        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(BacktestError::DataError(format!(
                    "duplicate column name: {}",
                    name
                )));
            }
        }
        Ok(Self {
            dates,
            columns,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Fail unless every named column is present.
    pub fn require_columns(&self, names: &[&str]) -> Result<()> {
        for name in names {
            if !self.has_column(name) {
                return Err(BacktestError::MissingColumn((*name).to_string()));
            }
        }
        Ok(())
    }

    /// Cell lookup by row/column position.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.values[col][row]
    }

    /// Extract one column as a series.
    pub fn column(&self, name: &str) -> Result<Series> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| BacktestError::MissingColumn(name.to_string()))?;
        Series::new(self.dates.clone(), self.values[idx].clone())
    }

    /// Project onto a subset of columns, in the given order.
    pub fn select(&self, names: &[String]) -> Result<Frame> {
        let mut values = Vec::with_capacity(names.len());
        for name in names {
            let idx = self
                .column_index(name)
                .ok_or_else(|| BacktestError::MissingColumn(name.clone()))?;
            values.push(self.values[idx].clone());
        }
        Frame::new(self.dates.clone(), names.to_vec(), values)
    }

    /// Drop every row where any column is missing.
    pub fn dropna_rows(&self) -> Frame {
        let keep: Vec<usize> = (0..self.len())
            .filter(|&row| self.values.iter().all(|col| col[row].is_some()))
            .collect();
        self.take_rows(&keep)
    }

    fn take_rows(&self, rows: &[usize]) -> Frame {
        let dates = rows.iter().map(|&r| self.dates[r]).collect();
        let values = self
            .values
            .iter()
            .map(|col| rows.iter().map(|&r| col[r]).collect())
            .collect();
        Frame {
            dates,
            columns: self.columns.clone(),
            values,
        }
    }

    fn map_columns<F>(&self, f: F) -> Frame
    where
        F: Fn(&Series) -> Series,
    {
        let values = self
            .values
            .iter()
            .map(|col| {
                let series = Series {
                    dates: self.dates.clone(),
                    values: col.clone(),
                };
                f(&series).values
            })
            .collect();
        Frame {
            dates: self.dates.clone(),
            columns: self.columns.clone(),
            values,
        }
    }

    /// Column-wise percent change over `periods` observations.
    pub fn pct_change(&self, periods: usize) -> Frame {
        self.map_columns(|s| s.pct_change(periods))
    }

    /// Apply a function to every present cell, leaving missing cells missing.
    pub fn map_values<F>(&self, f: F) -> Frame
    where
        F: Fn(f64) -> f64,
    {
        self.map_columns(|s| s.map_values(&f))
    }

    /// Column-wise rolling sample standard deviation over a full window.
    pub fn rolling_std(&self, window: usize) -> Frame {
        self.map_columns(|s| s.rolling_std(window))
    }

    /// Shift every column forward by `periods`.
    pub fn shift(&self, periods: usize) -> Frame {
        self.map_columns(|s| s.shift(periods))
    }

    /// Replace missing cells with a constant.
    pub fn fill_none(&self, fill: f64) -> Frame {
        self.map_columns(|s| s.fill_none(fill))
    }

    /// Inclusive date-range slice.
    pub fn slice(&self, start: NaiveDate, end: NaiveDate) -> Frame {
        let lo = lower_bound(&self.dates, start);
        let hi = upper_bound(&self.dates, end).max(lo);
        let rows: Vec<usize> = (lo..hi).collect();
        self.take_rows(&rows)
    }

    /// Slice from the beginning through `end`, inclusive.
    pub fn slice_through(&self, end: NaiveDate) -> Frame {
        let hi = upper_bound(&self.dates, end);
        let rows: Vec<usize> = (0..hi).collect();
        self.take_rows(&rows)
    }

    /// Slice from `start`, inclusive, through the end.
    pub fn slice_from(&self, start: NaiveDate) -> Frame {
        let lo = lower_bound(&self.dates, start);
        let rows: Vec<usize> = (lo..self.len()).collect();
        self.take_rows(&rows)
    }

    /// Last valid observation per calendar month for every column, stamped
    /// on calendar month-end dates.
    pub fn resample_month_end_last(&self) -> Frame {
        let mut dates = Vec::new();
        let mut groups: Vec<(usize, usize)> = Vec::new();
        let mut i = 0;
        while i < self.len() {
            let (year, month) = (self.dates[i].year(), self.dates[i].month());
            let start = i;
            while i < self.len()
                && self.dates[i].year() == year
                && self.dates[i].month() == month
            {
                i += 1;
            }
            groups.push((start, i));
            dates.push(month_end(NaiveDate::from_ymd_opt(year, month, 1).unwrap()));
        }
        let values = self
            .values
            .iter()
            .map(|col| {
                groups
                    .iter()
                    .map(|&(start, end)| {
                        col[start..end].iter().rev().find_map(|v| *v)
                    })
                    .collect()
            })
            .collect();
        Frame {
            dates,
            columns: self.columns.clone(),
            values,
        }
    }

    /// Re-index onto `dates`: exact-date lookups, missing where a date is
    /// not on this frame's index. No filling.
    pub fn reindex(&self, dates: &[NaiveDate]) -> Frame {
        let values = self
            .values
            .iter()
            .map(|col| {
                dates
                    .iter()
                    .map(|d| self.dates.binary_search(d).ok().and_then(|i| col[i]))
                    .collect()
            })
            .collect();
        Frame {
            dates: dates.to_vec(),
            columns: self.columns.clone(),
            values,
        }
    }

    /// Date of the first valid observation in the named column.
    pub fn column_first_valid(&self, name: &str) -> Result<Option<NaiveDate>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| BacktestError::MissingColumn(name.to_string()))?;
        Ok(self.values[idx]
            .iter()
            .position(|v| v.is_some())
            .map(|i| self.dates[i]))
    }
}
