use std::fs;

use camino::Utf8Path;
use serde::Serialize;

use crate::domain::BinId;
use crate::error::RefineryError;

pub const CONTAMINATION_COLUMN: &str = "Contamination";

/// The two identifier-column schemas the quality tools emit. CheckM 1 names
/// the column `Bin Id`, CheckM 2 names it `Name`. Both are accepted and the
/// detected schema is reproduced on output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IdColumn {
    BinId,
    Name,
}

impl IdColumn {
    pub fn header(self) -> &'static str {
        match self {
            IdColumn::BinId => "Bin Id",
            IdColumn::Name => "Name",
        }
    }

    fn detect(header: &[String]) -> Option<(usize, IdColumn)> {
        if let Some(index) = header.iter().position(|name| name == "Bin Id") {
            return Some((index, IdColumn::BinId));
        }
        header
            .iter()
            .position(|name| name == "Name")
            .map(|index| (index, IdColumn::Name))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    bin: BinId,
    contamination: f64,
    cells: Vec<String>,
}

impl ReportRow {
    pub fn bin(&self) -> &BinId {
        &self.bin
    }

    pub fn contamination(&self) -> f64 {
        self.contamination
    }
}

/// A quality report parsed from tab-separated text. Every transformation
/// returns a new value; the controller always holds the latest one
/// explicitly, so no two steps ever alias the same table.
#[derive(Debug, Clone, Serialize)]
pub struct QualityReport {
    id_column: IdColumn,
    header: Vec<String>,
    id_index: usize,
    contamination_index: usize,
    rows: Vec<ReportRow>,
}

impl QualityReport {
    /// Parses a tab-separated report. Lines whose first byte is `[` are
    /// banner comments and skipped.
    pub fn parse(text: &str) -> Result<Self, RefineryError> {
        let mut lines = text
            .lines()
            .filter(|line| !line.trim().is_empty() && !line.trim_start().starts_with('['));

        let header: Vec<String> = lines
            .next()
            .ok_or_else(|| RefineryError::ReportParse("empty report".to_string()))?
            .split('\t')
            .map(|name| name.trim().to_string())
            .collect();

        let (id_index, id_column) = IdColumn::detect(&header).ok_or_else(|| {
            RefineryError::ReportParse(
                "no identifier column: expected `Bin Id` or `Name`".to_string(),
            )
        })?;
        let contamination_index = header
            .iter()
            .position(|name| name == CONTAMINATION_COLUMN)
            .ok_or_else(|| {
                RefineryError::ReportParse("missing `Contamination` column".to_string())
            })?;

        let mut rows = Vec::new();
        for line in lines {
            let mut cells: Vec<String> = line.split('\t').map(|cell| cell.to_string()).collect();
            let required = id_index.max(contamination_index) + 1;
            if cells.len() < required {
                return Err(RefineryError::ReportParse(format!(
                    "row has {} columns, identifier and contamination need {required}",
                    cells.len()
                )));
            }
            // short passthrough cells are padded so later projections by
            // header position stay in bounds
            if cells.len() < header.len() {
                cells.resize(header.len(), String::new());
            }
            let bin: BinId = cells[id_index].parse()?;
            let contamination: f64 = cells[contamination_index].trim().parse().map_err(|_| {
                RefineryError::ReportParse(format!(
                    "bin {bin}: contamination `{}` is not numeric",
                    cells[contamination_index]
                ))
            })?;
            rows.push(ReportRow {
                bin,
                contamination,
                cells,
            });
        }

        Ok(Self {
            id_column,
            header,
            id_index,
            contamination_index,
            rows,
        })
    }

    pub fn load(path: &Utf8Path) -> Result<Self, RefineryError> {
        let text = fs::read_to_string(path.as_std_path())
            .map_err(|_| RefineryError::ReportRead(path.to_owned()))?;
        Self::parse(&text)
    }

    pub fn id_column(&self) -> IdColumn {
        self.id_column
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn bin_ids(&self) -> impl Iterator<Item = &BinId> {
        self.rows.iter().map(|row| &row.bin)
    }

    pub fn contamination_of(&self, id: &BinId) -> Option<f64> {
        self.rows
            .iter()
            .find(|row| &row.bin == id)
            .map(|row| row.contamination)
    }

    /// Splits into `(finished, remaining)` where finished rows have
    /// `Contamination <= threshold`.
    pub fn partition(&self, threshold: f64) -> (Self, Self) {
        let (finished, remaining) = self
            .rows
            .iter()
            .cloned()
            .partition(|row| row.contamination <= threshold);
        (self.with_rows(finished), self.with_rows(remaining))
    }

    /// Rows with `Contamination > threshold`.
    pub fn filter_above(&self, threshold: f64) -> Self {
        let rows = self
            .rows
            .iter()
            .filter(|row| row.contamination > threshold)
            .cloned()
            .collect();
        self.with_rows(rows)
    }

    /// Rewrites the identifier column through `rename`, keeping everything
    /// else in place.
    pub fn rename_ids(&self, rename: impl Fn(&BinId) -> BinId) -> Self {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let bin = rename(&row.bin);
                let mut cells = row.cells.clone();
                cells[self.id_index] = bin.as_str().to_string();
                ReportRow {
                    bin,
                    contamination: row.contamination,
                    cells,
                }
            })
            .collect();
        self.with_rows(rows)
    }

    /// Appends `other`'s rows. The schema of `self` wins: `other`'s cells are
    /// projected onto `self`'s header by column name (the identifier columns
    /// map onto each other regardless of naming), absent columns are left
    /// blank.
    pub fn concat(&self, other: &Self) -> Self {
        let mut rows = self.rows.clone();
        for row in &other.rows {
            let cells = self
                .header
                .iter()
                .enumerate()
                .map(|(index, name)| {
                    if index == self.id_index {
                        row.bin.as_str().to_string()
                    } else {
                        other
                            .header
                            .iter()
                            .position(|candidate| candidate == name)
                            .map(|source| row.cells[source].clone())
                            .unwrap_or_default()
                    }
                })
                .collect();
            rows.push(ReportRow {
                bin: row.bin.clone(),
                contamination: row.contamination,
                cells,
            });
        }
        self.with_rows(rows)
    }

    pub fn to_tsv(&self) -> String {
        let mut out = self.header.join("\t");
        out.push('\n');
        for row in &self.rows {
            out.push_str(&row.cells.join("\t"));
            out.push('\n');
        }
        out
    }

    fn with_rows(&self, rows: Vec<ReportRow>) -> Self {
        Self {
            id_column: self.id_column,
            header: self.header.clone(),
            id_index: self.id_index,
            contamination_index: self.contamination_index,
            rows,
        }
    }
}
