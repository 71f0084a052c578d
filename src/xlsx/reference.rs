//! A1-style cell references, areas and sheet-qualified ranges.

use crate::error::{Error, Result};
use std::fmt;

pub const MAX_ROWS: u32 = 1_048_576;
pub const MAX_COLUMNS: u32 = 16_384;

/// `A` → 1, `AA` → 27.
pub fn column_index(letters: &str) -> Result<u32> {
    if letters.is_empty() || letters.len() > 3 {
        return Err(Error::InvalidReference(letters.to_string()));
    }
    let mut index = 0u32;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return Err(Error::InvalidReference(letters.to_string()));
        }
        index = index * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    if index > MAX_COLUMNS {
        return Err(Error::InvalidReference(letters.to_string()));
    }
    Ok(index)
}

/// 1 → `A`, 27 → `AA`.
pub fn column_letter(mut index: u32) -> String {
    let mut letters = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        index = (index - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// A single cell position, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Parse `C3` (`$` anchors are ignored).
    pub fn parse(reference: &str) -> Result<Self> {
        let cleaned: String = reference.chars().filter(|c| *c != '$').collect();
        let split = cleaned
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| Error::InvalidReference(reference.to_string()))?;
        let (letters, digits) = cleaned.split_at(split);
        let col = column_index(letters).map_err(|_| Error::InvalidReference(reference.to_string()))?;
        let row: u32 = digits
            .parse()
            .map_err(|_| Error::InvalidReference(reference.to_string()))?;
        if row == 0 || row > MAX_ROWS {
            return Err(Error::InvalidReference(reference.to_string()));
        }
        Ok(Self { row, col })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letter(self.col), self.row)
    }
}

/// A rectangular block of cells, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Area {
    pub min_row: u32,
    pub min_col: u32,
    pub max_row: u32,
    pub max_col: u32,
}

impl Area {
    pub fn new(min_row: u32, min_col: u32, max_row: u32, max_col: u32) -> Self {
        Self {
            min_row: min_row.min(max_row),
            min_col: min_col.min(max_col),
            max_row: max_row.max(min_row),
            max_col: max_col.max(min_col),
        }
    }

    /// Parse `B:B`, `D:F`, `5:10`, `D1:F10` or a single `C3`.
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        let invalid = || Error::InvalidReference(reference.to_string());
        match reference.split_once(':') {
            None => {
                let cell = CellRef::parse(reference)?;
                Ok(Self::new(cell.row, cell.col, cell.row, cell.col))
            }
            Some((start, end)) => {
                let all_alpha = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic() || c == '$');
                let all_digit = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit() || c == '$');
                if all_alpha(start) && all_alpha(end) {
                    let strip = |s: &str| s.replace('$', "");
                    let a = column_index(&strip(start)).map_err(|_| invalid())?;
                    let b = column_index(&strip(end)).map_err(|_| invalid())?;
                    Ok(Self::new(1, a, MAX_ROWS, b))
                } else if all_digit(start) && all_digit(end) {
                    let parse = |s: &str| s.replace('$', "").parse::<u32>().map_err(|_| invalid());
                    let (a, b) = (parse(start)?, parse(end)?);
                    if a == 0 || b == 0 {
                        return Err(invalid());
                    }
                    Ok(Self::new(a, 1, b, MAX_COLUMNS))
                } else {
                    let a = CellRef::parse(start)?;
                    let b = CellRef::parse(end)?;
                    Ok(Self::new(a.row, a.col, b.row, b.col))
                }
            }
        }
    }

    /// Columns only, as in `B` or `D:F`.
    pub fn parse_columns(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        let (start, end) = reference.split_once(':').unwrap_or((reference, reference));
        let a = column_index(start.trim())?;
        let b = column_index(end.trim())?;
        Ok(Self::new(1, a, MAX_ROWS, b))
    }

    /// Intersect with `1..=max_row` × `1..=max_col`; `None` when nothing is left.
    pub fn clamp(&self, max_row: u32, max_col: u32) -> Option<Self> {
        let clamped = Self {
            min_row: self.min_row,
            min_col: self.min_col,
            max_row: self.max_row.min(max_row),
            max_col: self.max_col.min(max_col),
        };
        (clamped.min_row <= clamped.max_row && clamped.min_col <= clamped.max_col).then_some(clamped)
    }

    pub fn contains(&self, cell: CellRef) -> bool {
        (self.min_row..=self.max_row).contains(&cell.row)
            && (self.min_col..=self.max_col).contains(&cell.col)
    }

    pub fn contains_col(&self, col: u32) -> bool {
        (self.min_col..=self.max_col).contains(&col)
    }

    pub fn rows(&self) -> u32 {
        self.max_row - self.min_row + 1
    }

    pub fn cols(&self) -> u32 {
        self.max_col - self.min_col + 1
    }

    /// Every cell, row by row.
    pub fn cells(&self) -> impl Iterator<Item = CellRef> + '_ {
        (self.min_row..=self.max_row)
            .flat_map(move |row| (self.min_col..=self.max_col).map(move |col| CellRef::new(row, col)))
    }

    pub fn start(&self) -> CellRef {
        CellRef::new(self.min_row, self.min_col)
    }

    pub fn end(&self) -> CellRef {
        CellRef::new(self.max_row, self.max_col)
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start() == self.end() {
            write!(f, "{}", self.start())
        } else {
            write!(f, "{}:{}", self.start(), self.end())
        }
    }
}

/// An area optionally qualified by a sheet: `Sheet1:A1:G10` or `Sheet1!A1:G10`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRange {
    pub sheet: Option<String>,
    pub area: Area,
}

impl SheetRange {
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if let Some((sheet, area)) = reference.rsplit_once('!') {
            return Ok(Self {
                sheet: Some(sheet.trim_matches('\'').to_string()),
                area: Area::parse(area)?,
            });
        }
        let parts: Vec<&str> = reference.split(':').collect();
        match parts.as_slice() {
            [sheet, start, end] => Ok(Self {
                sheet: Some(sheet.to_string()),
                area: Area::parse(&format!("{}:{}", start, end))?,
            }),
            [sheet, cell] if CellRef::parse(cell).is_ok() && CellRef::parse(sheet).is_err() => {
                Ok(Self {
                    sheet: Some(sheet.to_string()),
                    area: Area::parse(cell)?,
                })
            }
            _ => Ok(Self {
                sheet: None,
                area: Area::parse(reference)?,
            }),
        }
    }
}
