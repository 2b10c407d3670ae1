use std::io::{self, Write};

/// Spaces between the widest cell of a column and the next column
const GUTTER: usize = 2;

/// Rows of cells written with every column but the last padded to a
/// common width.
#[derive(Debug, Default)]
pub struct Table {
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    /// Adds a header row followed by a row of dashes under each title
    pub fn push_header(&mut self, titles: &[&str]) {
        self.push_row(titles.iter().copied());
        self.push_row(titles.iter().map(|t| "-".repeat(t.chars().count())));
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths = Vec::new();
        for row in &self.rows {
            // the last cell of a row is never padded
            let padded = row.len().saturating_sub(1);
            if widths.len() < padded {
                widths.resize(padded, 0);
            }
            for (width, cell) in widths.iter_mut().zip(&row[..padded]) {
                *width = (*width).max(cell.chars().count() + GUTTER);
            }
        }
        widths
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let widths = self.column_widths();
        for row in &self.rows {
            let last = row.len().saturating_sub(1);
            for (i, cell) in row.iter().enumerate() {
                if i == last {
                    out.write_all(cell.as_bytes())?;
                } else {
                    write!(out, "{:<width$}", cell, width = widths[i])?;
                }
            }
            out.write_all(b"\n")?;
        }
        Ok(())
    }
}
