// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Aligned text tables for list output.

use crate::color;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tint {
    Plain,
    Muted,
    /// Colored by the job state named in the cell.
    Status,
}

#[derive(Debug, Clone)]
pub struct Column {
    header: &'static str,
    align: Align,
    tint: Tint,
}

impl Column {
    pub fn left(header: &'static str) -> Self {
        Self { header, align: Align::Left, tint: Tint::Plain }
    }

    pub fn right(header: &'static str) -> Self {
        Self { header, align: Align::Right, tint: Tint::Plain }
    }

    pub fn muted(header: &'static str) -> Self {
        Self { header, align: Align::Left, tint: Tint::Muted }
    }

    pub fn status(header: &'static str) -> Self {
        Self { header, align: Align::Left, tint: Tint::Status }
    }
}

pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    /// Add a row. Missing cells render empty; extra cells are ignored.
    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    fn widths(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(i))
                    .map(|cell| cell.chars().count())
                    .fold(col.header.len(), usize::max)
            })
            .collect()
    }

    pub fn render(&self, out: &mut impl Write) {
        let widths = self.widths();
        let last = self.columns.len().saturating_sub(1);

        let header: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| color::header(&pad(col.header, widths[i], col.align, i == last)))
            .collect();
        let _ = writeln!(out, "{}", header.join("  "));

        for row in &self.rows {
            let cells: Vec<String> = self
                .columns
                .iter()
                .enumerate()
                .map(|(i, col)| {
                    let text = row.get(i).map(String::as_str).unwrap_or("");
                    let padded = pad(text, widths[i], col.align, i == last);
                    match col.tint {
                        Tint::Plain => padded,
                        Tint::Muted => color::muted(&padded),
                        Tint::Status => color::paint(status_code(text), &padded),
                    }
                })
                .collect();
            let _ = writeln!(out, "{}", cells.join("  "));
        }
    }
}

fn pad(text: &str, width: usize, align: Align, last: bool) -> String {
    match align {
        // No trailing spaces after the final column
        Align::Left if last => text.to_string(),
        Align::Left => format!("{text:<width$}"),
        Align::Right => format!("{text:>width$}"),
    }
}

fn status_code(text: &str) -> u8 {
    match text {
        "done" => color::codes::DONE,
        "error" => color::codes::ERROR,
        "killed" => color::codes::KILLED,
        _ => color::codes::ACTIVE,
    }
}

#[cfg(test)]
#[path = "table_tests.rs"]
mod tests;
