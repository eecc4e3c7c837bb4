//! Plain-text table rendering for reports and CLI listings.

use std::{borrow::Cow, fmt::Write as _};

const COLUMN_GAP: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Right,
}

/// Column-aligned text table. Widths grow to fit the widest cell.
#[derive(Debug, Clone, Default)]
pub struct TextTable {
    headers: Vec<String>,
    aligns: Vec<Align>,
    rows: Vec<Vec<String>>,
}

impl TextTable {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        let headers = headers.into_iter().map(Into::into).collect::<Vec<_>>();
        let aligns = vec![Align::Left; headers.len()];
        Self {
            headers,
            aligns,
            rows: Vec::new(),
        }
    }

    pub fn align(mut self, column: usize, align: Align) -> Self {
        if let Some(slot) = self.aligns.get_mut(column) {
            *slot = align;
        }
        self
    }

    /// Appends a row; short rows are padded with empty cells and extra cells
    /// are dropped.
    pub fn push_row<S: Into<String>>(&mut self, cells: impl IntoIterator<Item = S>) {
        let mut row = cells
            .into_iter()
            .take(self.headers.len())
            .map(Into::into)
            .collect::<Vec<_>>();
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        let mut widths = self
            .headers
            .iter()
            .map(|h| display_width(h))
            .collect::<Vec<_>>();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(display_width(&sanitize_cell(cell)));
            }
        }

        let mut output = String::new();
        let _ = writeln!(output, "{}", self.format_line(&self.headers, &widths));
        let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
        let _ = writeln!(output, "{}", self.format_line(&rule, &widths));
        for row in &self.rows {
            let _ = writeln!(output, "{}", self.format_line(row, &widths));
        }
        output
    }

    fn format_line(&self, cells: &[String], widths: &[usize]) -> String {
        let mut line = cells
            .iter()
            .zip(widths)
            .zip(&self.aligns)
            .map(|((cell, width), align)| {
                let cell = sanitize_cell(cell);
                let padding = " ".repeat(width.saturating_sub(display_width(&cell)));
                match align {
                    Align::Left => format!("{cell}{padding}"),
                    Align::Right => format!("{padding}{cell}"),
                }
            })
            .collect::<Vec<_>>()
            .join(COLUMN_GAP);
        line.truncate(line.trim_end().len());
        line
    }
}

/// Keeps the first `max_chars` characters of `value`.
pub fn truncate_chars(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((cut, _)) => &value[..cut],
        None => value,
    }
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_pad_to_the_widest_cell() {
        let mut table = TextTable::new(["raw", "field"]);
        table.push_row(["primary_title", "title"]);
        table.push_row(["tconst", "movie_id"]);
        let rendered = table.render();
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "raw            field");
        assert_eq!(lines[1], "-------------  --------");
        assert_eq!(lines[2], "primary_title  title");
        assert_eq!(lines[3], "tconst         movie_id");
    }

    #[test]
    fn right_aligned_columns_pad_on_the_left() {
        let mut table = TextTable::new(["source", "score"]).align(1, Align::Right);
        table.push_row(["imdb", "3"]);
        let rendered = table.render();
        assert_eq!(rendered.lines().nth(2), Some("imdb        3"));
    }

    #[test]
    fn embedded_newlines_become_spaces() {
        let mut table = TextTable::new(["sample"]);
        table.push_row(["two\nlines"]);
        assert!(table.render().contains("two lines"));
    }

    #[test]
    fn short_rows_are_padded() {
        let mut table = TextTable::new(["a", "b"]);
        table.push_row(["x"]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.render().lines().nth(2), Some("x"));
    }

    #[test]
    fn truncation_respects_character_boundaries() {
        assert_eq!(truncate_chars("short", 40), "short");
        let long = "é".repeat(50);
        let cut = truncate_chars(&long, 40);
        assert_eq!(cut.chars().count(), 40);
        assert_eq!(truncate_chars("abcdef", 3), "abc");
    }
}
