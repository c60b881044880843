use serde::{Deserialize, Serialize};

use crate::data::datetime;
use crate::data::table::Table;

/// Which table column feeds an axis. `Index` substitutes the row ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisColumn {
    Index,
    Column(usize),
}

impl AxisColumn {
    pub fn label(&self, table: &Table) -> String {
        match self {
            AxisColumn::Index => "index".to_string(),
            AxisColumn::Column(i) => table
                .columns
                .get(*i)
                .cloned()
                .unwrap_or_else(|| format!("col{}", i + 1)),
        }
    }

    fn value(&self, row_index: usize, row: &[f64]) -> f64 {
        match self {
            AxisColumn::Index => row_index as f64,
            AxisColumn::Column(i) => row.get(*i).copied().unwrap_or(f64::NAN),
        }
    }

    /// Every choice available for `table`: the index pseudo-column first.
    pub fn all_for(table: &Table) -> Vec<AxisColumn> {
        std::iter::once(AxisColumn::Index)
            .chain((0..table.column_count()).map(AxisColumn::Column))
            .collect()
    }
}

/// Build the sorted sample sequence for an axis selection.
///
/// Points are sorted ascending by x. Several rows with the same x collapse
/// into one point carrying the y of the last such row in table order.
pub fn extract_samples(table: &Table, x: AxisColumn, y: AxisColumn) -> Vec<[f64; 2]> {
    let mut points: Vec<[f64; 2]> = table
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| [x.value(i, row), y.value(i, row)])
        .filter(|p| p[0].is_finite() && p[1].is_finite())
        .collect();

    // Stable: rows sharing an x stay in table order.
    points.sort_by(|a, b| a[0].total_cmp(&b[0]));

    let mut samples: Vec<[f64; 2]> = Vec::with_capacity(points.len());
    for p in points {
        match samples.last_mut() {
            Some(last) if last[0] == p[0] => last[1] = p[1],
            _ => samples.push(p),
        }
    }
    samples
}

/// A sample sequence together with the selection it was derived from.
#[derive(Debug, Clone)]
pub struct SampleSeries {
    pub name: String,
    pub x_axis: AxisColumn,
    pub y_axis: AxisColumn,
    pub points: Vec<[f64; 2]>,
    pub color: [u8; 4],
    /// X values look like epoch milliseconds and are shown as datetimes.
    pub x_is_datetime: bool,
}

impl SampleSeries {
    pub fn from_table(table: &Table, x_axis: AxisColumn, y_axis: AxisColumn, color: [u8; 4]) -> Self {
        let points = extract_samples(table, x_axis, y_axis);
        let x_is_datetime = match (points.first(), points.last()) {
            (Some(first), Some(last)) => datetime::looks_like_epoch_millis(first[0], last[0]),
            _ => false,
        };
        Self {
            name: format!("{} vs. {}", y_axis.label(table), x_axis.label(table)),
            x_axis,
            y_axis,
            points,
            color,
            x_is_datetime,
        }
    }

    /// First and last x.
    pub fn x_extent(&self) -> Option<(f64, f64)> {
        Some((self.points.first()?[0], self.points.last()?[0]))
    }

    pub fn color32(&self) -> egui::Color32 {
        egui::Color32::from_rgba_unmultiplied(self.color[0], self.color[1], self.color[2], self.color[3])
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::parser::parse;

    #[test]
    fn sorts_and_keeps_last_duplicate() {
        let table = parse("t,v\n3,30\n1,10\n3,31\n2,20");
        let samples = extract_samples(&table, AxisColumn::Column(0), AxisColumn::Column(1));
        assert_eq!(samples, vec![[1.0, 10.0], [2.0, 20.0], [3.0, 31.0]]);
    }

    #[test]
    fn index_pseudo_column_uses_row_ordinal() {
        let table = parse("v\n7\n8\n9");
        let samples = extract_samples(&table, AxisColumn::Index, AxisColumn::Column(0));
        assert_eq!(samples, vec![[0.0, 7.0], [1.0, 8.0], [2.0, 9.0]]);

        let flipped = extract_samples(&table, AxisColumn::Column(0), AxisColumn::Index);
        assert_eq!(flipped, vec![[7.0, 0.0], [8.0, 1.0], [9.0, 2.0]]);
    }

    #[test]
    fn out_of_range_column_yields_nothing() {
        let table = parse("a\n1\n2");
        assert!(extract_samples(&table, AxisColumn::Index, AxisColumn::Column(5)).is_empty());
    }

    #[test]
    fn detects_datetime_x_axis() {
        let table = parse("time,v\n2024-01-01T00:00:00Z,1\n2024-01-01T00:01:00Z,2");
        let series = SampleSeries::from_table(&table, AxisColumn::Column(0), AxisColumn::Column(1), [0; 4]);
        assert!(series.x_is_datetime);
        assert_eq!(series.name, "v vs. time");
        assert_eq!(series.x_extent(), Some((1_704_067_200_000.0, 1_704_067_260_000.0)));
    }

    #[test]
    fn axis_choices_start_with_index() {
        let table = parse("a,b\n1,2");
        assert_eq!(
            AxisColumn::all_for(&table),
            vec![AxisColumn::Index, AxisColumn::Column(0), AxisColumn::Column(1)]
        );
    }
}
