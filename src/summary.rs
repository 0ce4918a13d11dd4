// Summary - totals for the dashboard chart and the CLI footer

use crate::record::Record;
use serde::Serialize;

/// Totals for one item label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemTotal {
    pub item: String,
    pub count: usize,
    pub total: f64,
}

/// Aggregate view over a slice of records
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub grand_total: f64,
    /// One entry per distinct item, in order of first appearance
    pub by_item: Vec<ItemTotal>,
}

impl Summary {
    pub fn of(records: &[Record]) -> Self {
        let mut summary = Summary::default();

        for record in records {
            let total = record.total.as_f64();
            summary.count += 1;
            summary.grand_total += total;

            match summary.by_item.iter_mut().find(|t| t.item == record.item) {
                Some(entry) => {
                    entry.count += 1;
                    entry.total += total;
                }
                None => summary.by_item.push(ItemTotal {
                    item: record.item.clone(),
                    count: 1,
                    total,
                }),
            }
        }

        summary
    }

    /// Item with the largest total, if any
    pub fn top_item(&self) -> Option<&ItemTotal> {
        self.by_item
            .iter()
            .max_by(|a, b| a.total.total_cmp(&b.total))
    }
}
