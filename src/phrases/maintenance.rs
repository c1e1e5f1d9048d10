//! Eviction and decay selection for the user phrase database
//!
//! Both passes work on an immutable snapshot and only *select* rows; the store
//! applies the result in a single transaction.

use std::cmp::Ordering;
use std::collections::HashSet;

use super::SHORTCUT_THRESHOLD;
use crate::config::MaintenanceConfig;

/// The columns maintenance needs from one `phrases` row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaintenanceRow {
    pub id: i64,
    pub user_freq: i64,
    pub timestamp: f64,
}

impl MaintenanceRow {
    pub fn is_shortcut(&self) -> bool {
        self.user_freq >= SHORTCUT_THRESHOLD
    }
}

/// What happens to one of the oldest rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecayAction {
    /// Seen only once: drop it
    Delete,
    /// Halve the frequency and refresh the timestamp
    Halve { new_freq: i64 },
}

/// A decay decision, carrying the snapshot values it was based on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayDecision {
    pub row: MaintenanceRow,
    pub action: DecayAction,
}

/// Ids of non-shortcut rows outside the `max_rows` best rows.
///
/// Rows are ordered by (frequency, timestamp, id) ascending and everything in
/// front of the last `max_rows` is evicted unless it is a shortcut.
pub fn select_rows_to_evict(rows: &[MaintenanceRow], max_rows: usize) -> Vec<i64> {
    let mut order: Vec<&MaintenanceRow> = rows.iter().collect();
    order.sort_by(|a, b| {
        a.user_freq
            .cmp(&b.user_freq)
            .then_with(|| a.timestamp.total_cmp(&b.timestamp))
            .then_with(|| a.id.cmp(&b.id))
    });

    let cut = order.len().saturating_sub(max_rows);
    order[..cut]
        .iter()
        .filter(|row| !row.is_shortcut())
        .map(|row| row.id)
        .collect()
}

/// Decay decisions for the oldest `fraction` of `rows`.
///
/// The count is `floor(rows.len() * fraction)`; shortcuts never take part.
pub fn select_rows_to_decay(rows: &[MaintenanceRow], fraction: f64) -> Vec<DecayDecision> {
    let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
    let count = (rows.len() as f64 * fraction).floor() as usize;
    if count == 0 {
        return Vec::new();
    }

    let mut order: Vec<&MaintenanceRow> = rows.iter().filter(|row| !row.is_shortcut()).collect();
    order.sort_by(|a, b| match a.timestamp.total_cmp(&b.timestamp) {
        Ordering::Equal => a.id.cmp(&b.id),
        other => other,
    });

    order
        .into_iter()
        .take(count)
        .map(|row| DecayDecision {
            row: *row,
            action: if row.user_freq <= 1 {
                DecayAction::Delete
            } else {
                DecayAction::Halve { new_freq: row.user_freq / 2 }
            },
        })
        .collect()
}

/// Rows chosen for one maintenance pass, with the snapshot values each
/// choice was based on
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaintenancePlan {
    /// Size of the snapshot the plan was made from
    pub rows: usize,
    pub evict: Vec<MaintenanceRow>,
    pub decay: Vec<DecayDecision>,
}

impl MaintenancePlan {
    /// Evict first, then decay the oldest of the surviving rows.
    pub fn select(snapshot: &[MaintenanceRow], settings: &MaintenanceConfig) -> Self {
        let evicted_ids: HashSet<i64> = select_rows_to_evict(snapshot, settings.max_rows).into_iter().collect();
        let (evict, survivors): (Vec<MaintenanceRow>, Vec<MaintenanceRow>) =
            snapshot.iter().partition(|row| evicted_ids.contains(&row.id));
        let decay = select_rows_to_decay(&survivors, settings.decay_fraction);
        Self {
            rows: snapshot.len(),
            evict,
            decay,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.evict.is_empty() && self.decay.is_empty()
    }
}
