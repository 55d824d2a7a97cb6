//! Routing statistics over a time window.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::core::RoutingEngine;
use crate::assignment::{AssignmentStatus, RoutingStrategy};
use crate::error::{Result, RoutingError};

/// Half-open time window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end <= start {
            return Err(RoutingError::invalid_input(format!(
                "date range end {} is not after start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// The last `days` days up to now (inclusive of this instant)
    pub fn last_days(days: u32) -> Self {
        let end = Utc::now() + Duration::seconds(1);
        Self { start: end - Duration::days(i64::from(days.max(1))), end }
    }
}

/// Aggregated routing activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingStats {
    pub range: DateRange,
    pub total_assignments: u64,
    /// Keyed by strategy name; rule-driven picks are counted under `rule`
    pub by_strategy: BTreeMap<String, u64>,
    /// Current status of the assignments created in range
    pub by_status: BTreeMap<String, u64>,
    pub reassignments: u64,
    /// `reassignments / total_assignments`, 0 for an empty window
    pub reassignment_rate: f64,
    /// Supervisor queue entries recorded in range
    pub escalations: u64,
}

impl RoutingEngine {
    pub async fn get_routing_stats(&self, range: DateRange) -> Result<RoutingStats> {
        let counts = self.db.count_assignments(range.start, range.end).await?;

        let mut by_strategy: BTreeMap<String, u64> = BTreeMap::new();
        let mut by_status: BTreeMap<String, u64> = AssignmentStatus::all()
            .iter()
            .map(|status| (status.as_str().to_string(), 0))
            .collect();
        let mut total = 0;

        for (strategy, status, count) in counts.rows {
            total += count;
            let name = RoutingStrategy::from_stored(&strategy).name().to_string();
            *by_strategy.entry(name).or_default() += count;
            *by_status.entry(status.as_str().to_string()).or_default() += count;
        }

        let reassignments = by_status
            .get(AssignmentStatus::Reassigned.as_str())
            .copied()
            .unwrap_or(0);
        let reassignment_rate = if total == 0 {
            0.0
        } else {
            reassignments as f64 / total as f64
        };
        let escalations = self.db.count_escalations(range.start, range.end).await?;

        Ok(RoutingStats {
            range,
            total_assignments: total,
            by_strategy,
            by_status,
            reassignments,
            reassignment_rate,
            escalations,
        })
    }
}
