//! Round-robin selection with an explicit pointer per candidate pool.

use std::fmt;

use dashmap::DashMap;

use crate::agent::AgentSnapshot;

/// Identifies a candidate pool for rotation purposes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PoolKey {
    Territory(String),
    /// Sorted, deduplicated
    Skills(Vec<String>),
    Any,
    Escalation(String),
}

impl PoolKey {
    pub fn skills<I, S>(skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut skills: Vec<String> = skills.into_iter().map(Into::into).collect();
        skills.sort();
        skills.dedup();
        if skills.is_empty() {
            PoolKey::Any
        } else {
            PoolKey::Skills(skills)
        }
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolKey::Territory(t) => write!(f, "territory:{}", t),
            PoolKey::Skills(skills) => write!(f, "skills:{}", skills.join(",")),
            PoolKey::Any => f.write_str("any"),
            PoolKey::Escalation(skill) => write!(f, "escalation:{}", skill),
        }
    }
}

/// Rotating pointer per pool key, holding the last-picked index
#[derive(Debug, Default)]
pub struct RoundRobinSelector {
    pointers: DashMap<PoolKey, usize>,
}

impl RoundRobinSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Candidate indices in the order they should be tried.
    ///
    /// `candidates` must be sorted by agent id. The first entry is the slot
    /// after the last pick; on wrap (or first use) the least loaded candidate,
    /// lowest id on ties, starts the cycle. The rest follow in rotation order
    /// so a lost reservation race can move on to the next agent.
    pub fn rotation(&self, key: &PoolKey, candidates: &[AgentSnapshot]) -> Vec<usize> {
        let len = candidates.len();
        if len == 0 {
            return Vec::new();
        }

        let next = self.pointers.get(key).map(|last| *last + 1);
        let start = match next {
            Some(index) if index < len => index,
            _ => least_loaded(candidates),
        };

        (0..len).map(|offset| (start + offset) % len).collect()
    }

    /// Record a successful pick
    pub fn advance(&self, key: PoolKey, picked: usize) {
        self.pointers.insert(key, picked);
    }

    pub fn last_picked(&self, key: &PoolKey) -> Option<usize> {
        self.pointers.get(key).map(|index| *index)
    }

    pub fn reset(&self) {
        self.pointers.clear();
    }
}

fn least_loaded(candidates: &[AgentSnapshot]) -> usize {
    candidates
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            a.workload
                .active_alerts
                .cmp(&b.workload.active_alerts)
                .then_with(|| a.agent_id().cmp(b.agent_id()))
        })
        .map(|(index, _)| index)
        .unwrap_or(0)
}
