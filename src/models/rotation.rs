use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{Direction, TransactionRecord};

/// The scheduler's cursor. Owned by exactly one scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationState {
    pub current_index: usize,
    pub cycles_completed: u64,
}

impl RotationState {
    /// Close a cycle: move the cursor one step (mod `pool_size`) when
    /// `advance_cursor` is set, and always count the cycle.
    pub fn complete_cycle(&mut self, pool_size: usize, advance_cursor: bool) {
        if advance_cursor && pool_size > 0 {
            self.current_index = (self.current_index + 1) % pool_size;
        }
        self.cycles_completed += 1;
    }
}

/// When the cursor moves after a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdvancePolicy {
    /// Advance by one regardless of which account executed.
    Always,
    /// Keep the cursor on the scheduled index when a failover account
    /// executed, so the scheduled account gets its turn next cycle.
    ScheduledOnly,
}

impl AdvancePolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "always" => Some(AdvancePolicy::Always),
            "scheduled-only" | "scheduled_only" => Some(AdvancePolicy::ScheduledOnly),
            _ => None,
        }
    }

    /// Whether the cursor moves after a cycle whose executing account was
    /// `executed_index` (`None` when the cycle was abandoned before execution
    /// or failed).
    pub fn should_advance(self, scheduled_index: usize, executed_index: Option<usize>) -> bool {
        match self {
            AdvancePolicy::Always => true,
            AdvancePolicy::ScheduledOnly => match executed_index {
                Some(idx) => idx == scheduled_index,
                None => true,
            },
        }
    }
}

impl fmt::Display for AdvancePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvancePolicy::Always => write!(f, "always"),
            AdvancePolicy::ScheduledOnly => write!(f, "scheduled-only"),
        }
    }
}

/// Everything known about one cycle, for the per-cycle log line and status.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub scheduled_index: usize,
    pub executed_index: Option<usize>,
    pub account: Option<Address>,
    pub failover: bool,
    pub force_funded: bool,
    pub direction: Option<Direction>,
    pub stake: Option<U256>,
    pub gas_price: Option<u128>,
    pub gas_estimate: Option<u64>,
    pub record: Option<TransactionRecord>,
    /// Stable abandonment label, `None` on success.
    pub abandoned: Option<&'static str>,
    pub error: Option<String>,
}

impl CycleReport {
    pub fn new(cycle: u64, scheduled_index: usize) -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            cycle,
            started_at: Utc::now(),
            scheduled_index,
            executed_index: None,
            account: None,
            failover: false,
            force_funded: false,
            direction: None,
            stake: None,
            gas_price: None,
            gas_estimate: None,
            record: None,
            abandoned: None,
            error: None,
        }
    }

    /// Index of the account whose transaction confirmed, if any.
    pub fn confirmed_index(&self) -> Option<usize> {
        self.record.as_ref().and(self.executed_index)
    }
}

/// Published view of the scheduler for the ops API.
#[derive(Debug, Clone, Serialize)]
pub struct RotationSnapshot {
    pub state: RotationState,
    pub pool_size: usize,
    pub paused: bool,
    pub last_cycle: Option<CycleReport>,
}
