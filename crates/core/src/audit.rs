use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::role::{InvocationStrategy, Role};

pub const INTERACTION_LOG_CAPACITY: usize = 50;

/// Keys produced by a role execution, or a marker that nothing decoded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "keys", rename_all = "snake_case")]
pub enum OutputKeys {
    Decoded(BTreeSet<String>),
    Raw,
}

impl OutputKeys {
    pub fn len(&self) -> usize {
        match self {
            Self::Decoded(keys) => keys.len(),
            Self::Raw => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionLogEntry {
    pub entry_id: String,
    pub recorded_at: DateTime<Utc>,
    pub role: Role,
    pub strategy: InvocationStrategy,
    pub fallback_used: bool,
    pub input_keys: BTreeSet<String>,
    pub output_keys: OutputKeys,
    pub success: bool,
    pub input_chars: usize,
    pub output_chars: usize,
}

impl InteractionLogEntry {
    pub fn new(
        role: Role,
        strategy: InvocationStrategy,
        input_keys: BTreeSet<String>,
        input_chars: usize,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4().to_string(),
            recorded_at: Utc::now(),
            role,
            strategy,
            fallback_used: false,
            input_keys,
            output_keys: OutputKeys::Raw,
            success: false,
            input_chars,
            output_chars: 0,
        }
    }

    pub fn with_fallback(mut self, strategy: InvocationStrategy) -> Self {
        self.strategy = strategy;
        self.fallback_used = true;
        self
    }

    pub fn with_output(
        mut self,
        output_keys: OutputKeys,
        output_chars: usize,
        success: bool,
    ) -> Self {
        self.output_keys = output_keys;
        self.output_chars = output_chars;
        self.success = success;
        self
    }
}

/// Fixed-capacity audit trail of role executions.
///
/// Recording past capacity evicts the oldest entry first. Entries are only
/// read back for observability and never drive control flow.
#[derive(Clone, Debug)]
pub struct InteractionLog {
    entries: VecDeque<InteractionLogEntry>,
    capacity: usize,
}

impl Default for InteractionLog {
    fn default() -> Self {
        Self::with_capacity(INTERACTION_LOG_CAPACITY)
    }
}

impl InteractionLog {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { entries: VecDeque::with_capacity(capacity), capacity }
    }

    pub fn record(&mut self, entry: InteractionLogEntry) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn entries(&self) -> Vec<InteractionLogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn last(&self) -> Option<&InteractionLogEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
