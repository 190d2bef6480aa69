//! Priority queue over owner health (min-heap: riskiest owner first)

use priority_queue::PriorityQueue;
use sim_engine::OwnerId;
use std::cmp::Reverse;
use std::collections::HashMap;

/// Owner health snapshot
#[derive(Debug, Clone)]
pub struct OwnerHealth {
    pub owner: OwnerId,
    /// Aggregate health factor, 1e6 scale; u128::MAX for debt-free owners
    pub health: u128,
    pub position_count: usize,
    /// Simulated time the snapshot was taken
    pub as_of: u64,
}

impl OwnerHealth {
    /// Below the liquidation threshold
    pub fn is_liquidatable(&self, threshold: u128) -> bool {
        self.health < threshold
    }

    /// Healthy but close enough to the threshold to watch
    pub fn in_alert_zone(&self, threshold: u128, alert: u128) -> bool {
        self.health >= threshold && self.health < alert
    }
}

/// Health-keyed queue with O(1) owner lookup
pub struct HealthQueue {
    queue: PriorityQueue<OwnerId, Reverse<u128>>,
    map: HashMap<OwnerId, OwnerHealth>,
}

impl HealthQueue {
    pub fn new() -> Self {
        Self {
            queue: PriorityQueue::new(),
            map: HashMap::new(),
        }
    }

    /// Insert or refresh an owner's snapshot
    pub fn push(&mut self, health: OwnerHealth) {
        let owner = health.owner;
        let score = health.health;
        self.map.insert(owner, health);
        self.queue.push(owner, Reverse(score));
    }

    /// Pop the owner with the lowest health
    pub fn pop(&mut self) -> Option<OwnerHealth> {
        let (owner, _priority) = self.queue.pop()?;
        self.map.remove(&owner)
    }

    /// Peek at the riskiest owner without removing
    pub fn peek(&self) -> Option<&OwnerHealth> {
        let (owner, _priority) = self.queue.peek()?;
        self.map.get(owner)
    }

    pub fn remove(&mut self, owner: OwnerId) -> Option<OwnerHealth> {
        self.queue.remove(&owner);
        self.map.remove(&owner)
    }

    pub fn get(&self, owner: OwnerId) -> Option<&OwnerHealth> {
        self.map.get(&owner)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// All owners strictly below the liquidation threshold
    pub fn liquidatable(&self, threshold: u128) -> Vec<OwnerHealth> {
        let mut owners: Vec<OwnerHealth> = self
            .map
            .values()
            .filter(|oh| oh.is_liquidatable(threshold))
            .cloned()
            .collect();
        owners.sort_by_key(|oh| oh.health);
        owners
    }

    /// Healthy owners inside the alert band
    pub fn alert_candidates(&self, threshold: u128, alert: u128) -> Vec<OwnerHealth> {
        let mut owners: Vec<OwnerHealth> = self
            .map
            .values()
            .filter(|oh| oh.in_alert_zone(threshold, alert))
            .cloned()
            .collect();
        owners.sort_by_key(|oh| oh.health);
        owners
    }
}

impl Default for HealthQueue {
    fn default() -> Self {
        Self::new()
    }
}
