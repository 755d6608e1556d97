//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{backend::Backend, LoadBalancer};

/// Round-robin selector.
/// Stores an internal counter to rotate through backends.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        if backends.is_empty() {
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % backends.len();
        backends.get(index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn backend(addr: &str) -> Arc<Backend> {
        Arc::new(Backend::new(addr, HashMap::new()))
    }

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new();
        let backends = vec![backend("10.0.0.1:9000"), backend("10.0.0.2:9000")];

        let s1 = lb.next_server(&backends).unwrap();
        assert_eq!(s1.addr, "10.0.0.1:9000");

        let s2 = lb.next_server(&backends).unwrap();
        assert_eq!(s2.addr, "10.0.0.2:9000");

        let s3 = lb.next_server(&backends).unwrap();
        assert_eq!(s3.addr, "10.0.0.1:9000");
    }

    #[test]
    fn test_round_robin_empty() {
        let lb = RoundRobin::new();
        assert!(lb.next_server(&[]).is_none());
    }
}
