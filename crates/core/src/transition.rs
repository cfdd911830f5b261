//! Pure backstack transition calculator
//!
//! Given two ordered backstack snapshots, a [`Transition`] records which
//! instances close (present in `from`, absent in `to`) and which open
//! (present in `to`, absent in `from`), each in their original relative
//! order. Membership is decided by instance id, never by key equality.
//!
//! The calculator is pure and stateless; the engine derives a transition per
//! commit and never stores one.

use crate::instance::{Instance, InstanceId};
use std::collections::HashSet;

/// The derived difference between two backstack snapshots
#[derive(Debug, Clone)]
pub struct Transition {
    /// Backstack before the operation
    pub from: Vec<Instance>,
    /// Backstack after the operation
    pub to: Vec<Instance>,
    /// Instances present in `from` but not `to`, in `from` order
    pub closed: Vec<Instance>,
    /// Instances present in `to` but not `from`, in `to` order
    pub opened: Vec<Instance>,
}

impl Transition {
    /// Compute the transition between two snapshots
    pub fn between(from: &[Instance], to: &[Instance]) -> Self {
        let from_ids: HashSet<InstanceId> = from.iter().map(Instance::id).collect();
        let to_ids: HashSet<InstanceId> = to.iter().map(Instance::id).collect();

        let closed = from
            .iter()
            .filter(|instance| !to_ids.contains(&instance.id()))
            .cloned()
            .collect();
        let opened = to
            .iter()
            .filter(|instance| !from_ids.contains(&instance.id()))
            .cloned()
            .collect();

        Self {
            from: from.to_vec(),
            to: to.to_vec(),
            closed,
            opened,
        }
    }

    /// Whether the transition changes nothing
    pub fn is_empty(&self) -> bool {
        self.closed.is_empty() && self.opened.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::NavigationKey;
    use proptest::prelude::*;
    use std::any::Any;

    #[derive(Debug, Clone)]
    struct TestKey(u8);

    impl NavigationKey for TestKey {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn instances(n: usize) -> Vec<Instance> {
        (0..n).map(|i| Instance::new(TestKey(i as u8))).collect()
    }

    #[test]
    fn test_identical_snapshots_yield_empty_transition() {
        let stack = instances(3);
        let transition = Transition::between(&stack, &stack);
        assert!(transition.is_empty());
        assert_eq!(transition.to.len(), 3);
    }

    #[test]
    fn test_pure_open() {
        let mut stack = instances(2);
        let from = stack.clone();
        stack.push(Instance::new(TestKey(9)));

        let transition = Transition::between(&from, &stack);
        assert!(transition.closed.is_empty());
        assert_eq!(transition.opened.len(), 1);
        assert_eq!(transition.opened[0], stack[2]);
    }

    #[test]
    fn test_pure_close() {
        let stack = instances(3);
        let to = vec![stack[0].clone(), stack[2].clone()];

        let transition = Transition::between(&stack, &to);
        assert_eq!(transition.closed, vec![stack[1].clone()]);
        assert!(transition.opened.is_empty());
    }

    #[test]
    fn test_closed_preserves_from_order() {
        let stack = instances(4);
        let to = vec![stack[1].clone()];

        let transition = Transition::between(&stack, &to);
        let closed_ids: Vec<_> = transition.closed.iter().map(Instance::id).collect();
        assert_eq!(
            closed_ids,
            vec![stack[0].id(), stack[2].id(), stack[3].id()]
        );
    }

    #[test]
    fn test_opened_preserves_to_order() {
        let from = instances(1);
        let new_a = Instance::new(TestKey(7));
        let new_b = Instance::new(TestKey(8));
        let to = vec![new_b.clone(), from[0].clone(), new_a.clone()];

        let transition = Transition::between(&from, &to);
        let opened_ids: Vec<_> = transition.opened.iter().map(Instance::id).collect();
        assert_eq!(opened_ids, vec![new_b.id(), new_a.id()]);
    }

    #[test]
    fn test_identical_keys_distinguished_by_id() {
        let a = Instance::new(TestKey(1));
        let b = Instance::new(TestKey(1));

        let transition = Transition::between(&[a.clone()], &[b.clone()]);
        assert_eq!(transition.closed, vec![a]);
        assert_eq!(transition.opened, vec![b]);
    }

    proptest! {
        /// closed == from − to and opened == to − from, for arbitrary overlaps.
        #[test]
        fn prop_set_difference_law(from_len in 0usize..6, keep in 0usize..6, add in 0usize..6) {
            let from = instances(from_len);
            let kept: Vec<Instance> = from.iter().take(keep.min(from_len)).cloned().collect();
            let mut to = kept.clone();
            to.extend(instances(add));

            let transition = Transition::between(&from, &to);

            let to_ids: std::collections::HashSet<_> = to.iter().map(Instance::id).collect();
            let from_ids: std::collections::HashSet<_> = from.iter().map(Instance::id).collect();

            for closed in &transition.closed {
                prop_assert!(from_ids.contains(&closed.id()));
                prop_assert!(!to_ids.contains(&closed.id()));
            }
            for opened in &transition.opened {
                prop_assert!(to_ids.contains(&opened.id()));
                prop_assert!(!from_ids.contains(&opened.id()));
            }
            prop_assert_eq!(transition.closed.len(), from_len - kept.len());
            prop_assert_eq!(transition.opened.len(), add);
        }
    }
}
