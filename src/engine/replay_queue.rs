use std::collections::VecDeque;

use log::warn;

use crate::dinst::DInst;

/// Ordered queue of replay clones waiting to be re-dispatched. The nominal
/// capacity (2x the ROB) is a soft bound: a push past it is diagnosed but
/// never refused, since replay entries must not be dropped.
pub(crate) struct ReplayQueue {
    entries: VecDeque<DInst>,
    soft_capacity: usize,
}

impl ReplayQueue {
    pub(crate) fn new(soft_capacity: usize) -> ReplayQueue {
        ReplayQueue {
            entries: VecDeque::with_capacity(soft_capacity),
            soft_capacity,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn push(&mut self, dinst: DInst) {
        if self.entries.len() >= self.soft_capacity {
            warn!("replay queue beyond nominal capacity {} ({} entries)",
                  self.soft_capacity, self.entries.len() + 1);
        }
        self.entries.push_back(dinst);
    }

    pub(crate) fn pop(&mut self) -> DInst {
        match self.entries.pop_front() {
            Some(dinst) => dinst,
            None => panic!("ReplayQueue: can't pop when empty"),
        }
    }

    pub(crate) fn push_front(&mut self, dinst: DInst) {
        self.entries.push_front(dinst);
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &DInst> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::{InstKind, Instruction};

    #[test]
    fn test_fifo_order() {
        let mut q = ReplayQueue::new(4);
        for id in 1..=3 {
            q.push(DInst::new(id, Instruction::new(InstKind::Load)));
        }

        assert_eq!(q.len(), 3);
        assert_eq!(q.pop().id(), 1);
        assert_eq!(q.pop().id(), 2);
        assert_eq!(q.pop().id(), 3);
        assert!(q.is_empty());
    }

    #[test]
    fn test_push_front_restores_order() {
        let mut q = ReplayQueue::new(4);
        q.push(DInst::new(1, Instruction::new(InstKind::Load)));
        q.push(DInst::new(2, Instruction::new(InstKind::Load)));

        let first = q.pop();
        q.push_front(first);
        assert_eq!(q.pop().id(), 1);
    }

    #[test]
    fn test_soft_bound_does_not_refuse() {
        let mut q = ReplayQueue::new(1);
        q.push(DInst::new(1, Instruction::new(InstKind::Load)));
        q.push(DInst::new(2, Instruction::new(InstKind::Load)));
        assert_eq!(q.len(), 2);
    }
}
