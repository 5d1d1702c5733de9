use crate::dinst::DInst;

/// The reorder buffer: a bounded circular buffer of in-flight dynamic
/// instructions in program order. Entries are addressed by an absolute
/// sequence number so the replay walk can visit head..tail directly; `head`
/// is the oldest non-retired instruction.
pub(crate) struct Rob {
    capacity: usize,
    head: u64,
    tail: u64,
    slots: Vec<Option<DInst>>,
}

impl Rob {
    pub(crate) fn new(capacity: usize) -> Rob {
        let mut slots = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            slots.push(None);
        }

        Rob {
            capacity,
            head: 0,
            tail: 0,
            slots,
        }
    }

    fn to_index(&self, seq: u64) -> usize {
        (seq % self.capacity as u64) as usize
    }

    pub(crate) fn size(&self) -> usize {
        (self.tail - self.head) as usize
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub(crate) fn is_full(&self) -> bool {
        self.size() == self.capacity
    }

    pub(crate) fn head_seq(&self) -> u64 {
        self.head
    }

    pub(crate) fn tail_seq(&self) -> u64 {
        self.tail
    }

    pub(crate) fn push(&mut self, dinst: DInst) {
        assert!(!self.is_full(), "ROB: can't push when full");

        let index = self.to_index(self.tail);
        self.slots[index] = Some(dinst);
        self.tail += 1;
    }

    pub(crate) fn get(&self, seq: u64) -> &DInst {
        assert!(seq >= self.head && seq < self.tail, "ROB: seq {} not resident", seq);

        match &self.slots[self.to_index(seq)] {
            Some(dinst) => dinst,
            None => panic!("ROB: resident slot {} is empty", seq),
        }
    }

    pub(crate) fn get_mut(&mut self, seq: u64) -> &mut DInst {
        assert!(seq >= self.head && seq < self.tail, "ROB: seq {} not resident", seq);

        let index = self.to_index(seq);
        match &mut self.slots[index] {
            Some(dinst) => dinst,
            None => panic!("ROB: resident slot {} is empty", seq),
        }
    }

    pub(crate) fn head_inst(&self) -> &DInst {
        assert!(!self.is_empty(), "ROB: no head when empty");
        self.get(self.head)
    }

    pub(crate) fn pop(&mut self) -> DInst {
        assert!(!self.is_empty(), "ROB: can't pop when empty");

        let index = self.to_index(self.head);
        let dinst = match self.slots[index].take() {
            Some(dinst) => dinst,
            None => panic!("ROB: head slot {} is empty", self.head),
        };
        self.head += 1;
        dinst
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::{InstKind, Instruction};

    fn dinst(id: u64) -> DInst {
        DInst::new(id, Instruction::new(InstKind::IntAlu))
    }

    #[test]
    fn test_push_pop_program_order() {
        let mut rob = Rob::new(4);
        for id in 1..=4 {
            rob.push(dinst(id));
        }
        assert!(rob.is_full());

        for id in 1..=4 {
            assert_eq!(rob.pop().id(), id);
        }
        assert!(rob.is_empty());
    }

    #[test]
    fn test_wrap_around() {
        let mut rob = Rob::new(2);
        rob.push(dinst(1));
        rob.push(dinst(2));
        assert_eq!(rob.pop().id(), 1);
        rob.push(dinst(3));
        assert_eq!(rob.pop().id(), 2);
        assert_eq!(rob.pop().id(), 3);
    }

    #[test]
    fn test_seq_access() {
        let mut rob = Rob::new(4);
        rob.push(dinst(10));
        rob.push(dinst(11));

        let head = rob.head_seq();
        assert_eq!(rob.get(head).id(), 10);
        assert_eq!(rob.get(head + 1).id(), 11);
        assert_eq!(rob.head_inst().id(), 10);
    }

    #[test]
    #[should_panic(expected = "can't push when full")]
    fn test_push_full_panics() {
        let mut rob = Rob::new(2);
        rob.push(dinst(1));
        rob.push(dinst(2));
        rob.push(dinst(3));
    }
}
