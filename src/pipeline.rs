use std::collections::VecDeque;
use std::rc::Rc;

use log::trace;

use crate::config::CoreConfig;
use crate::dinst::DInst;
use crate::instructions::Program;

/// A fetch bucket: the group of dynamic instructions that entered the
/// pipeline in the same cycle, drained oldest-first by the issue stage.
pub(crate) struct IBucket {
    instrs: VecDeque<DInst>,
}

impl IBucket {
    fn new(capacity: usize) -> IBucket {
        IBucket { instrs: VecDeque::with_capacity(capacity) }
    }

    pub(crate) fn push(&mut self, dinst: DInst) {
        self.instrs.push_back(dinst);
    }

    pub(crate) fn pop(&mut self) -> Option<DInst> {
        self.instrs.pop_front()
    }

    pub(crate) fn push_front(&mut self, dinst: DInst) {
        self.instrs.push_front(dinst);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.instrs.len()
    }
}

/// The ordered sequence of fetch buckets between the frontend and the issue
/// stage. Fully drained buckets are handed back through `done_item` so their
/// allocation can be recycled for a later fetch group.
pub(crate) struct PipeQueue {
    inst_queue: VecDeque<IBucket>,
    recycled: Vec<IBucket>,
}

impl PipeQueue {
    pub(crate) fn new() -> PipeQueue {
        PipeQueue {
            inst_queue: VecDeque::new(),
            recycled: Vec::new(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.inst_queue.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.inst_queue.len()
    }

    pub(crate) fn front_mut(&mut self) -> &mut IBucket {
        match self.inst_queue.front_mut() {
            Some(bucket) => bucket,
            None => panic!("PipeQueue: no bucket to issue from"),
        }
    }

    pub(crate) fn take_front(&mut self) -> IBucket {
        match self.inst_queue.pop_front() {
            Some(bucket) => bucket,
            None => panic!("PipeQueue: no bucket to take"),
        }
    }

    /// Notification from the issue stage that a bucket has been fully drained.
    pub(crate) fn done_item(&mut self, bucket: IBucket) {
        debug_assert!(bucket.is_empty(), "done_item on a non-empty bucket");
        self.recycled.push(bucket);
    }

    pub(crate) fn next_bucket(&mut self, capacity: usize) -> IBucket {
        self.recycled.pop().unwrap_or_else(|| IBucket::new(capacity))
    }

    pub(crate) fn queue_bucket(&mut self, bucket: IBucket) {
        debug_assert!(!bucket.is_empty(), "queueing an empty bucket");
        self.inst_queue.push_back(bucket);
    }
}

/// A minimal fetch model: walks the workload trace in program order and emits
/// one bucket of up to `fetch_width` instructions per cycle. Branch prediction
/// and instruction caches live outside this crate; every fetch hits.
pub(crate) struct Frontend {
    program: Rc<Program>,
    pos: usize,
    fetch_width: usize,
    inst_queue_size: usize,
    next_id: u64,
}

impl Frontend {
    pub(crate) fn new(config: &CoreConfig, program: Rc<Program>) -> Frontend {
        Frontend {
            program,
            pos: 0,
            fetch_width: config.fetch_width,
            inst_queue_size: config.inst_queue_size,
            next_id: 1,
        }
    }

    pub(crate) fn done(&self) -> bool {
        self.pos >= self.program.code.len()
    }

    pub(crate) fn fetch(&mut self, pipe_q: &mut PipeQueue) {
        // a long back-end stall pauses fetch instead of piling up buckets
        if self.done() || pipe_q.len() >= self.inst_queue_size {
            return;
        }

        let mut bucket = pipe_q.next_bucket(self.fetch_width);
        for _ in 0..self.fetch_width {
            if self.done() {
                break;
            }

            let instr = self.program.code[self.pos];
            let dinst = DInst::new(self.next_id, instr);
            trace!("Fetched [{}]", dinst);

            bucket.push(dinst);
            self.next_id += 1;
            self.pos += 1;
        }

        if bucket.is_empty() {
            pipe_q.done_item(bucket);
        } else {
            pipe_q.queue_bucket(bucket);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::{parse_program, InstKind};

    #[test]
    fn test_fetch_buckets_in_order() {
        let program = Rc::new(parse_program("alu\nld\nst\n").unwrap());
        let config = CoreConfig { fetch_width: 2, ..CoreConfig::small() };
        let mut frontend = Frontend::new(&config, program);
        let mut pipe_q = PipeQueue::new();

        frontend.fetch(&mut pipe_q);
        frontend.fetch(&mut pipe_q);
        assert!(frontend.done());

        let mut bucket = pipe_q.take_front();
        assert_eq!(bucket.len(), 2);
        assert_eq!(bucket.pop().unwrap().kind(), InstKind::IntAlu);
        assert_eq!(bucket.pop().unwrap().kind(), InstKind::Load);

        let mut bucket = pipe_q.take_front();
        assert_eq!(bucket.len(), 1);
        assert_eq!(bucket.pop().unwrap().kind(), InstKind::Store);
    }

    #[test]
    fn test_fetch_pauses_at_queue_bound() {
        let program = Rc::new(parse_program("alu\nalu\nalu\nalu\n").unwrap());
        let config = CoreConfig {
            fetch_width: 1,
            inst_queue_size: 2,
            ..CoreConfig::small()
        };
        let mut frontend = Frontend::new(&config, program);
        let mut pipe_q = PipeQueue::new();

        for _ in 0..4 {
            frontend.fetch(&mut pipe_q);
        }
        assert_eq!(pipe_q.len(), 2);
        assert!(!frontend.done());

        // draining a bucket resumes fetching
        let mut bucket = pipe_q.take_front();
        while bucket.pop().is_some() {}
        pipe_q.done_item(bucket);
        frontend.fetch(&mut pipe_q);
        assert_eq!(pipe_q.len(), 2);
    }

    #[test]
    fn test_bucket_recycled_after_done_item() {
        let mut pipe_q = PipeQueue::new();
        let bucket = pipe_q.next_bucket(4);
        pipe_q.done_item(bucket);
        let _ = pipe_q.next_bucket(4);
    }
}
