use log::{debug, warn};

use crate::config::{ConfigError, CoreConfig, Trace};
use crate::dinst::{DInst, TransTags};
use crate::engine::cluster::ClusterManager;
use crate::engine::reg_pool::RegPool;
use crate::engine::replay_queue::ReplayQueue;
use crate::engine::rob::Rob;
use crate::engine::stats::{CoreStats, RetireOutcome, StallCause};
use crate::instructions::{Cycle, InstKind};
use crate::pipeline::PipeQueue;

/// Write-only observer for transactional-memory bookkeeping. Tags are
/// forwarded after a successful commit; the observer cannot block or alter
/// retirement.
pub(crate) trait CoherenceObserver {
    fn retired(&mut self, tags: TransTags);
}

/// The in-order/out-of-order transition: `Draining` refuses new dispatches
/// until the ROB empties, then the mode flips and admission resumes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum SwitchState {
    Normal,
    Draining,
}

/// One simulated out-of-order core: the dispatch/issue/replay/retire state
/// machine around the ROB, register pools and the cluster arbitration. All
/// stages are invoked synchronously, once per cycle, by the external driver;
/// no other component mutates this state.
pub(crate) struct Core {
    id: usize,
    issue_width: usize,
    retire_width: usize,
    realistic_width: usize,
    inorder: bool,
    switch_state: SwitchState,
    switch_target: bool,
    mem_latency: u64,
    rob: Rob,
    replay_q: ReplayQueue,
    reg_pool: RegPool,
    clusters: ClusterManager,
    pub(crate) stats: CoreStats,
    clock: Cycle,
    trace: Trace,
    // forward-progress watchdog
    liveness_window: u64,
    prev_head: Option<u64>,
    prev_empty: bool,
    coherence: Option<Box<dyn CoherenceObserver>>,
}

impl Core {
    pub(crate) fn new(config: &CoreConfig, id: usize,
                      coherence: Option<Box<dyn CoherenceObserver>>)
                      -> Result<Core, ConfigError> {
        config.validate()?;

        Ok(Core {
            id,
            issue_width: config.issue_width,
            retire_width: config.retire_width,
            realistic_width: config.realistic_width(),
            inorder: config.inorder,
            switch_state: SwitchState::Normal,
            switch_target: config.inorder,
            mem_latency: config.mem_latency,
            rob: Rob::new(config.rob_size),
            replay_q: ReplayQueue::new(2 * config.rob_size),
            reg_pool: RegPool::new(config.int_regs, config.fp_regs, config.track_mispath),
            clusters: ClusterManager::new(config),
            stats: CoreStats::new(),
            clock: 0,
            trace: config.trace.clone(),
            liveness_window: config.liveness_window,
            prev_head: None,
            prev_empty: false,
            coherence,
        })
    }

    pub(crate) fn clock(&self) -> Cycle {
        self.clock
    }

    pub(crate) fn rob_size(&self) -> usize {
        self.rob.size()
    }

    pub(crate) fn rob_is_empty(&self) -> bool {
        self.rob.is_empty()
    }

    pub(crate) fn replay_q_len(&self) -> usize {
        self.replay_q.len()
    }

    pub(crate) fn replay_q_is_empty(&self) -> bool {
        self.replay_q.is_empty()
    }

    pub(crate) fn reg_pool(&self) -> &RegPool {
        &self.reg_pool
    }

    pub(crate) fn is_inorder(&self) -> bool {
        self.inorder
    }

    /// Per-cycle bookkeeping before any stage runs: advance the clock, give
    /// the clusters and the cache their fresh port budgets.
    pub(crate) fn new_cycle(&mut self) {
        self.clock += 1;
        self.clusters.new_cycle(self.clock);
    }

    /// Rename/dispatch one instruction into the ROB tail. All-or-nothing: a
    /// stall leaves no side effects and hands the instruction back to the
    /// caller. The check order defines the stall priority; earlier checks
    /// mask later ones.
    pub(crate) fn shared_add_inst(&mut self, mut dinst: DInst)
                                  -> Result<(), (StallCause, DInst)> {
        if self.rob.is_full() {
            return Err((StallCause::SmallRobStall, dinst));
        }

        if self.switch_state == SwitchState::Draining {
            if !self.rob.is_empty() {
                return Err((StallCause::SwitchStall, dinst));
            }
            self.inorder = self.switch_target;
            self.switch_state = SwitchState::Normal;
            debug!("Core[{}]: mode switch complete, inorder={}", self.id, self.inorder);
        }

        let dst_class = dinst.dst_class();
        if !self.reg_pool.has_free(dst_class) {
            return Err((StallCause::SmallRegStall, dinst));
        }

        let rid = self.clusters.resolve(dinst.kind());

        let sc = self.clusters.cluster_can_issue(rid);
        if sc != StallCause::NoStall {
            return Err((sc, dinst));
        }

        let sc = self.clusters.resource_can_issue(rid, &dinst);
        if sc != StallCause::NoStall {
            return Err((sc, dinst));
        }

        // admission
        dinst.mark_issued();
        self.reg_pool.alloc(dst_class, dinst.is_fake());
        self.stats.account_dispatch(dinst.instr(), dinst.is_fake());
        self.clusters.add_inst(rid, &dinst);
        dinst.set_resource(rid);
        dinst.set_exec_done_at(self.clock + dinst.instr().latency as Cycle);

        if self.trace.issue {
            debug!("Issued [{}]", dinst);
        }

        self.rob.push(dinst);
        Ok(())
    }

    /// The per-cycle issue stage. If the replay queue is non-empty the whole
    /// cycle belongs to it and the realistic width is charged to ReplayStall;
    /// replay and fresh dispatch never interleave within one cycle.
    /// Otherwise buckets are walked oldest-first until the width runs out or
    /// a dispatch stalls. Returns the number of instructions consumed from
    /// the fetch pipeline (admitted or swallowed).
    pub(crate) fn issue(&mut self, pipe_q: &mut PipeQueue) -> usize {
        debug_assert!(!pipe_q.is_empty());

        if !self.replay_q.is_empty() {
            self.issue_from_replay_q();
            self.stats.add_stall(StallCause::ReplayStall, self.realistic_width as u64);
            return 0;
        }

        let mut issued = 0;
        let mut swallowed = 0;

        while !pipe_q.is_empty() {
            loop {
                if issued >= self.issue_width {
                    return issued + swallowed;
                }

                let bucket = pipe_q.front_mut();
                debug_assert!(!bucket.is_empty());
                let dinst = match bucket.pop() {
                    Some(dinst) => dinst,
                    None => break,
                };

                if !dinst.is_fake() && dinst.is_ctx_killed() {
                    // the owning context died; swallow without dispatching
                    self.stats.n_killed += 1;
                    swallowed += 1;
                } else {
                    match self.shared_add_inst(dinst) {
                        Ok(()) => issued += 1,
                        Err((cause, dinst)) => {
                            pipe_q.front_mut().push_front(dinst);
                            if issued < self.realistic_width {
                                self.stats.add_stall(
                                    cause, (self.realistic_width - issued) as u64);
                            }
                            return issued + swallowed;
                        }
                    }
                }

                if pipe_q.front_mut().is_empty() {
                    break;
                }
            }

            let bucket = pipe_q.take_front();
            pipe_q.done_item(bucket);
        }

        issued + swallowed
    }

    /// Drain the replay queue oldest-first, stopping at the width budget or
    /// the first stall. Entries leave the queue only on successful dispatch.
    pub(crate) fn issue_from_replay_q(&mut self) -> usize {
        let mut issued = 0;

        while !self.replay_q.is_empty() {
            let dinst = self.replay_q.pop();
            match self.shared_add_inst(dinst) {
                Ok(()) => {
                    issued += 1;
                    if issued >= self.issue_width {
                        break;
                    }
                }
                Err((cause, dinst)) => {
                    self.replay_q.push_front(dinst);
                    if issued < self.realistic_width {
                        self.stats.add_stall(cause, (self.realistic_width - issued) as u64);
                    }
                    break;
                }
            }
        }

        issued
    }

    /// Selective replay anchored at `target_id`: every live ROB entry at or
    /// younger than the target is cloned into the replay queue in program
    /// order and the original becomes a dead placeholder. Older entries keep
    /// their progress. Dead placeholders never anchor, so a re-issued clone
    /// can itself be replayed; with no live incarnation resident this is a
    /// no-op.
    pub(crate) fn replay(&mut self, target_id: u64) {
        let mut push = false;

        for seq in self.rob.head_seq()..self.rob.tail_seq() {
            let entry = self.rob.get_mut(seq);
            if entry.is_dead() {
                continue;
            }

            if entry.id() == target_id {
                push = true;
            }

            if push {
                let clone = entry.clone_for_replay();
                entry.set_dead();
                if self.trace.replay {
                    debug!("Replay [{}]", clone);
                }
                self.replay_q.push(clone);
            }
        }
    }

    /// A stand-in for the external emulation/functional-unit layer: flips the
    /// executed flag once an instruction's latency has elapsed and starts the
    /// memory access of loads.
    pub(crate) fn execute(&mut self) {
        let mem_latency = self.mem_latency;
        let now = self.clock;

        for seq in self.rob.head_seq()..self.rob.tail_seq() {
            let entry = self.rob.get_mut(seq);
            if entry.is_dead() || entry.is_executed() {
                continue;
            }

            match entry.exec_done_at() {
                Some(done) if now >= done => {
                    entry.mark_executed();
                    if entry.kind() == InstKind::Load {
                        entry.set_mem_ready_at(now + mem_latency);
                    }
                }
                _ => {}
            }
        }
    }

    /// The per-cycle retire stage: commit from the ROB head, strictly in
    /// program order, up to the retire width. The first blocked instruction
    /// stops the whole cycle; dead placeholders are discarded without
    /// consuming retire bandwidth.
    pub(crate) fn retire(&mut self) {
        if self.liveness_window > 0 && self.clock % self.liveness_window == 0 {
            self.check_progress();
        }

        self.stats.sample_rob(self.rob.size());

        let mut retired = 0;
        while retired < self.retire_width && !self.rob.is_empty() {
            if self.rob.head_inst().is_dead() {
                self.discard_head();
                continue;
            }

            let head = self.rob.head_inst();
            if !head.is_executed() {
                self.stats.add_no_retire(retired, head.kind(), RetireOutcome::NotExecuted);
                break;
            }

            let rid = match head.resource() {
                Some(rid) => rid,
                None => panic!("retire: instruction {} has no bound resource", head.id()),
            };

            let outcome = self.clusters.retire(rid, head, self.clock);
            if outcome != RetireOutcome::Retired {
                self.stats.add_no_retire(retired, head.kind(), outcome);
                break;
            }

            let dinst = self.rob.pop();
            if self.trace.retire {
                debug!("Retired [{}]", dinst);
            }

            if !dinst.is_fake() {
                self.reg_pool.release(dinst.dst_class());
            }
            self.stats.rob_energy += 1;

            if let Some(tags) = dinst.trans() {
                if let Some(observer) = &mut self.coherence {
                    observer.retired(tags);
                }
            }

            retired += 1;
        }

        if !self.rob.is_empty() || retired != 0 {
            self.stats.add_retire_sample(retired);
        }
    }

    /// A dead placeholder reached the ROB head: its clone carries the work
    /// now, so the placeholder just gives back its resources.
    fn discard_head(&mut self) {
        let dinst = self.rob.pop();
        debug_assert!(dinst.is_dead());

        let rid = match dinst.resource() {
            Some(rid) => rid,
            None => panic!("discard: instruction {} has no bound resource", dinst.id()),
        };
        self.clusters.discard(rid, &dinst);

        // the clone re-allocates at re-dispatch; fake allocations live in the
        // shadow pool and are reclaimed wholesale on wrong-path resolution
        if !dinst.is_fake() {
            self.reg_pool.release(dinst.dst_class());
        }
    }

    /// Diagnostic only: an unchanged ROB head across two consecutive check
    /// windows is a liveness warning, never a crash.
    fn check_progress(&mut self) {
        if self.rob.is_empty() {
            if self.prev_empty {
                warn!("Core[{}]: ROB empty for a long time @{}", self.id, self.clock);
            }
            self.prev_empty = true;
            self.prev_head = None;
            return;
        }

        let head_id = self.rob.head_inst().id();
        if self.prev_head == Some(head_id) {
            warn!("Core[{}]: no forward progress, ROB head {} stuck @{}",
                  self.id, head_id, self.clock);
        }
        self.prev_head = Some(head_id);
        self.prev_empty = false;
    }

    /// Request an in-order/out-of-order transition. The switch takes effect
    /// once the ROB drains; until then dispatch reports SwitchStall.
    pub(crate) fn request_mode_switch(&mut self, inorder: bool) {
        if inorder == self.inorder && self.switch_state == SwitchState::Normal {
            return;
        }
        self.switch_target = inorder;
        self.switch_state = SwitchState::Draining;
    }

    /// Wrong-path resolution from the speculation tracker: abandon all
    /// shadow register allocations at once.
    pub(crate) fn clear_mispath(&mut self) {
        self.reg_pool.clear_shadow();
    }

    pub(crate) fn report(&self) {
        self.stats.report(self.id, self.clock);
    }
}

#[cfg(test)]
impl Core {
    pub(crate) fn rob_ids(&self) -> Vec<u64> {
        (self.rob.head_seq()..self.rob.tail_seq())
            .map(|seq| self.rob.get(seq).id())
            .collect()
    }

    pub(crate) fn rob_dead_flags(&self) -> Vec<bool> {
        (self.rob.head_seq()..self.rob.tail_seq())
            .map(|seq| self.rob.get(seq).is_dead())
            .collect()
    }

    pub(crate) fn replay_ids(&self) -> Vec<u64> {
        self.replay_q.iter().map(|dinst| dinst.id()).collect()
    }
}
