use std::collections::VecDeque;

use crate::config::CoreConfig;
use crate::dinst::DInst;
use crate::engine::stats::{RetireOutcome, StallCause};
use crate::instructions::{Cycle, InstKind, INST_KIND_COUNT};

pub(crate) type ResourceId = usize;
type ClusterId = usize;

/// An execution cluster: a shared issue window plus per-cycle issue ports.
/// The window drains when its instructions leave the ROB (retire or
/// placeholder discard); ports come back every cycle.
struct Cluster {
    name: &'static str,
    win_size: u32,
    win_used: u32,
    ports_per_cycle: u32,
    ports_used: u32,
}

impl Cluster {
    fn new(name: &'static str, win_size: u32, ports_per_cycle: u32) -> Cluster {
        Cluster { name, win_size, win_used: 0, ports_per_cycle, ports_used: 0 }
    }

    fn can_issue(&self) -> StallCause {
        if self.win_used >= self.win_size {
            return StallCause::SmallWinStall;
        }
        if self.ports_used >= self.ports_per_cycle {
            return StallCause::PortConflictStall;
        }
        StallCause::NoStall
    }

    fn add_inst(&mut self) {
        debug_assert!(self.win_used < self.win_size, "{} window overflow", self.name);
        self.win_used += 1;
        self.ports_used += 1;
    }

    fn remove_inst(&mut self) {
        debug_assert!(self.win_used > 0, "{} window underflow", self.name);
        self.win_used -= 1;
    }

    fn new_cycle(&mut self) {
        self.ports_used = 0;
    }
}

/// What a functional-unit resource tracks beyond its cluster window.
enum FuKind {
    Generic,
    Load { max_outstanding: u32, outstanding: u32 },
    Store { max_outstanding: u32, outstanding: u32 },
    Branch { max_outstanding: u32, outstanding: u32 },
    Fence,
}

struct Resource {
    cluster: ClusterId,
    kind: FuKind,
}

/// Retire-side cache interface for stores: per-cycle write ports and a small
/// write buffer whose entries drain after the memory latency. A fence commits
/// only once the buffer is empty.
struct CacheModel {
    ports_per_cycle: u32,
    ports_used: u32,
    space: u32,
    latency: u64,
    drain: VecDeque<Cycle>,
}

impl CacheModel {
    fn new(config: &CoreConfig) -> CacheModel {
        CacheModel {
            ports_per_cycle: config.cache_ports,
            ports_used: 0,
            space: config.cache_space,
            latency: config.mem_latency,
            drain: VecDeque::new(),
        }
    }

    /// `None` means the store committed; otherwise the blocking outcome.
    fn try_commit(&mut self, now: Cycle) -> Option<RetireOutcome> {
        if self.drain.len() as u32 >= self.space {
            return Some(RetireOutcome::NoCacheSpace);
        }
        if self.ports_used >= self.ports_per_cycle {
            return Some(RetireOutcome::NoCachePorts);
        }

        self.ports_used += 1;
        self.drain.push_back(now + self.latency);
        None
    }

    fn draining(&self) -> bool {
        !self.drain.is_empty()
    }

    fn new_cycle(&mut self, now: Cycle) {
        self.ports_used = 0;
        while let Some(&done) = self.drain.front() {
            if done > now {
                break;
            }
            self.drain.pop_front();
        }
    }
}

const INT_CLUSTER: ClusterId = 0;
const MEM_CLUSTER: ClusterId = 1;
const FP_CLUSTER: ClusterId = 2;

const RES_INT: ResourceId = 0;
const RES_BRANCH: ResourceId = 1;
const RES_LOAD: ResourceId = 2;
const RES_STORE: ResourceId = 3;
const RES_FENCE: ResourceId = 4;
const RES_FP: ResourceId = 5;

/// Per-opcode functional-unit lookup plus the two-phase admission check.
/// The kind-to-resource table is built once at construction; `resolve` is a
/// plain array access afterwards.
pub(crate) struct ClusterManager {
    clusters: Vec<Cluster>,
    resources: Vec<Resource>,
    by_kind: [ResourceId; INST_KIND_COUNT],
    cache: CacheModel,
}

impl ClusterManager {
    pub(crate) fn new(config: &CoreConfig) -> ClusterManager {
        // an in-order core degenerates to single-entry windows
        let win_size = if config.inorder { 1 } else { config.win_size };
        let ports = config.cluster_ports;

        let clusters = vec![
            Cluster::new("IntCluster", win_size, ports),
            Cluster::new("MemCluster", win_size, ports),
            Cluster::new("FpCluster", win_size, ports),
        ];

        let resources = vec![
            Resource { cluster: INT_CLUSTER, kind: FuKind::Generic },
            Resource {
                cluster: INT_CLUSTER,
                kind: FuKind::Branch { max_outstanding: config.outs_branches, outstanding: 0 },
            },
            Resource {
                cluster: MEM_CLUSTER,
                kind: FuKind::Load { max_outstanding: config.outs_loads, outstanding: 0 },
            },
            Resource {
                cluster: MEM_CLUSTER,
                kind: FuKind::Store { max_outstanding: config.outs_stores, outstanding: 0 },
            },
            Resource { cluster: MEM_CLUSTER, kind: FuKind::Fence },
            Resource { cluster: FP_CLUSTER, kind: FuKind::Generic },
        ];

        let mut by_kind = [RES_INT; INST_KIND_COUNT];
        by_kind[InstKind::BranchJump as usize] = RES_BRANCH;
        by_kind[InstKind::Load as usize] = RES_LOAD;
        by_kind[InstKind::Store as usize] = RES_STORE;
        by_kind[InstKind::Fence as usize] = RES_FENCE;
        by_kind[InstKind::Event as usize] = RES_FENCE;
        by_kind[InstKind::FpAlu as usize] = RES_FP;
        by_kind[InstKind::FpMult as usize] = RES_FP;
        by_kind[InstKind::FpDiv as usize] = RES_FP;

        ClusterManager {
            clusters,
            resources,
            by_kind,
            cache: CacheModel::new(config),
        }
    }

    /// Every legal kind resolves; the table is total by construction.
    pub(crate) fn resolve(&self, kind: InstKind) -> ResourceId {
        self.by_kind[kind as usize]
    }

    pub(crate) fn cluster_can_issue(&self, rid: ResourceId) -> StallCause {
        self.clusters[self.resources[rid].cluster].can_issue()
    }

    pub(crate) fn resource_can_issue(&self, rid: ResourceId, _dinst: &DInst) -> StallCause {
        match &self.resources[rid].kind {
            FuKind::Generic | FuKind::Fence => StallCause::NoStall,
            FuKind::Load { max_outstanding, outstanding } => {
                if outstanding >= max_outstanding {
                    StallCause::OutsLoadsStall
                } else {
                    StallCause::NoStall
                }
            }
            FuKind::Store { max_outstanding, outstanding } => {
                if outstanding >= max_outstanding {
                    StallCause::OutsStoresStall
                } else {
                    StallCause::NoStall
                }
            }
            FuKind::Branch { max_outstanding, outstanding } => {
                if outstanding >= max_outstanding {
                    StallCause::OutsBranchesStall
                } else {
                    StallCause::NoStall
                }
            }
        }
    }

    pub(crate) fn add_inst(&mut self, rid: ResourceId, _dinst: &DInst) {
        let res = &mut self.resources[rid];
        match &mut res.kind {
            FuKind::Load { outstanding, .. }
            | FuKind::Store { outstanding, .. }
            | FuKind::Branch { outstanding, .. } => *outstanding += 1,
            FuKind::Generic | FuKind::Fence => {}
        }
        self.clusters[res.cluster].add_inst();
    }

    pub(crate) fn retire(&mut self, rid: ResourceId, dinst: &DInst, now: Cycle) -> RetireOutcome {
        assert!(!dinst.is_dead(), "retiring dead ROB entry {}", dinst.id());

        let res = &mut self.resources[rid];
        let outcome = match &mut res.kind {
            FuKind::Generic => RetireOutcome::Retired,
            FuKind::Branch { outstanding, .. } => {
                *outstanding -= 1;
                RetireOutcome::Retired
            }
            FuKind::Load { outstanding, .. } => match dinst.mem_ready_at() {
                Some(ready) if now >= ready => {
                    *outstanding -= 1;
                    RetireOutcome::Retired
                }
                _ => RetireOutcome::NotFinished,
            },
            FuKind::Store { outstanding, .. } => match self.cache.try_commit(now) {
                None => {
                    *outstanding -= 1;
                    RetireOutcome::Retired
                }
                Some(blocked) => blocked,
            },
            FuKind::Fence => {
                if self.cache.draining() {
                    RetireOutcome::WaitForFence
                } else {
                    RetireOutcome::Retired
                }
            }
        };

        if outcome == RetireOutcome::Retired {
            let cluster = self.resources[rid].cluster;
            self.clusters[cluster].remove_inst();
        }
        outcome
    }

    /// A dead placeholder leaving the ROB head: give back the window slot and
    /// the outstanding-op slot without any cache traffic.
    pub(crate) fn discard(&mut self, rid: ResourceId, dinst: &DInst) {
        debug_assert!(dinst.is_dead(), "discarding live instruction {}", dinst.id());

        let res = &mut self.resources[rid];
        match &mut res.kind {
            FuKind::Load { outstanding, .. }
            | FuKind::Store { outstanding, .. }
            | FuKind::Branch { outstanding, .. } => *outstanding -= 1,
            FuKind::Generic | FuKind::Fence => {}
        }
        self.clusters[res.cluster].remove_inst();
    }

    pub(crate) fn new_cycle(&mut self, now: Cycle) {
        for cluster in &mut self.clusters {
            cluster.new_cycle();
        }
        self.cache.new_cycle(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::Instruction;

    fn dinst(id: u64, kind: InstKind) -> DInst {
        DInst::new(id, Instruction::new(kind))
    }

    fn manager(config: &CoreConfig) -> ClusterManager {
        ClusterManager::new(config)
    }

    #[test]
    fn test_window_exhaustion_masks_ports() {
        let config = CoreConfig { win_size: 2, cluster_ports: 1, ..CoreConfig::small() };
        let mut mgr = manager(&config);
        let rid = mgr.resolve(InstKind::IntAlu);

        assert_eq!(mgr.cluster_can_issue(rid), StallCause::NoStall);
        mgr.add_inst(rid, &dinst(1, InstKind::IntAlu));
        // ports exhausted first; window still has room
        assert_eq!(mgr.cluster_can_issue(rid), StallCause::PortConflictStall);

        mgr.new_cycle(1);
        mgr.add_inst(rid, &dinst(2, InstKind::IntAlu));
        mgr.new_cycle(2);
        // window full now masks the port check
        assert_eq!(mgr.cluster_can_issue(rid), StallCause::SmallWinStall);
    }

    #[test]
    fn test_outstanding_loads_bound() {
        let config = CoreConfig { outs_loads: 2, ..CoreConfig::small() };
        let mut mgr = manager(&config);
        let rid = mgr.resolve(InstKind::Load);

        for id in 1..=2 {
            let d = dinst(id, InstKind::Load);
            assert_eq!(mgr.resource_can_issue(rid, &d), StallCause::NoStall);
            mgr.add_inst(rid, &d);
        }
        assert_eq!(mgr.resource_can_issue(rid, &dinst(3, InstKind::Load)),
                   StallCause::OutsLoadsStall);
    }

    #[test]
    fn test_store_cache_ports_and_space() {
        let config = CoreConfig {
            cache_ports: 1,
            cache_space: 1,
            mem_latency: 10,
            ..CoreConfig::small()
        };
        let mut mgr = manager(&config);
        let rid = mgr.resolve(InstKind::Store);

        let mut first = dinst(1, InstKind::Store);
        first.mark_issued();
        first.mark_executed();
        mgr.add_inst(rid, &first);
        let mut second = dinst(2, InstKind::Store);
        second.mark_issued();
        second.mark_executed();
        mgr.add_inst(rid, &second);

        assert_eq!(mgr.retire(rid, &first, 1), RetireOutcome::Retired);
        // the single write-buffer entry is taken until cycle 11
        assert_eq!(mgr.retire(rid, &second, 1), RetireOutcome::NoCacheSpace);
        mgr.new_cycle(2);
        assert_eq!(mgr.retire(rid, &second, 2), RetireOutcome::NoCacheSpace);
        mgr.new_cycle(12);
        assert_eq!(mgr.retire(rid, &second, 12), RetireOutcome::Retired);
    }

    #[test]
    fn test_fence_waits_for_store_drain() {
        let config = CoreConfig { mem_latency: 3, ..CoreConfig::small() };
        let mut mgr = manager(&config);
        let store_rid = mgr.resolve(InstKind::Store);
        let fence_rid = mgr.resolve(InstKind::Fence);

        let mut store = dinst(1, InstKind::Store);
        store.mark_issued();
        store.mark_executed();
        mgr.add_inst(store_rid, &store);
        let mut fence = dinst(2, InstKind::Fence);
        fence.mark_issued();
        fence.mark_executed();
        mgr.add_inst(fence_rid, &fence);

        assert_eq!(mgr.retire(store_rid, &store, 1), RetireOutcome::Retired);
        assert_eq!(mgr.retire(fence_rid, &fence, 1), RetireOutcome::WaitForFence);
        mgr.new_cycle(4);
        assert_eq!(mgr.retire(fence_rid, &fence, 4), RetireOutcome::Retired);
    }

    #[test]
    fn test_every_kind_resolves() {
        let config = CoreConfig::small();
        let mgr = manager(&config);
        for kind in [InstKind::OpInvalid, InstKind::IntAlu, InstKind::IntMult,
                     InstKind::IntDiv, InstKind::BranchJump, InstKind::Load,
                     InstKind::Store, InstKind::FpAlu, InstKind::FpMult,
                     InstKind::FpDiv, InstKind::Fence, InstKind::Event] {
            let rid = mgr.resolve(kind);
            assert!(rid < mgr.resources.len());
        }
    }
}
