use std::fmt;

use crate::engine::cluster::ResourceId;
use crate::instructions::{Cycle, InstKind, Instruction, RegClass};

/// Transaction classification carried by a dynamic instruction when a
/// transactional-memory coherence observer is attached. Forwarded once, after
/// the instruction commits; the observer can never veto retirement.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum TransKind {
    Begin,
    Commit,
    Abort,
    Load,
    Store,
    Other,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct TransTags {
    pub(crate) kind: TransKind,
    pub(crate) pid: i32,
    pub(crate) tid: i32,
}

/// A dynamic instruction: one per-dispatch incarnation of a static
/// instruction. Created by the frontend, owned by the ROB while resident and
/// by the replay queue when cloned for re-issue; dropped on retire or on a
/// silent kill.
///
/// A live dynamic instruction is in at most one of {ROB, replay queue}. A ROB
/// entry marked dead is only a placeholder for a clone that went to the
/// replay queue; the placeholder is discarded at the ROB head, never retired.
#[derive(Clone, Debug)]
pub(crate) struct DInst {
    id: u64,
    instr: Instruction,
    issued: bool,
    executed: bool,
    fake: bool,
    dead: bool,
    ctx_killed: bool,
    resource: Option<ResourceId>,
    exec_done_at: Option<Cycle>,
    // loads only: cycle the memory reply arrives, set when execution finishes
    mem_ready_at: Option<Cycle>,
    trans: Option<TransTags>,
}

impl DInst {
    pub(crate) fn new(id: u64, instr: Instruction) -> DInst {
        DInst {
            id,
            instr,
            issued: false,
            executed: false,
            fake: false,
            dead: false,
            ctx_killed: false,
            resource: None,
            exec_done_at: None,
            mem_ready_at: None,
            trans: None,
        }
    }

    /// A speculative instruction from a path known to be wrong. It flows
    /// through the pipeline like any other but is tracked against the shadow
    /// register pool and never releases real registers.
    pub(crate) fn new_fake(id: u64, instr: Instruction) -> DInst {
        let mut dinst = DInst::new(id, instr);
        dinst.fake = true;
        dinst
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn instr(&self) -> &Instruction {
        &self.instr
    }

    pub(crate) fn kind(&self) -> InstKind {
        self.instr.kind
    }

    pub(crate) fn dst_class(&self) -> RegClass {
        self.instr.dst_class
    }

    pub(crate) fn mark_issued(&mut self) {
        debug_assert!(!self.issued, "DInst {} issued twice", self.id);
        self.issued = true;
    }

    pub(crate) fn is_executed(&self) -> bool {
        self.executed
    }

    pub(crate) fn mark_executed(&mut self) {
        debug_assert!(self.issued, "DInst {} executed before issue", self.id);
        self.executed = true;
    }

    pub(crate) fn is_fake(&self) -> bool {
        self.fake
    }

    pub(crate) fn is_dead(&self) -> bool {
        self.dead
    }

    pub(crate) fn set_dead(&mut self) {
        self.dead = true;
    }

    pub(crate) fn is_ctx_killed(&self) -> bool {
        self.ctx_killed
    }

    pub(crate) fn set_ctx_killed(&mut self) {
        self.ctx_killed = true;
    }

    pub(crate) fn resource(&self) -> Option<ResourceId> {
        self.resource
    }

    pub(crate) fn set_resource(&mut self, resource: ResourceId) {
        self.resource = Some(resource);
    }

    pub(crate) fn exec_done_at(&self) -> Option<Cycle> {
        self.exec_done_at
    }

    pub(crate) fn set_exec_done_at(&mut self, cycle: Cycle) {
        self.exec_done_at = Some(cycle);
    }

    pub(crate) fn mem_ready_at(&self) -> Option<Cycle> {
        self.mem_ready_at
    }

    pub(crate) fn set_mem_ready_at(&mut self, cycle: Cycle) {
        self.mem_ready_at = Some(cycle);
    }

    pub(crate) fn trans(&self) -> Option<TransTags> {
        self.trans
    }

    pub(crate) fn set_trans(&mut self, tags: TransTags) {
        self.trans = Some(tags);
    }

    /// An independent copy for the replay queue. The clone restarts from the
    /// pre-dispatch state; the original becomes a dead placeholder in the ROB.
    pub(crate) fn clone_for_replay(&self) -> DInst {
        DInst {
            id: self.id,
            instr: self.instr,
            issued: false,
            executed: false,
            fake: self.fake,
            dead: false,
            ctx_killed: false,
            resource: None,
            exec_done_at: None,
            mem_ready_at: None,
            trans: self.trans,
        }
    }
}

impl fmt::Display for DInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.instr, self.id)?;
        if self.fake {
            write!(f, " (fake)")?;
        }
        if self.dead {
            write!(f, " (dead)")?;
        }
        Ok(())
    }
}
