use log::info;

use crate::instructions::{mnemonic, InstKind, Instruction, RegClass, Cycle,
                          INST_KIND_COUNT, REG_CLASS_COUNT};

/// Why an admission attempt did not dispatch. Exactly one cause is produced
/// per attempt; earlier checks in the dispatch sequence mask later ones.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum StallCause {
    NoStall = 0,
    SmallWinStall,
    SmallRobStall,
    SmallRegStall,
    OutsLoadsStall,
    OutsStoresStall,
    OutsBranchesStall,
    ReplayStall,
    PortConflictStall,
    SwitchStall,
}

pub(crate) const STALL_CAUSE_COUNT: usize = 10;

/// Why a retire attempt did not commit (or `Retired` when it did).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum RetireOutcome {
    Retired = 0,
    NotExecuted,
    NotFinished,
    NoCacheSpace,
    NoCachePorts,
    WaitForFence,
}

pub(crate) const RETIRE_OUTCOME_COUNT: usize = 6;

/// Whether the blocked instruction was the oldest one this retire cycle
/// looked at, or a younger one behind instructions that did commit.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum RetireBlame {
    Oldest = 0,
    Younger,
}

const RETIRE_BLAME_COUNT: usize = 2;

/// All per-core accounting. Owned by one `Core`, created at core
/// construction, never reset, dropped with the core. Pure observer: nothing
/// here feeds back into scheduling.
pub(crate) struct CoreStats {
    // unused issue slots per stall cause; index 0 (NoStall) stays zero
    n_stall: [u64; STALL_CAUSE_COUNT],
    // non-retire events keyed by (blame, instruction kind, outcome)
    not_retired: [[[u64; RETIRE_OUTCOME_COUNT]; INST_KIND_COUNT]; RETIRE_BLAME_COUNT],
    // dispatched instructions per kind (pending window), real and wrong-path
    n_inst: [u64; INST_KIND_COUNT],
    n_inst_fake: [u64; INST_KIND_COUNT],
    // instructions swallowed because their context was killed
    pub(crate) n_killed: u64,
    // ROB occupancy sampled once per retire call
    rob_used_sum: u64,
    rob_used_samples: u64,
    // instructions retired, sampled per accounted retire cycle
    retired_sum: u64,
    retired_samples: u64,
    // energy proxies
    pub(crate) rename_energy: u64,
    pub(crate) rob_energy: u64,
    rd_reg_energy: [u64; REG_CLASS_COUNT],
    wr_reg_energy: [u64; REG_CLASS_COUNT],
}

impl CoreStats {
    pub(crate) fn new() -> CoreStats {
        CoreStats {
            n_stall: [0; STALL_CAUSE_COUNT],
            not_retired: [[[0; RETIRE_OUTCOME_COUNT]; INST_KIND_COUNT]; RETIRE_BLAME_COUNT],
            n_inst: [0; INST_KIND_COUNT],
            n_inst_fake: [0; INST_KIND_COUNT],
            n_killed: 0,
            rob_used_sum: 0,
            rob_used_samples: 0,
            retired_sum: 0,
            retired_samples: 0,
            rename_energy: 0,
            rob_energy: 0,
            rd_reg_energy: [0; REG_CLASS_COUNT],
            wr_reg_energy: [0; REG_CLASS_COUNT],
        }
    }

    pub(crate) fn add_stall(&mut self, cause: StallCause, slots: u64) {
        debug_assert!(cause != StallCause::NoStall, "NoStall is not chargeable");
        self.n_stall[cause as usize] += slots;
    }

    pub(crate) fn stall_count(&self, cause: StallCause) -> u64 {
        self.n_stall[cause as usize]
    }

    /// One blocked retire attempt. `n_retired` is how many instructions
    /// already committed this cycle; zero means the oldest one is to blame.
    pub(crate) fn add_no_retire(&mut self, n_retired: usize, kind: InstKind,
                                outcome: RetireOutcome) {
        debug_assert!(outcome != RetireOutcome::Retired);

        let blame = if n_retired == 0 { RetireBlame::Oldest } else { RetireBlame::Younger };
        self.not_retired[blame as usize][kind as usize][outcome as usize] += 1;
    }

    pub(crate) fn no_retire_count(&self, blame: RetireBlame, kind: InstKind,
                                  outcome: RetireOutcome) -> u64 {
        self.not_retired[blame as usize][kind as usize][outcome as usize]
    }

    pub(crate) fn account_dispatch(&mut self, instr: &Instruction, fake: bool) {
        if fake {
            self.n_inst_fake[instr.kind as usize] += 1;
        } else {
            self.n_inst[instr.kind as usize] += 1;
        }

        self.rename_energy += 1;
        self.rob_energy += 1;

        // the sentinel class has no physical register file behind it
        for class in [instr.src1_class, instr.src2_class] {
            if class != RegClass::None {
                self.rd_reg_energy[class as usize] += 1;
            }
        }
        if instr.dst_class != RegClass::None {
            self.wr_reg_energy[instr.dst_class as usize] += 1;
        }
    }

    pub(crate) fn inst_count(&self, kind: InstKind) -> u64 {
        self.n_inst[kind as usize]
    }

    pub(crate) fn fake_inst_count(&self, kind: InstKind) -> u64 {
        self.n_inst_fake[kind as usize]
    }

    pub(crate) fn sample_rob(&mut self, occupancy: usize) {
        self.rob_used_sum += occupancy as u64;
        self.rob_used_samples += 1;
    }

    pub(crate) fn add_retire_sample(&mut self, retired: usize) {
        self.retired_sum += retired as u64;
        self.retired_samples += 1;
    }

    pub(crate) fn total_retired(&self) -> u64 {
        self.retired_sum
    }

    pub(crate) fn report(&self, id: usize, clock_ticks: Cycle) {
        info!("Proc({}):clockTicks={}", id, clock_ticks);

        info!("ExeEngine({}):nSmallWin={}", id, self.n_stall[StallCause::SmallWinStall as usize]);
        info!("ExeEngine({}):nSmallROB={}", id, self.n_stall[StallCause::SmallRobStall as usize]);
        info!("ExeEngine({}):nSmallREG={}", id, self.n_stall[StallCause::SmallRegStall as usize]);
        info!("ExeEngine({}):nOutsLoads={}", id, self.n_stall[StallCause::OutsLoadsStall as usize]);
        info!("ExeEngine({}):nOutsStores={}", id, self.n_stall[StallCause::OutsStoresStall as usize]);
        info!("ExeEngine({}):nOutsBranches={}", id, self.n_stall[StallCause::OutsBranchesStall as usize]);
        info!("ExeEngine({}):nReplays={}", id, self.n_stall[StallCause::ReplayStall as usize]);
        info!("ExeEngine({}):PortConflict={}", id, self.n_stall[StallCause::PortConflictStall as usize]);
        info!("ExeEngine({}):switch={}", id, self.n_stall[StallCause::SwitchStall as usize]);

        if self.rob_used_samples > 0 {
            info!("Proc({})_robUsed:avg={:.2}", id,
                  self.rob_used_sum as f64 / self.rob_used_samples as f64);
        }
        if self.retired_samples > 0 {
            info!("ExeEngine({})_retired:n={} avg={:.2}", id, self.retired_sum,
                  self.retired_sum as f64 / self.retired_samples as f64);
        }

        for kind in 0..INST_KIND_COUNT {
            if self.n_inst[kind] > 0 {
                info!("PendingWindow({})_{}:n={}", id,
                      mnemonic(kind_from_index(kind)), self.n_inst[kind]);
            }
            if self.n_inst_fake[kind] > 0 {
                info!("FakePendingWindow({})_{}:n={}", id,
                      mnemonic(kind_from_index(kind)), self.n_inst_fake[kind]);
            }
        }

        if self.n_killed > 0 {
            info!("Proc({}):nKilled={}", id, self.n_killed);
        }

        info!("Proc({}):renameEnergy={}", id, self.rename_energy);
        info!("Proc({}):ROBEnergy={}", id, self.rob_energy);
        info!("Proc({}):rdIRegEnergy={}", id, self.rd_reg_energy[RegClass::Int as usize]);
        info!("Proc({}):rdFPRegEnergy={}", id, self.rd_reg_energy[RegClass::Fp as usize]);
        info!("Proc({}):wrIRegEnergy={}", id, self.wr_reg_energy[RegClass::Int as usize]);
        info!("Proc({}):wrFPRegEnergy={}", id, self.wr_reg_energy[RegClass::Fp as usize]);
    }
}

fn kind_from_index(index: usize) -> InstKind {
    match index {
        0 => InstKind::OpInvalid,
        1 => InstKind::IntAlu,
        2 => InstKind::IntMult,
        3 => InstKind::IntDiv,
        4 => InstKind::BranchJump,
        5 => InstKind::Load,
        6 => InstKind::Store,
        7 => InstKind::FpAlu,
        8 => InstKind::FpMult,
        9 => InstKind::FpDiv,
        10 => InstKind::Fence,
        11 => InstKind::Event,
        _ => panic!("no instruction kind with index {}", index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stall_charges_accumulate() {
        let mut stats = CoreStats::new();
        stats.add_stall(StallCause::SmallRobStall, 3);
        stats.add_stall(StallCause::SmallRobStall, 1);
        assert_eq!(stats.stall_count(StallCause::SmallRobStall), 4);
        assert_eq!(stats.stall_count(StallCause::SmallRegStall), 0);
    }

    #[test]
    fn test_no_retire_blame_split() {
        let mut stats = CoreStats::new();
        stats.add_no_retire(0, InstKind::Load, RetireOutcome::NotFinished);
        stats.add_no_retire(2, InstKind::Load, RetireOutcome::NotFinished);

        assert_eq!(stats.no_retire_count(RetireBlame::Oldest, InstKind::Load,
                                         RetireOutcome::NotFinished), 1);
        assert_eq!(stats.no_retire_count(RetireBlame::Younger, InstKind::Load,
                                         RetireOutcome::NotFinished), 1);
    }

    #[test]
    fn test_dispatch_accounting_skips_sentinel_class() {
        let mut stats = CoreStats::new();
        stats.account_dispatch(&Instruction::new(InstKind::BranchJump), false);

        assert_eq!(stats.inst_count(InstKind::BranchJump), 1);
        // branch reads one int source, writes nothing
        assert_eq!(stats.rd_reg_energy[RegClass::Int as usize], 1);
        assert_eq!(stats.wr_reg_energy[RegClass::Int as usize], 0);
    }

    #[test]
    fn test_fake_dispatch_counts_separately() {
        let mut stats = CoreStats::new();
        stats.account_dispatch(&Instruction::new(InstKind::IntAlu), true);
        assert_eq!(stats.inst_count(InstKind::IntAlu), 0);
        assert_eq!(stats.fake_inst_count(InstKind::IntAlu), 1);
    }
}
