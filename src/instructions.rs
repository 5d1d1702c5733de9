use std::fmt;
use std::fs;

/// Simulated clock cycle count.
pub(crate) type Cycle = u64;

/// The coarse instruction classes the execution core schedules by. Each class
/// maps to one functional-unit resource and to a destination register class.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum InstKind {
    OpInvalid,
    IntAlu,
    IntMult,
    IntDiv,
    BranchJump,
    Load,
    Store,
    FpAlu,
    FpMult,
    FpDiv,
    Fence,
    Event,
}

pub(crate) const INST_KIND_COUNT: usize = 12;

pub(crate) fn mnemonic(kind: InstKind) -> &'static str {
    match kind {
        InstKind::OpInvalid => "invalid",
        InstKind::IntAlu => "alu",
        InstKind::IntMult => "mul",
        InstKind::IntDiv => "div",
        InstKind::BranchJump => "br",
        InstKind::Load => "ld",
        InstKind::Store => "st",
        InstKind::FpAlu => "falu",
        InstKind::FpMult => "fmul",
        InstKind::FpDiv => "fdiv",
        InstKind::Fence => "fence",
        InstKind::Event => "event",
    }
}

pub(crate) fn get_inst_kind(mnemonic: &str) -> Option<InstKind> {
    let lowered = mnemonic.to_lowercase();

    match lowered.as_str() {
        "alu" => Some(InstKind::IntAlu),
        "mul" => Some(InstKind::IntMult),
        "div" => Some(InstKind::IntDiv),
        "br" => Some(InstKind::BranchJump),
        "ld" => Some(InstKind::Load),
        "st" => Some(InstKind::Store),
        "falu" => Some(InstKind::FpAlu),
        "fmul" => Some(InstKind::FpMult),
        "fdiv" => Some(InstKind::FpDiv),
        "fence" => Some(InstKind::Fence),
        "event" => Some(InstKind::Event),
        _ => None,
    }
}

/// Register class of an instruction destination. `None` is the sentinel class
/// for instructions without a real destination (stores, branches, fences); its
/// pool is effectively unlimited so it can never be the renaming bottleneck.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum RegClass {
    Int = 0,
    Fp = 1,
    None = 2,
}

pub(crate) const REG_CLASS_COUNT: usize = 3;

/// A static instruction: only what the scheduler needs to know. Operand
/// values, addresses and results live in the emulation layer, not here.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Instruction {
    pub(crate) kind: InstKind,
    pub(crate) dst_class: RegClass,
    pub(crate) src1_class: RegClass,
    pub(crate) src2_class: RegClass,
    // execute latency in cycles, excluding memory
    pub(crate) latency: u8,
}

impl Instruction {
    pub(crate) fn new(kind: InstKind) -> Instruction {
        let (dst_class, src1_class, src2_class, latency) = match kind {
            InstKind::OpInvalid => (RegClass::None, RegClass::None, RegClass::None, 1),
            InstKind::IntAlu => (RegClass::Int, RegClass::Int, RegClass::Int, 1),
            InstKind::IntMult => (RegClass::Int, RegClass::Int, RegClass::Int, 4),
            InstKind::IntDiv => (RegClass::Int, RegClass::Int, RegClass::Int, 12),
            InstKind::BranchJump => (RegClass::None, RegClass::Int, RegClass::None, 1),
            InstKind::Load => (RegClass::Int, RegClass::Int, RegClass::None, 1),
            InstKind::Store => (RegClass::None, RegClass::Int, RegClass::Int, 1),
            InstKind::FpAlu => (RegClass::Fp, RegClass::Fp, RegClass::Fp, 2),
            InstKind::FpMult => (RegClass::Fp, RegClass::Fp, RegClass::Fp, 4),
            InstKind::FpDiv => (RegClass::Fp, RegClass::Fp, RegClass::Fp, 16),
            InstKind::Fence => (RegClass::None, RegClass::None, RegClass::None, 1),
            InstKind::Event => (RegClass::None, RegClass::None, RegClass::None, 1),
        };

        Instruction { kind, dst_class, src1_class, src2_class, latency }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", mnemonic(self.kind))
    }
}

/// A workload trace: the program-ordered sequence of static instructions the
/// frontend feeds into the core, one per dynamic instruction.
pub(crate) struct Program {
    pub(crate) code: Vec<Instruction>,
}

#[derive(Debug)]
pub(crate) enum LoadError {
    ParseError(String),
    NotFoundError(String),
}

pub(crate) fn load_program(path: &str) -> Result<Program, LoadError> {
    let src = match fs::read_to_string(path) {
        Ok(src) => src,
        Err(err) => {
            return Err(LoadError::NotFoundError(format!(
                "Failed to read '{}': {}", path, err)));
        }
    };

    parse_program(&src)
}

pub(crate) fn parse_program(src: &str) -> Result<Program, LoadError> {
    let mut code = Vec::new();

    for (line_no, line) in src.lines().enumerate() {
        let line = match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match get_inst_kind(line) {
            Some(kind) => code.push(Instruction::new(kind)),
            None => {
                return Err(LoadError::ParseError(format!(
                    "Unknown instruction '{}' at line {}", line, line_no + 1)));
            }
        }
    }

    Ok(Program { code })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_program() {
        let program = match parse_program("alu\nld # load\n\nst\n") {
            Ok(p) => p,
            Err(_) => panic!("parse failed"),
        };
        assert_eq!(program.code.len(), 3);
        assert_eq!(program.code[0].kind, InstKind::IntAlu);
        assert_eq!(program.code[1].kind, InstKind::Load);
        assert_eq!(program.code[2].kind, InstKind::Store);
    }

    #[test]
    fn test_parse_unknown_mnemonic() {
        assert!(matches!(parse_program("alu\nbogus\n"), Err(LoadError::ParseError(_))));
    }

    #[test]
    fn test_dst_class_per_kind() {
        assert_eq!(Instruction::new(InstKind::IntAlu).dst_class, RegClass::Int);
        assert_eq!(Instruction::new(InstKind::FpMult).dst_class, RegClass::Fp);
        assert_eq!(Instruction::new(InstKind::Store).dst_class, RegClass::None);
        assert_eq!(Instruction::new(InstKind::BranchJump).dst_class, RegClass::None);
    }
}
