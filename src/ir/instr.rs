//! IR instructions
//!
//! Instruction and terminator definitions. Everything a compiled program
//! computes flows through opaque value handles, so the instruction set is
//! dominated by runtime calls plus the scalar glue around them (float
//! arithmetic for loop counters, comparisons for truthiness tests).

use std::fmt;

use super::types::{BlockId, Constant, IrType, VReg};

/// An instruction in the IR
#[derive(Debug, Clone)]
pub struct Instruction {
    /// Result register (None for void instructions)
    pub result: Option<VReg>,
    pub kind: InstrKind,
}

impl Instruction {
    pub fn new(result: Option<VReg>, kind: InstrKind) -> Self {
        Self { result, kind }
    }
}

/// Kinds of instructions
#[derive(Debug, Clone)]
pub enum InstrKind {
    /// Materialize a constant
    Const(Constant),

    /// Float addition
    FAdd(VReg, VReg),
    /// Float subtraction
    FSub(VReg, VReg),
    /// Float comparison (ordered)
    FCmp(CmpOp, VReg, VReg),

    /// Bitwise AND on booleans
    And(VReg, VReg),
    /// Bitwise OR on booleans
    Or(VReg, VReg),

    /// Signed int to float
    SIToFP(VReg, IrType),
    /// Unsigned int (or bool) to float
    UIToFP(VReg, IrType),

    /// Load from a pointer
    Load(VReg),
    /// Store to a pointer (ptr, value)
    Store(VReg, VReg),
    /// Address of a global (returns pointer)
    GlobalRef(String),

    /// Call a declared function
    Call { func: String, args: Vec<VReg> },
}

/// Float comparison operators (LLVM-style ordered predicates)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// Equal
    Oeq,
    /// Not equal
    One,
    /// Less than
    Olt,
    /// Less than or equal
    Ole,
    /// Greater than
    Ogt,
    /// Greater than or equal
    Oge,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CmpOp::Oeq => write!(f, "oeq"),
            CmpOp::One => write!(f, "one"),
            CmpOp::Olt => write!(f, "olt"),
            CmpOp::Ole => write!(f, "ole"),
            CmpOp::Ogt => write!(f, "ogt"),
            CmpOp::Oge => write!(f, "oge"),
        }
    }
}

/// Block terminators
#[derive(Debug, Clone)]
pub enum Terminator {
    /// Return from function
    Ret(Option<VReg>),
    /// Unconditional branch
    Br(BlockId),
    /// Conditional branch
    CondBr {
        cond: VReg,
        then_block: BlockId,
        else_block: BlockId,
    },
}

impl Terminator {
    /// Blocks this terminator can transfer control to
    pub fn targets(&self) -> Vec<BlockId> {
        match self {
            Terminator::Ret(_) => vec![],
            Terminator::Br(target) => vec![*target],
            Terminator::CondBr {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(result) = self.result {
            write!(f, "{} = ", result)?;
        }
        match &self.kind {
            InstrKind::Const(c) => write!(f, "const {}", c),
            InstrKind::FAdd(a, b) => write!(f, "fadd {}, {}", a, b),
            InstrKind::FSub(a, b) => write!(f, "fsub {}, {}", a, b),
            InstrKind::FCmp(op, a, b) => write!(f, "fcmp {} {}, {}", op, a, b),
            InstrKind::And(a, b) => write!(f, "and {}, {}", a, b),
            InstrKind::Or(a, b) => write!(f, "or {}, {}", a, b),
            InstrKind::SIToFP(v, ty) => write!(f, "sitofp {} to {}", v, ty),
            InstrKind::UIToFP(v, ty) => write!(f, "uitofp {} to {}", v, ty),
            InstrKind::Load(ptr) => write!(f, "load {}", ptr),
            InstrKind::Store(ptr, val) => write!(f, "store {}, {}", ptr, val),
            InstrKind::GlobalRef(name) => write!(f, "globalref @{}", name),
            InstrKind::Call { func, args } => {
                write!(f, "call {}(", func)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Ret(None) => write!(f, "ret void"),
            Terminator::Ret(Some(v)) => write!(f, "ret {}", v),
            Terminator::Br(block) => write!(f, "br {}", block),
            Terminator::CondBr {
                cond,
                then_block,
                else_block,
            } => write!(f, "br {}, {}, {}", cond, then_block, else_block),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_display() {
        let instr = Instruction::new(
            Some(VReg(3)),
            InstrKind::Call {
                func: "value_add".to_string(),
                args: vec![VReg(1), VReg(2)],
            },
        );
        assert_eq!(instr.to_string(), "%3 = call value_add(%1, %2)");
    }

    #[test]
    fn test_void_call_display() {
        let instr = Instruction::new(
            None,
            InstrKind::Call {
                func: "runtime_init".to_string(),
                args: vec![],
            },
        );
        assert_eq!(instr.to_string(), "call runtime_init()");
    }

    #[test]
    fn test_terminator_display() {
        assert_eq!(Terminator::Ret(None).to_string(), "ret void");
        assert_eq!(Terminator::Br(BlockId(4)).to_string(), "br bb4");
        let cond = Terminator::CondBr {
            cond: VReg(1),
            then_block: BlockId(2),
            else_block: BlockId(3),
        };
        assert_eq!(cond.to_string(), "br %1, bb2, bb3");
    }

    #[test]
    fn test_terminator_targets() {
        assert!(Terminator::Ret(Some(VReg(0))).targets().is_empty());
        assert_eq!(Terminator::Br(BlockId(1)).targets(), vec![BlockId(1)]);
    }
}
