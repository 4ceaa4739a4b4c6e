//! IR types
//!
//! Value, block, function and module representations, plus the structural
//! verifier that rejects malformed control-flow graphs.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use super::instr::{Instruction, InstrKind, Terminator};

/// A virtual register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VReg(pub u32);

impl fmt::Display for VReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// A basic block id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// IR value types. Boxed runtime values are opaque pointers; the only other
/// types that appear are the scalars of the runtime ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrType {
    /// No value
    Void,
    /// 1-bit boolean (comparison results)
    Bool,
    /// 32-bit signed integer (runtime comparison ABI)
    I32,
    /// 64-bit float (the numeric value kind)
    F64,
    /// Opaque pointer: value handles and C strings
    Ptr,
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Void => write!(f, "void"),
            IrType::Bool => write!(f, "i1"),
            IrType::I32 => write!(f, "i32"),
            IrType::F64 => write!(f, "f64"),
            IrType::Ptr => write!(f, "ptr"),
        }
    }
}

/// A constant value
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i64),
    Float(f64),
    Str(String),
    Null,
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{}", v),
            Constant::Float(v) => write!(f, "{}", v),
            Constant::Str(s) => write!(f, "{:?}", s),
            Constant::Null => write!(f, "null"),
        }
    }
}

/// A module contains functions and global definitions
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub name: String,
    pub functions: Vec<Function>,
    pub globals: Vec<Global>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
            globals: Vec::new(),
        }
    }

    pub fn get_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Structurally verify the module. Every block of every defined function
    /// must end in exactly one terminator, every branch target must name a
    /// block of the same function, every call must name a declared function
    /// and every global reference a declared global.
    pub fn verify(&self) -> Result<(), Vec<VerifyError>> {
        let mut errors = Vec::new();

        let declared: HashSet<&str> = self.functions.iter().map(|f| f.name.as_str()).collect();
        let globals: HashSet<&str> = self.globals.iter().map(|g| g.name.as_str()).collect();

        for func in &self.functions {
            if func.is_external {
                continue;
            }

            if func.blocks.is_empty() {
                errors.push(VerifyError::EmptyFunction {
                    function: func.name.clone(),
                });
                continue;
            }

            let block_ids: HashSet<BlockId> = func.blocks.iter().map(|b| b.id).collect();

            for block in &func.blocks {
                for instr in &block.instructions {
                    match &instr.kind {
                        InstrKind::Call { func: callee, .. } => {
                            if !declared.contains(callee.as_str()) {
                                errors.push(VerifyError::UndeclaredFunction {
                                    function: func.name.clone(),
                                    callee: callee.clone(),
                                });
                            }
                        }
                        InstrKind::GlobalRef(name) => {
                            if !globals.contains(name.as_str()) {
                                errors.push(VerifyError::UndeclaredGlobal {
                                    function: func.name.clone(),
                                    global: name.clone(),
                                });
                            }
                        }
                        _ => {}
                    }
                }

                match &block.terminator {
                    None => errors.push(VerifyError::MissingTerminator {
                        function: func.name.clone(),
                        block: block.id,
                    }),
                    Some(term) => {
                        for target in term.targets() {
                            if !block_ids.contains(&target) {
                                errors.push(VerifyError::UnknownBlock {
                                    function: func.name.clone(),
                                    block: block.id,
                                    target,
                                });
                            }
                        }
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// A structural defect found by [`Module::verify`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerifyError {
    #[error("function '{function}' has no blocks")]
    EmptyFunction { function: String },

    #[error("block {block} in function '{function}' has no terminator")]
    MissingTerminator { function: String, block: BlockId },

    #[error("block {block} in function '{function}' branches to unknown block {target}")]
    UnknownBlock {
        function: String,
        block: BlockId,
        target: BlockId,
    },

    #[error("function '{function}' calls undeclared function '{callee}'")]
    UndeclaredFunction { function: String, callee: String },

    #[error("function '{function}' references undeclared global '{global}'")]
    UndeclaredGlobal { function: String, global: String },
}

/// A function in the IR. External functions carry a signature only.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub params: Vec<IrType>,
    pub ret_type: IrType,
    pub blocks: Vec<BasicBlock>,
    pub is_external: bool,
}

impl Function {
    pub fn new(name: impl Into<String>, params: Vec<IrType>, ret_type: IrType) -> Self {
        Self {
            name: name.into(),
            params,
            ret_type,
            blocks: Vec::new(),
            is_external: false,
        }
    }
}

/// A basic block: a straight-line instruction sequence ending in exactly one
/// terminator
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    /// Human-readable name for the printed form ("entry", "while_cond", ...)
    pub label: Option<String>,
    pub instructions: Vec<Instruction>,
    pub terminator: Option<Terminator>,
}

impl BasicBlock {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            label: None,
            instructions: Vec::new(),
            terminator: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A global variable or constant
#[derive(Debug, Clone)]
pub struct Global {
    pub name: String,
    pub ty: IrType,
    pub init: Constant,
    pub is_const: bool,
}
