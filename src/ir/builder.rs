//! IR builder
//!
//! Helper for constructing functions, basic blocks and instructions. The
//! builder owns the module while it grows; [`IrBuilder::finish`] hands the
//! completed module back.

use std::collections::HashMap;

use super::instr::{CmpOp, InstrKind, Instruction, Terminator};
use super::types::{BasicBlock, BlockId, Constant, Function, Global, IrType, Module, VReg};

/// Builder for constructing IR
pub struct IrBuilder {
    /// Next virtual register id
    next_vreg: u32,
    /// Next block id
    next_block: u32,
    /// Next string constant id
    next_string: u32,
    /// Display names for blocks created but not yet started
    block_labels: HashMap<BlockId, String>,
    module: Module,
    current_fn: Option<Function>,
    current_block: Option<BasicBlock>,
}

impl IrBuilder {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            next_vreg: 0,
            next_block: 0,
            next_string: 0,
            block_labels: HashMap::new(),
            module: Module::new(module_name),
            current_fn: None,
            current_block: None,
        }
    }

    /// Finish building and return the module
    pub fn finish(mut self) -> Module {
        self.finish_function();
        self.module
    }

    fn fresh_vreg(&mut self) -> VReg {
        let vreg = VReg(self.next_vreg);
        self.next_vreg += 1;
        vreg
    }

    // ============ Function building ============

    /// Start a new function with an `entry` block; any function in progress
    /// is finished first
    pub fn start_function(&mut self, name: impl Into<String>, params: Vec<IrType>, ret_type: IrType) {
        self.finish_function();
        self.current_fn = Some(Function::new(name, params, ret_type));

        let entry = self.create_block("entry");
        self.current_block = Some(self.new_block(entry));
    }

    /// Finish the current function (if any) and push it into the module
    pub fn finish_function(&mut self) {
        if let Some(block) = self.current_block.take() {
            if let Some(func) = self.current_fn.as_mut() {
                func.blocks.push(block);
            }
        }
        if let Some(func) = self.current_fn.take() {
            self.module.functions.push(func);
        }
    }

    /// Declare an external function. Re-declaring the same symbol is a no-op.
    pub fn declare_external(&mut self, name: &str, params: Vec<IrType>, ret_type: IrType) {
        if self.has_function(name) {
            return;
        }
        let mut func = Function::new(name, params, ret_type);
        func.is_external = true;
        self.module.functions.push(func);
    }

    /// Whether a function with this name exists (declared, defined, or in
    /// progress)
    pub fn has_function(&self, name: &str) -> bool {
        self.module.functions.iter().any(|f| f.name == name)
            || self.current_fn.as_ref().is_some_and(|f| f.name == name)
    }

    // ============ Globals ============

    /// Add a global variable slot
    pub fn add_global(&mut self, name: &str, ty: IrType, init: Constant, is_const: bool) {
        self.module.globals.push(Global {
            name: name.to_string(),
            ty,
            init,
            is_const,
        });
    }

    /// Intern a string constant and return its global name
    pub fn add_string_constant(&mut self, value: &str) -> String {
        let name = format!(".str.{}", self.next_string);
        self.next_string += 1;
        self.add_global(&name, IrType::Ptr, Constant::Str(value.to_string()), true);
        name
    }

    // ============ Block building ============

    /// Create a new block id with a display name; the block is materialized
    /// when it is started
    pub fn create_block(&mut self, label: &str) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        self.block_labels.insert(id, label.to_string());
        id
    }

    fn new_block(&mut self, id: BlockId) -> BasicBlock {
        match self.block_labels.get(&id) {
            Some(label) => BasicBlock::new(id).with_label(label.clone()),
            None => BasicBlock::new(id),
        }
    }

    /// Switch the insertion point to `id`, finishing the block in progress
    pub fn start_block(&mut self, id: BlockId) {
        if let Some(block) = self.current_block.take() {
            if let Some(func) = self.current_fn.as_mut() {
                func.blocks.push(block);
            }
        }
        self.current_block = Some(self.new_block(id));
    }

    /// Whether the block in progress already ends in a terminator
    pub fn has_terminator(&self) -> bool {
        self.current_block
            .as_ref()
            .is_some_and(|b| b.terminator.is_some())
    }

    // ============ Instruction emission ============

    fn emit(&mut self, result: Option<VReg>, kind: InstrKind) {
        if let Some(block) = self.current_block.as_mut() {
            block.instructions.push(Instruction::new(result, kind));
        }
    }

    fn emit_with_result(&mut self, kind: InstrKind) -> VReg {
        let result = self.fresh_vreg();
        self.emit(Some(result), kind);
        result
    }

    pub fn const_int(&mut self, value: i64) -> VReg {
        self.emit_with_result(InstrKind::Const(Constant::Int(value)))
    }

    pub fn const_float(&mut self, value: f64) -> VReg {
        self.emit_with_result(InstrKind::Const(Constant::Float(value)))
    }

    pub fn fadd(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::FAdd(a, b))
    }

    pub fn fsub(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::FSub(a, b))
    }

    pub fn fcmp(&mut self, op: CmpOp, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::FCmp(op, a, b))
    }

    pub fn and(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::And(a, b))
    }

    pub fn or(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit_with_result(InstrKind::Or(a, b))
    }

    pub fn sitofp(&mut self, v: VReg, ty: IrType) -> VReg {
        self.emit_with_result(InstrKind::SIToFP(v, ty))
    }

    pub fn uitofp(&mut self, v: VReg, ty: IrType) -> VReg {
        self.emit_with_result(InstrKind::UIToFP(v, ty))
    }

    pub fn load(&mut self, ptr: VReg) -> VReg {
        self.emit_with_result(InstrKind::Load(ptr))
    }

    pub fn store(&mut self, ptr: VReg, value: VReg) {
        self.emit(None, InstrKind::Store(ptr, value));
    }

    pub fn global_ref(&mut self, name: &str) -> VReg {
        self.emit_with_result(InstrKind::GlobalRef(name.to_string()))
    }

    pub fn call(&mut self, func: impl Into<String>, args: Vec<VReg>) -> VReg {
        self.emit_with_result(InstrKind::Call {
            func: func.into(),
            args,
        })
    }

    pub fn call_void(&mut self, func: impl Into<String>, args: Vec<VReg>) {
        self.emit(
            None,
            InstrKind::Call {
                func: func.into(),
                args,
            },
        );
    }

    // ============ Terminators ============

    pub fn ret(&mut self, value: Option<VReg>) {
        if let Some(block) = self.current_block.as_mut() {
            block.terminator = Some(Terminator::Ret(value));
        }
    }

    pub fn br(&mut self, target: BlockId) {
        if let Some(block) = self.current_block.as_mut() {
            block.terminator = Some(Terminator::Br(target));
        }
    }

    pub fn cond_br(&mut self, cond: VReg, then_block: BlockId, else_block: BlockId) {
        if let Some(block) = self.current_block.as_mut() {
            block.terminator = Some(Terminator::CondBr {
                cond,
                then_block,
                else_block,
            });
        }
    }
}
