//! AST to IR lowering
//!
//! Walks the validated AST and lowers it to an IR [`Module`]: global slots
//! for variables, one internal function per subroutine, one `main` entry
//! function for the top-level code, and calls into the fixed runtime ABI for
//! every value operation.
//!
//! Two-pass structure: pass 1 pre-creates a block for every top-level label
//! and emits every subroutine as its own function, so forward gotos and
//! calls resolve without a second module walk; pass 2 lowers the remaining
//! top-level statements into `main`.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::Path;

use crate::ast::{BinaryOp, Expression, ExpressionKind, Program, Statement, StatementKind};
use crate::diagnostics::Diagnostics;
use crate::registry::{FunctionInfo, Registry, ReturnType};
use crate::span::SourceLocation;

use super::builder::IrBuilder;
use super::instr::CmpOp;
use super::types::{BlockId, Constant, IrType, Module, VReg};

/// Lowers a program to an IR module
pub struct CodeGenerator {
    builder: IrBuilder,
    registry: Registry,
    /// Variable slots already created (exact source spelling)
    variables: HashSet<String>,
    /// Label name -> pre-created block
    labels: HashMap<String, BlockId>,
    /// Subroutine name (exact source spelling) -> function symbol
    subroutines: HashMap<String, String>,
    /// Lowercased "object.method" -> declared symbol
    std_functions: HashMap<String, String>,
    module: Option<Module>,
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGenerator {
    pub fn new() -> Self {
        Self {
            builder: IrBuilder::new(""),
            registry: Registry::new(),
            variables: HashSet::new(),
            labels: HashMap::new(),
            subroutines: HashMap::new(),
            std_functions: HashMap::new(),
            module: None,
        }
    }

    /// Lower `program` into a verified module. Returns false (with an Error
    /// diagnostic) when structural verification rejects the result, or when
    /// the sink already holds errors — code generation never runs on a
    /// program that failed an earlier stage.
    pub fn generate(
        &mut self,
        program: &Program,
        module_name: &str,
        diagnostics: &mut Diagnostics,
    ) -> bool {
        if diagnostics.has_errors() {
            return false;
        }

        self.builder = IrBuilder::new(module_name);
        self.variables.clear();
        self.labels.clear();
        self.subroutines.clear();
        self.std_functions.clear();
        self.module = None;

        self.declare_runtime_functions();

        // Pass 1: pre-create label blocks and emit subroutine functions so
        // forward references resolve
        for stmt in &program.statements {
            match &stmt.kind {
                StatementKind::Label { name } => {
                    let block = self.builder.create_block(&format!("label_{}", name));
                    self.labels.insert(name.clone(), block);
                }
                StatementKind::Subroutine { name, body } => {
                    self.generate_subroutine(name, body);
                }
                _ => {}
            }
        }

        // Pass 2: the entry function
        self.builder.start_function("main", vec![], IrType::I32);
        self.builder.call_void("runtime_init", vec![]);

        for stmt in &program.statements {
            if !matches!(stmt.kind, StatementKind::Subroutine { .. }) {
                self.generate_statement(stmt);
            }
        }

        self.builder.call_void("runtime_cleanup", vec![]);
        let zero = self.builder.const_int(0);
        self.builder.ret(Some(zero));

        let builder = std::mem::replace(&mut self.builder, IrBuilder::new(""));
        let module = builder.finish();

        match module.verify() {
            Ok(()) => {
                self.module = Some(module);
                true
            }
            Err(errors) => {
                let text = errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                diagnostics.add_error(
                    "IR module verification failed",
                    SourceLocation::new(1, 1, 0),
                    text,
                );
                false
            }
        }
    }

    /// The generated module, if [`generate`](Self::generate) succeeded
    pub fn module(&self) -> Option<&Module> {
        self.module.as_ref()
    }

    /// Serialize the generated module to `path`
    pub fn emit(&self, path: &Path) -> io::Result<()> {
        let module = self
            .module
            .as_ref()
            .ok_or_else(|| io::Error::other("no module has been generated"))?;
        fs::write(path, print_module(module))
    }

    // ============ Runtime ABI ============

    fn declare_runtime_functions(&mut self) {
        use IrType::*;

        self.builder.declare_external("runtime_init", vec![], Void);
        self.builder.declare_external("runtime_cleanup", vec![], Void);

        self.builder.declare_external("value_from_number", vec![F64], Ptr);
        self.builder.declare_external("value_from_string", vec![Ptr], Ptr);
        self.builder.declare_external("value_to_number", vec![Ptr], F64);
        self.builder.declare_external("value_to_string", vec![Ptr], Ptr);

        self.builder.declare_external("array_get", vec![Ptr, Ptr], Ptr);
        self.builder.declare_external("array_set", vec![Ptr, Ptr, Ptr], Void);

        for name in ["value_add", "value_sub", "value_mul", "value_div"] {
            self.builder.declare_external(name, vec![Ptr, Ptr], Ptr);
        }

        for name in [
            "value_eq", "value_neq", "value_lt", "value_gt", "value_lte", "value_gte",
        ] {
            self.builder.declare_external(name, vec![Ptr, Ptr], I32);
        }
    }

    // ============ Statements ============

    fn generate_subroutine(&mut self, name: &str, body: &[Statement]) {
        let symbol = format!("sub_{}", name);
        // Registered before the body so recursive calls resolve
        self.subroutines.insert(name.to_string(), symbol.clone());

        self.builder.start_function(&symbol, vec![], IrType::Void);
        for stmt in body {
            self.generate_statement(stmt);
        }
        if !self.builder.has_terminator() {
            self.builder.ret(None);
        }
    }

    fn generate_statement(&mut self, stmt: &Statement) {
        match &stmt.kind {
            StatementKind::Assignment { target, value } => {
                let value = self.generate_expression(value);
                self.generate_assignment_target(target, value);
            }
            StatementKind::Expression(expr) => {
                self.generate_expression(expr);
            }
            StatementKind::If {
                condition,
                then_block,
                else_if_blocks,
                else_block,
            } => self.generate_if(condition, then_block, else_if_blocks, else_block),
            StatementKind::While { condition, body } => self.generate_while(condition, body),
            StatementKind::For {
                variable,
                start,
                end,
                step,
                body,
            } => self.generate_for(variable, start, end, step.as_ref(), body),
            StatementKind::Goto { label } => self.generate_goto(label),
            StatementKind::Label { name } => self.generate_label(name),
            // Subroutines were emitted in pass 1; nested ones are unreachable
            // as functions and deliberately not lowered
            StatementKind::Subroutine { .. } => {}
        }
    }

    fn generate_assignment_target(&mut self, target: &Expression, value: VReg) {
        match &target.kind {
            ExpressionKind::Identifier(name) => {
                let global = self.get_or_create_variable(name);
                let ptr = self.builder.global_ref(&global);
                self.builder.store(ptr, value);
            }
            ExpressionKind::ArrayAccess { array, index } => {
                let array = self.generate_expression(array);
                let index = self.generate_expression(index);
                self.builder.call_void("array_set", vec![array, index, value]);
            }
            ExpressionKind::PropertyAccess { object, property } => {
                self.assign_to_property(object, property, value);
            }
            // Rejected during semantic analysis; nothing to store into
            _ => {}
        }
    }

    fn assign_to_property(&mut self, object: &Expression, property: &str, value: VReg) {
        let ExpressionKind::Identifier(object_name) = &object.kind else {
            return;
        };
        if !self.registry.has_property(object_name, property) {
            return;
        }

        let symbol = format!(
            "{}_{}_set",
            object_name.to_lowercase(),
            property.to_lowercase()
        );
        self.builder
            .declare_external(&symbol, vec![IrType::Ptr], IrType::Void);
        self.builder.call_void(symbol, vec![value]);
    }

    /// Lower a condition expression to an i1: boxed -> number -> `!= 0.0`
    fn truthiness_test(&mut self, condition: &Expression) -> VReg {
        let value = self.generate_expression(condition);
        let number = self.builder.call("value_to_number", vec![value]);
        let zero = self.builder.const_float(0.0);
        self.builder.fcmp(CmpOp::One, number, zero)
    }

    fn generate_if(
        &mut self,
        condition: &Expression,
        then_block: &[Statement],
        else_if_blocks: &[(Expression, Vec<Statement>)],
        else_block: &[Statement],
    ) {
        let cond = self.truthiness_test(condition);

        let then_bb = self.builder.create_block("if_then");
        let else_bb = self.builder.create_block("if_else");
        let merge_bb = self.builder.create_block("if_merge");

        self.builder.cond_br(cond, then_bb, else_bb);

        self.builder.start_block(then_bb);
        for stmt in then_block {
            self.generate_statement(stmt);
        }
        if !self.builder.has_terminator() {
            self.builder.br(merge_bb);
        }

        // Each ElseIf nests a fresh conditional inside the current else arm
        self.builder.start_block(else_bb);
        for (else_if_cond, else_if_body) in else_if_blocks {
            let cond = self.truthiness_test(else_if_cond);

            let elseif_then = self.builder.create_block("elseif_then");
            let next_else = self.builder.create_block("elseif_next");

            self.builder.cond_br(cond, elseif_then, next_else);

            self.builder.start_block(elseif_then);
            for stmt in else_if_body {
                self.generate_statement(stmt);
            }
            if !self.builder.has_terminator() {
                self.builder.br(merge_bb);
            }

            self.builder.start_block(next_else);
        }

        for stmt in else_block {
            self.generate_statement(stmt);
        }
        if !self.builder.has_terminator() {
            self.builder.br(merge_bb);
        }

        self.builder.start_block(merge_bb);
    }

    fn generate_while(&mut self, condition: &Expression, body: &[Statement]) {
        let cond_bb = self.builder.create_block("while_cond");
        let body_bb = self.builder.create_block("while_body");
        let end_bb = self.builder.create_block("while_end");

        self.builder.br(cond_bb);

        // The condition is re-evaluated on every iteration
        self.builder.start_block(cond_bb);
        let cond = self.truthiness_test(condition);
        self.builder.cond_br(cond, body_bb, end_bb);

        self.builder.start_block(body_bb);
        for stmt in body {
            self.generate_statement(stmt);
        }
        if !self.builder.has_terminator() {
            self.builder.br(cond_bb);
        }

        self.builder.start_block(end_bb);
    }

    fn generate_for(
        &mut self,
        variable: &str,
        start: &Expression,
        end: &Expression,
        step: Option<&Expression>,
        body: &[Statement],
    ) {
        // Start, end and step are each lowered once, in the preheader
        let start_val = self.generate_expression(start);
        let end_val = self.generate_expression(end);
        let step_val = match step {
            Some(step) => self.generate_expression(step),
            None => {
                let one = self.builder.const_float(1.0);
                self.builder.call("value_from_number", vec![one])
            }
        };

        let loop_var = self.get_or_create_variable(variable);
        let ptr = self.builder.global_ref(&loop_var);
        self.builder.store(ptr, start_val);

        let cond_bb = self.builder.create_block("for_cond");
        let body_bb = self.builder.create_block("for_body");
        let inc_bb = self.builder.create_block("for_inc");
        let end_bb = self.builder.create_block("for_end");

        self.builder.br(cond_bb);

        // The loop variable is reloaded each iteration, in case the body
        // mutates it
        self.builder.start_block(cond_bb);
        let ptr = self.builder.global_ref(&loop_var);
        let current_val = self.builder.load(ptr);
        let current_num = self.builder.call("value_to_number", vec![current_val]);
        let end_num = self.builder.call("value_to_number", vec![end_val]);
        let cond = self.builder.fcmp(CmpOp::Ole, current_num, end_num);
        self.builder.cond_br(cond, body_bb, end_bb);

        self.builder.start_block(body_bb);
        for stmt in body {
            self.generate_statement(stmt);
        }
        if !self.builder.has_terminator() {
            self.builder.br(inc_bb);
        }

        self.builder.start_block(inc_bb);
        let current_num = self.builder.call("value_to_number", vec![current_val]);
        let step_num = self.builder.call("value_to_number", vec![step_val]);
        let sum = self.builder.fadd(current_num, step_num);
        let next_val = self.builder.call("value_from_number", vec![sum]);
        let ptr = self.builder.global_ref(&loop_var);
        self.builder.store(ptr, next_val);
        self.builder.br(cond_bb);

        self.builder.start_block(end_bb);
    }

    fn generate_goto(&mut self, label: &str) {
        let target = self.get_or_create_label(label);
        self.builder.br(target);

        // Every block needs exactly one terminator, so statements textually
        // following the goto still need a valid (unreachable) insertion point
        let continuation = self.builder.create_block("after_goto");
        self.builder.start_block(continuation);
    }

    fn generate_label(&mut self, name: &str) {
        let block = self.get_or_create_label(name);

        // Preserve fallthrough from above
        if !self.builder.has_terminator() {
            self.builder.br(block);
        }
        self.builder.start_block(block);
    }

    // ============ Expressions ============

    fn generate_expression(&mut self, expr: &Expression) -> VReg {
        match &expr.kind {
            ExpressionKind::NumberLiteral(value) => {
                let constant = self.builder.const_float(*value);
                self.builder.call("value_from_number", vec![constant])
            }
            ExpressionKind::StringLiteral(value) => self.string_value(value),
            ExpressionKind::Identifier(name) => {
                let global = self.get_or_create_variable(name);
                let ptr = self.builder.global_ref(&global);
                self.builder.load(ptr)
            }
            ExpressionKind::Binary { op, left, right } => {
                self.generate_binary(*op, left, right)
            }
            ExpressionKind::Unary { operand } => {
                let operand = self.generate_expression(operand);
                let number = self.builder.call("value_to_number", vec![operand]);
                let zero = self.builder.const_float(0.0);
                let negated = self.builder.fsub(zero, number);
                self.builder.call("value_from_number", vec![negated])
            }
            ExpressionKind::Call { callee, arguments } => {
                self.generate_call(callee, arguments)
            }
            ExpressionKind::ArrayAccess { array, index } => {
                let array = self.generate_expression(array);
                let index = self.generate_expression(index);
                self.builder.call("array_get", vec![array, index])
            }
            ExpressionKind::PropertyAccess { object, property } => {
                self.generate_property_access(object, property)
            }
        }
    }

    fn generate_binary(&mut self, op: BinaryOp, left: &Expression, right: &Expression) -> VReg {
        let left = self.generate_expression(left);
        let right = self.generate_expression(right);

        match op {
            BinaryOp::Add => self.builder.call("value_add", vec![left, right]),
            BinaryOp::Subtract => self.builder.call("value_sub", vec![left, right]),
            BinaryOp::Multiply => self.builder.call("value_mul", vec![left, right]),
            BinaryOp::Divide => self.builder.call("value_div", vec![left, right]),

            BinaryOp::Equal => self.comparison("value_eq", left, right),
            BinaryOp::NotEqual => self.comparison("value_neq", left, right),
            BinaryOp::LessThan => self.comparison("value_lt", left, right),
            BinaryOp::GreaterThan => self.comparison("value_gt", left, right),
            BinaryOp::LessThanOrEqual => self.comparison("value_lte", left, right),
            BinaryOp::GreaterThanOrEqual => self.comparison("value_gte", left, right),

            // And/Or coerce both sides to booleans; no short-circuiting in
            // this language
            BinaryOp::And | BinaryOp::Or => {
                let left_num = self.builder.call("value_to_number", vec![left]);
                let right_num = self.builder.call("value_to_number", vec![right]);
                let zero = self.builder.const_float(0.0);
                let left_bool = self.builder.fcmp(CmpOp::One, left_num, zero);
                let zero = self.builder.const_float(0.0);
                let right_bool = self.builder.fcmp(CmpOp::One, right_num, zero);
                let result = if op == BinaryOp::And {
                    self.builder.and(left_bool, right_bool)
                } else {
                    self.builder.or(left_bool, right_bool)
                };
                let number = self.builder.uitofp(result, IrType::F64);
                self.builder.call("value_from_number", vec![number])
            }
        }
    }

    /// Runtime comparisons return i32; box the result back into a number
    fn comparison(&mut self, func: &str, left: VReg, right: VReg) -> VReg {
        let cmp = self.builder.call(func, vec![left, right]);
        let number = self.builder.sitofp(cmp, IrType::F64);
        self.builder.call("value_from_number", vec![number])
    }

    fn generate_call(&mut self, callee: &Expression, arguments: &[Expression]) -> VReg {
        if let ExpressionKind::PropertyAccess { object, property } = &callee.kind {
            if let ExpressionKind::Identifier(object_name) = &object.kind {
                if let Some(info) = self.registry.get_function(object_name, property).cloned() {
                    let args: Vec<VReg> = arguments
                        .iter()
                        .map(|a| self.generate_expression(a))
                        .collect();

                    let symbol = self.get_or_declare_std_function(object_name, property, &info);
                    if info.return_type == ReturnType::Void {
                        self.builder.call_void(symbol, args);
                        // Expression position always needs a handle
                        return self.string_value("");
                    }
                    return self.builder.call(symbol, args);
                }
            }
        } else if let ExpressionKind::Identifier(name) = &callee.kind {
            if let Some(symbol) = self.subroutines.get(name).cloned() {
                self.builder.call_void(symbol, vec![]);
                return self.string_value("");
            }
        }

        self.zero_value()
    }

    fn generate_property_access(&mut self, object: &Expression, property: &str) -> VReg {
        if let ExpressionKind::Identifier(object_name) = &object.kind {
            if self.registry.has_property(object_name, property) {
                let symbol = format!(
                    "{}_{}_get",
                    object_name.to_lowercase(),
                    property.to_lowercase()
                );
                self.builder.declare_external(&symbol, vec![], IrType::Ptr);
                return self.builder.call(symbol, vec![]);
            }
        }

        self.zero_value()
    }

    // ============ Helpers ============

    /// Codegen stays total over the grammar: unresolvable shapes become a
    /// boxed numeric zero
    fn zero_value(&mut self) -> VReg {
        let zero = self.builder.const_float(0.0);
        self.builder.call("value_from_number", vec![zero])
    }

    fn string_value(&mut self, value: &str) -> VReg {
        let name = self.builder.add_string_constant(value);
        let ptr = self.builder.global_ref(&name);
        self.builder.call("value_from_string", vec![ptr])
    }

    fn get_or_create_variable(&mut self, name: &str) -> String {
        if !self.variables.contains(name) {
            self.builder
                .add_global(name, IrType::Ptr, Constant::Null, false);
            self.variables.insert(name.to_string());
        }
        name.to_string()
    }

    fn get_or_create_label(&mut self, name: &str) -> BlockId {
        if let Some(block) = self.labels.get(name) {
            return *block;
        }
        let block = self.builder.create_block(&format!("label_{}", name));
        self.labels.insert(name.to_string(), block);
        block
    }

    fn get_or_declare_std_function(
        &mut self,
        object: &str,
        method: &str,
        info: &FunctionInfo,
    ) -> String {
        let key = format!("{}.{}", object.to_lowercase(), method.to_lowercase());
        if let Some(symbol) = self.std_functions.get(&key) {
            return symbol.clone();
        }

        let symbol = format!("{}_{}", object.to_lowercase(), method.to_lowercase());
        let params = vec![IrType::Ptr; info.params.len()];
        let ret_type = match info.return_type {
            ReturnType::Void => IrType::Void,
            ReturnType::Number | ReturnType::String => IrType::Ptr,
        };
        self.builder.declare_external(&symbol, params, ret_type);

        self.std_functions.insert(key, symbol.clone());
        symbol
    }
}

/// Serialize a module in its human-readable text form
pub fn print_module(module: &Module) -> String {
    let mut output = String::new();
    output.push_str(&format!("module {}\n\n", module.name));

    for global in &module.globals {
        let kind = if global.is_const { "const" } else { "global" };
        output.push_str(&format!(
            "{} @{}: {} = {}\n",
            kind, global.name, global.ty, global.init
        ));
    }
    if !module.globals.is_empty() {
        output.push('\n');
    }

    for func in &module.functions {
        let params = func
            .params
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        if func.is_external {
            output.push_str(&format!(
                "declare {}({}) -> {}\n",
                func.name, params, func.ret_type
            ));
            continue;
        }

        output.push_str(&format!(
            "define {}({}) -> {} {{\n",
            func.name, params, func.ret_type
        ));
        for block in &func.blocks {
            match &block.label {
                Some(label) => output.push_str(&format!("  {}:  ; {}\n", block.id, label)),
                None => output.push_str(&format!("  {}:\n", block.id)),
            }
            for instr in &block.instructions {
                output.push_str(&format!("    {}\n", instr));
            }
            if let Some(term) = &block.terminator {
                output.push_str(&format!("    {}\n", term));
            }
        }
        output.push_str("}\n\n");
    }

    output
}
