//! Semantic analysis
//!
//! Walks the AST resolving variable, label and subroutine symbols and
//! validating standard-library access against the [`Registry`]. The analyzer
//! never mutates the tree and never stops early: it accumulates diagnostics
//! across the whole program and leaves the halt decision to the driver.
//!
//! Two passes plus a closure check:
//! 1. register every top-level label and subroutine, so forward references
//!    (a goto before its label, a call before its subroutine) are legal;
//! 2. walk the full tree;
//! finally, every recorded goto target must name a known label.

use std::collections::{BTreeSet, HashSet};

use crate::ast::{Expression, ExpressionKind, Program, Statement, StatementKind};
use crate::diagnostics::Diagnostics;
use crate::registry::Registry;
use crate::span::SourceLocation;

/// Analyze `program`, reporting into `diagnostics`.
pub fn analyze(program: &Program, diagnostics: &mut Diagnostics) {
    SemanticAnalyzer::new(diagnostics).analyze(program);
}

/// Per-invocation analysis state. Symbol names are compared
/// case-insensitively except labels, which are case-sensitive.
pub struct SemanticAnalyzer<'d> {
    diagnostics: &'d mut Diagnostics,
    registry: Registry,
    /// Known variables, lowercased
    variables: HashSet<String>,
    /// Known labels, original casing
    labels: HashSet<String>,
    /// Known subroutines, lowercased
    subroutines: HashSet<String>,
    /// Every goto target seen, for the deferred closure check
    /// (ordered, so unresolved targets are reported deterministically)
    goto_targets: BTreeSet<String>,
    in_subroutine: bool,
}

impl<'d> SemanticAnalyzer<'d> {
    pub fn new(diagnostics: &'d mut Diagnostics) -> Self {
        Self {
            diagnostics,
            registry: Registry::new(),
            variables: HashSet::new(),
            labels: HashSet::new(),
            subroutines: HashSet::new(),
            goto_targets: BTreeSet::new(),
            in_subroutine: false,
        }
    }

    pub fn analyze(&mut self, program: &Program) {
        for stmt in &program.statements {
            match &stmt.kind {
                StatementKind::Label { name } => self.define_label(name, stmt.line, stmt.column),
                StatementKind::Subroutine { name, .. } => {
                    self.define_subroutine(name, stmt.line, stmt.column)
                }
                _ => {}
            }
        }

        for stmt in &program.statements {
            self.analyze_statement(stmt);
        }

        self.verify_all_labels();
    }

    fn analyze_statement(&mut self, stmt: &Statement) {
        match &stmt.kind {
            StatementKind::Assignment { target, value } => {
                self.analyze_assignment(stmt, target, value)
            }
            StatementKind::Expression(expr) => self.analyze_expression(expr),
            StatementKind::If {
                condition,
                then_block,
                else_if_blocks,
                else_block,
            } => {
                self.analyze_expression(condition);
                for s in then_block {
                    self.analyze_statement(s);
                }
                for (cond, block) in else_if_blocks {
                    self.analyze_expression(cond);
                    for s in block {
                        self.analyze_statement(s);
                    }
                }
                for s in else_block {
                    self.analyze_statement(s);
                }
            }
            StatementKind::While { condition, body } => {
                self.analyze_expression(condition);
                for s in body {
                    self.analyze_statement(s);
                }
            }
            StatementKind::For {
                variable,
                start,
                end,
                step,
                body,
            } => {
                self.define_variable(variable);
                self.analyze_expression(start);
                self.analyze_expression(end);
                if let Some(step) = step {
                    self.analyze_expression(step);
                }
                for s in body {
                    self.analyze_statement(s);
                }
            }
            StatementKind::Goto { label } => {
                self.check_goto_target(label, stmt.line, stmt.column)
            }
            // Top-level labels were registered in the pre-scan; labels nested
            // in structured bodies are deliberately not registered
            StatementKind::Label { .. } => {}
            StatementKind::Subroutine { body, .. } => {
                let was_in_subroutine = self.in_subroutine;
                self.in_subroutine = true;
                for s in body {
                    self.analyze_statement(s);
                }
                self.in_subroutine = was_in_subroutine;
            }
        }
    }

    fn analyze_assignment(&mut self, stmt: &Statement, target: &Expression, value: &Expression) {
        // `object.property = identifier` is an event-handler binding: the
        // object must exist, and the handler should name a subroutine (a
        // warning only, since it may be declared later or bound dynamically)
        if let ExpressionKind::PropertyAccess { object, .. } = &target.kind {
            if let (ExpressionKind::Identifier(object_name), ExpressionKind::Identifier(handler)) =
                (&object.kind, &value.kind)
            {
                if !self.registry.has_object(object_name) {
                    self.diagnostics.add_error(
                        format!("unknown object '{}'", object_name),
                        SourceLocation::new(stmt.line, stmt.column, object_name.len()),
                        "this object is not defined in the standard library",
                    );
                }

                if !self.subroutines.contains(&handler.to_lowercase()) {
                    self.diagnostics.add_warning(
                        format!("event handler '{}' is not defined", handler),
                        SourceLocation::new(value.line, value.column, handler.len()),
                        "make sure to define this subroutine before using it as an event handler",
                    );
                }

                return;
            }
        }

        self.analyze_assignment_target(target);
        self.analyze_expression(value);
    }

    fn analyze_assignment_target(&mut self, expr: &Expression) {
        match &expr.kind {
            ExpressionKind::Identifier(name) => self.define_variable(name),
            ExpressionKind::ArrayAccess { array, index } => {
                self.analyze_array_access(array, index, true)
            }
            ExpressionKind::PropertyAccess { object, property } => {
                self.analyze_property_access(expr, object, property, true)
            }
            ExpressionKind::Call { .. } => {
                self.diagnostics.add_error(
                    "invalid assignment target",
                    SourceLocation::point(expr.line, expr.column),
                    "the result of a call cannot be assigned to",
                );
                self.analyze_expression(expr);
            }
            _ => self.analyze_expression(expr),
        }
    }

    fn analyze_expression(&mut self, expr: &Expression) {
        match &expr.kind {
            ExpressionKind::Identifier(name) => {
                self.check_variable(name, expr.line, expr.column)
            }
            ExpressionKind::Binary { left, right, .. } => {
                self.analyze_expression(left);
                self.analyze_expression(right);
            }
            ExpressionKind::Unary { operand } => self.analyze_expression(operand),
            ExpressionKind::Call { callee, arguments } => {
                self.analyze_call(expr, callee, arguments)
            }
            ExpressionKind::ArrayAccess { array, index } => {
                self.analyze_array_access(array, index, false)
            }
            ExpressionKind::PropertyAccess { object, property } => {
                self.analyze_property_access(expr, object, property, false)
            }
            ExpressionKind::NumberLiteral(_) | ExpressionKind::StringLiteral(_) => {}
        }
    }

    fn analyze_array_access(&mut self, array: &Expression, index: &Expression, is_assignment: bool) {
        match &array.kind {
            ExpressionKind::Identifier(name) => {
                if is_assignment {
                    self.define_variable(name);
                } else {
                    self.check_variable(name, array.line, array.column);
                }
            }
            ExpressionKind::ArrayAccess {
                array: nested,
                index: nested_index,
            } => self.analyze_array_access(nested, nested_index, is_assignment),
            _ => self.analyze_expression(array),
        }

        self.analyze_expression(index);
    }

    fn analyze_property_access(
        &mut self,
        expr: &Expression,
        object: &Expression,
        property: &str,
        is_assignment: bool,
    ) {
        let ExpressionKind::Identifier(object_name) = &object.kind else {
            self.analyze_expression(object);
            return;
        };

        if !self.registry.has_object(object_name) {
            // Not a standard-library object: `Foo.Bar` degrades to a plain
            // variable reference to `Foo`
            self.check_variable(object_name, object.line, object.column);
            return;
        }

        if !self.registry.has_property(object_name, property) {
            if !self.registry.has_function(object_name, property) {
                self.diagnostics.add_error(
                    format!(
                        "'{}' does not have a property or method '{}'",
                        object_name, property
                    ),
                    SourceLocation::new(expr.line, expr.column, property.len()),
                    "check the spelling or refer to the documentation",
                );
            }
        } else if is_assignment {
            if let Some(info) = self.registry.get_property(object_name, property) {
                if info.read_only {
                    self.diagnostics.add_error(
                        format!(
                            "cannot assign to read-only property '{}.{}'",
                            object_name, property
                        ),
                        SourceLocation::new(expr.line, expr.column, property.len()),
                        "this property is read-only",
                    );
                }
            }
        }
    }

    fn analyze_call(&mut self, expr: &Expression, callee: &Expression, arguments: &[Expression]) {
        match &callee.kind {
            ExpressionKind::PropertyAccess { object, property } => {
                if let ExpressionKind::Identifier(object_name) = &object.kind {
                    self.check_function(
                        object_name,
                        property,
                        arguments.len(),
                        expr.line,
                        expr.column,
                    );
                } else {
                    self.analyze_expression(object);
                }
            }
            ExpressionKind::Identifier(name) => {
                if !self.subroutines.contains(&name.to_lowercase()) {
                    self.diagnostics.add_error(
                        format!("subroutine '{}' is not defined", name),
                        SourceLocation::new(callee.line, callee.column, name.len()),
                        "define the subroutine or check the spelling",
                    );
                }
            }
            _ => self.analyze_expression(callee),
        }

        for arg in arguments {
            self.analyze_expression(arg);
        }
    }

    fn check_variable(&mut self, name: &str, line: u32, column: u32) {
        let key = name.to_lowercase();
        if !self.variables.contains(&key) {
            self.diagnostics.add_note(
                format!("first use of variable '{}'", name),
                SourceLocation::new(line, column, name.len()),
                "variables are implicitly initialized to 0 or empty string",
            );
            self.variables.insert(key);
        }
    }

    fn define_variable(&mut self, name: &str) {
        self.variables.insert(name.to_lowercase());
    }

    fn define_label(&mut self, name: &str, line: u32, column: u32) {
        if self.labels.contains(name) {
            self.diagnostics.add_error(
                format!("label '{}' is already defined", name),
                SourceLocation::new(line, column, name.len()),
                "each label must be unique",
            );
        }
        self.labels.insert(name.to_string());
    }

    fn define_subroutine(&mut self, name: &str, line: u32, column: u32) {
        let key = name.to_lowercase();
        if self.subroutines.contains(&key) {
            self.diagnostics.add_error(
                format!("subroutine '{}' is already defined", name),
                SourceLocation::new(line, column, name.len()),
                "each subroutine must be unique",
            );
        }
        self.subroutines.insert(key);
    }

    fn check_goto_target(&mut self, label: &str, line: u32, column: u32) {
        self.goto_targets.insert(label.to_string());

        if self.in_subroutine {
            self.diagnostics.add_warning(
                "goto statement inside subroutine",
                SourceLocation::new(line, column, label.len()),
                "using goto inside subroutines can make code harder to understand",
            );
        }
    }

    fn check_function(
        &mut self,
        object: &str,
        method: &str,
        arg_count: usize,
        line: u32,
        column: u32,
    ) {
        if !self.registry.has_object(object) {
            self.diagnostics.add_error(
                format!("unknown object '{}'", object),
                SourceLocation::new(line, column, object.len()),
                "this object is not defined in the standard library",
            );
            return;
        }

        if !self.registry.has_function(object, method) {
            self.diagnostics.add_error(
                format!("'{}' does not have a method '{}'", object, method),
                SourceLocation::new(line, column, method.len()),
                "check the spelling or refer to the documentation",
            );
            return;
        }

        if let Some(info) = self.registry.get_function(object, method) {
            if arg_count != info.params.len() {
                self.diagnostics.add_error(
                    format!(
                        "'{}.{}' expects {} argument(s), but got {}",
                        object,
                        method,
                        info.params.len(),
                        arg_count
                    ),
                    SourceLocation::new(line, column, method.len()),
                    "check the function signature",
                );
            }
        }
    }

    fn verify_all_labels(&mut self) {
        for target in &self.goto_targets {
            if !self.labels.contains(target) {
                self.diagnostics.add_error(
                    format!("goto target '{}' is not defined", target),
                    SourceLocation::new(1, 1, target.len()),
                    "define a label with this name or check the spelling",
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticLevel;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn analyze_source(source: &str) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        let tokens = tokenize(source, &mut diagnostics);
        let program = parse(tokens, &mut diagnostics);
        assert!(
            !diagnostics.has_errors(),
            "source should parse cleanly: {:?}",
            diagnostics.entries()
        );
        analyze(&program, &mut diagnostics);
        diagnostics
    }

    fn messages_at(diag: &Diagnostics, level: DiagnosticLevel) -> Vec<String> {
        diag.entries()
            .iter()
            .filter(|d| d.level == level)
            .map(|d| d.message.clone())
            .collect()
    }

    #[test]
    fn test_first_use_is_note_then_silent() {
        let diag = analyze_source("x = y + y");
        let notes = messages_at(&diag, DiagnosticLevel::Note);
        assert_eq!(notes, vec!["first use of variable 'y'"]);
        assert!(!diag.has_errors());
    }

    #[test]
    fn test_assignment_defines_without_note() {
        let diag = analyze_source("x = 1\ny = x");
        assert_eq!(messages_at(&diag, DiagnosticLevel::Note).len(), 0);
    }

    #[test]
    fn test_variable_names_case_insensitive() {
        let diag = analyze_source("counter = 1\nx = COUNTER");
        assert_eq!(messages_at(&diag, DiagnosticLevel::Note).len(), 0);
    }

    #[test]
    fn test_forward_goto_is_legal() {
        let diag = analyze_source("GoTo done\nx = 1\ndone:");
        assert!(!diag.has_errors());
    }

    #[test]
    fn test_missing_goto_target_scenario() {
        // Exactly one error, at the synthetic top-of-file location
        let diag = analyze_source("x = 1\nGoTo Missing");
        let errors: Vec<_> = diag
            .entries()
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "goto target 'Missing' is not defined");
        assert_eq!(errors[0].location.line, 1);
    }

    #[test]
    fn test_goto_target_is_case_sensitive() {
        let diag = analyze_source("start:\nGoTo START");
        assert!(diag.has_errors());
    }

    #[test]
    fn test_duplicate_label_one_error() {
        let diag = analyze_source("again:\nx = 1\nagain:");
        let errors = messages_at(&diag, DiagnosticLevel::Error);
        assert_eq!(errors, vec!["label 'again' is already defined"]);
    }

    #[test]
    fn test_labels_differing_in_case_are_distinct() {
        let diag = analyze_source("Loop1:\nloop1:");
        assert!(!diag.has_errors());
    }

    #[test]
    fn test_duplicate_subroutine_case_insensitive() {
        let diag = analyze_source("Sub Foo\nEndSub\nSub FOO\nEndSub");
        let errors = messages_at(&diag, DiagnosticLevel::Error);
        assert_eq!(errors, vec!["subroutine 'FOO' is already defined"]);
    }

    #[test]
    fn test_subroutine_forward_call() {
        let diag = analyze_source("Greet()\nSub Greet\nEndSub");
        assert!(!diag.has_errors());
    }

    #[test]
    fn test_subroutine_call_case_insensitive() {
        let diag = analyze_source("GREET()\nSub Greet\nEndSub");
        assert!(!diag.has_errors());
    }

    #[test]
    fn test_undefined_subroutine_call() {
        let diag = analyze_source("Greet()");
        let errors = messages_at(&diag, DiagnosticLevel::Error);
        assert_eq!(errors, vec!["subroutine 'Greet' is not defined"]);
    }

    #[test]
    fn test_goto_inside_subroutine_warns() {
        let diag = analyze_source("Sub Foo\n  GoTo out\nEndSub\nout:");
        let warnings = messages_at(&diag, DiagnosticLevel::Warning);
        assert_eq!(warnings, vec!["goto statement inside subroutine"]);
        assert!(!diag.has_errors());
    }

    #[test]
    fn test_unknown_property_fallback_is_note_only() {
        // `Foo` is not a registry object, so `Foo.Bar` is a plain variable
        // reference to `Foo`: one note, nothing else
        let diag = analyze_source("x = Foo.Bar");
        assert!(!diag.has_errors());
        let notes = messages_at(&diag, DiagnosticLevel::Note);
        assert_eq!(notes, vec!["first use of variable 'Foo'"]);
        assert_eq!(diag.entries().len(), 1);
    }

    #[test]
    fn test_unknown_member_on_known_object() {
        let diag = analyze_source("x = TextWindow.Bogus");
        let errors = messages_at(&diag, DiagnosticLevel::Error);
        assert_eq!(
            errors,
            vec!["'TextWindow' does not have a property or method 'Bogus'"]
        );
    }

    #[test]
    fn test_method_name_in_property_position_is_allowed() {
        let diag = analyze_source("x = TextWindow.Read");
        assert!(!diag.has_errors());
    }

    #[test]
    fn test_read_only_property_assignment() {
        let diag = analyze_source("Clock.Date = 5");
        let errors = messages_at(&diag, DiagnosticLevel::Error);
        assert_eq!(
            errors,
            vec!["cannot assign to read-only property 'Clock.Date'"]
        );
    }

    #[test]
    fn test_writable_property_assignment() {
        let diag = analyze_source("TextWindow.Title = \"hi\"");
        assert!(!diag.has_errors());
    }

    #[test]
    fn test_call_arity_mismatch() {
        let diag = analyze_source("TextWindow.WriteLine(1, 2)");
        let errors = messages_at(&diag, DiagnosticLevel::Error);
        assert_eq!(
            errors,
            vec!["'TextWindow.WriteLine' expects 1 argument(s), but got 2"]
        );
    }

    #[test]
    fn test_unknown_method_call() {
        let diag = analyze_source("Math.Explode(1)");
        let errors = messages_at(&diag, DiagnosticLevel::Error);
        assert_eq!(errors, vec!["'Math' does not have a method 'Explode'"]);
    }

    #[test]
    fn test_event_handler_binding_undeclared_is_warning() {
        let diag = analyze_source("TextWindow.Title = OnTitle");
        assert!(!diag.has_errors());
        let warnings = messages_at(&diag, DiagnosticLevel::Warning);
        assert_eq!(warnings, vec!["event handler 'OnTitle' is not defined"]);
    }

    #[test]
    fn test_event_handler_binding_declared_is_silent() {
        let diag = analyze_source("Sub OnTitle\nEndSub\nTextWindow.Title = ONTITLE");
        assert!(!diag.has_errors());
        assert_eq!(messages_at(&diag, DiagnosticLevel::Warning).len(), 0);
    }

    #[test]
    fn test_event_handler_unknown_object_is_error() {
        let diag = analyze_source("Bogus.Click = Handler");
        let errors = messages_at(&diag, DiagnosticLevel::Error);
        assert_eq!(errors, vec!["unknown object 'Bogus'"]);
    }

    #[test]
    fn test_call_assignment_target_rejected() {
        let diag = analyze_source("Sub f\nEndSub\nf(1) = 2");
        let errors = messages_at(&diag, DiagnosticLevel::Error);
        assert!(errors.contains(&"invalid assignment target".to_string()));
    }

    #[test]
    fn test_for_defines_loop_variable() {
        let diag = analyze_source("For i = 1 To 10\n  x = i\nEndFor");
        assert_eq!(messages_at(&diag, DiagnosticLevel::Note).len(), 0);
    }

    #[test]
    fn test_array_assignment_defines_base() {
        let diag = analyze_source("a[1] = 2\nx = a[1]");
        assert_eq!(messages_at(&diag, DiagnosticLevel::Note).len(), 0);
    }

    #[test]
    fn test_analysis_is_idempotent() {
        let mut diagnostics = Diagnostics::new();
        let tokens = tokenize("x = y\nGoTo nowhere", &mut diagnostics);
        let program = parse(tokens, &mut diagnostics);

        let mut first = Diagnostics::new();
        analyze(&program, &mut first);
        let mut second = Diagnostics::new();
        analyze(&program, &mut second);

        let render = |d: &Diagnostics| {
            d.entries()
                .iter()
                .map(|e| format!("{:?} {} {}", e.level, e.location, e.message))
                .collect::<Vec<_>>()
        };
        assert_eq!(render(&first), render(&second));
    }
}
