//! x86-64 code generation in NASM syntax.
//!
//! Each function body is lowered one full expression at a time: the
//! expression is canonicalized into the function's [`DagPool`], a use plan is
//! computed for every reachable node, and the DAG is then walked in operand
//! order, materializing values into scratch registers. A node whose value is
//! needed more than once is generated once and pinned in its register until
//! the plan says every consumer has taken it.
//!
//! Control flow uses NASM local labels (`.L0`, `.L1`, ...). Conditions
//! rooted at a comparison branch directly on the inverted condition code;
//! anything else is materialized and compared against zero.

use hashbrown::{HashMap, HashSet};
use indoc::indoc;
use itertools::Itertools;

use crate::{
    ast::{Declaration, Expression, ExpressionKind, Program, Statement, StatementKind},
    backend::regalloc::{Register, RegisterPool, alloc_or_exhausted},
    diagnostics::{Diagnostics, FatalError},
    middle::{
        dag::{self, DagKind, DagNode, DagNodeId, DagPayload, DagPool},
        resolve::Resolution,
        symbols::{Symbol, SymbolKind},
        ty::{Type, WORD_SIZE},
    },
};

/// Distance from the frame base to the `index`th caller-pushed argument.
/// The saved frame pointer and the return address sit between the frame base
/// and the arguments.
pub fn parameter_offset(index: usize) -> usize {
    2 * WORD_SIZE + index * WORD_SIZE
}

/// Memory operand addressing one scalar symbol
pub fn memory_operand(symbol: &Symbol) -> String {
    match symbol.kind {
        SymbolKind::Local { offset } => format!("[rbp - {offset}]"),
        SymbolKind::Param { index } => format!("[rbp + {}]", parameter_offset(index)),
        SymbolKind::Global => format!("[{}]", symbol.name),
    }
}

/// Renders string contents as a NASM `db` operand list, NUL terminator
/// included. Printable runs stay quoted, everything else (and `"`, which
/// NASM cannot escape inside double quotes) becomes a numeric byte.
fn nasm_string_bytes(text: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut run = String::new();

    for c in text.chars() {
        if (c.is_ascii_graphic() || c == ' ') && c != '"' {
            run.push(c);
        } else {
            if !run.is_empty() {
                parts.push(format!("\"{run}\""));
                run.clear();
            }
            parts.push((c as u32).to_string());
        }
    }

    if !run.is_empty() {
        parts.push(format!("\"{run}\""));
    }
    parts.push("0".to_string());

    parts.iter().join(", ")
}

/// Accumulates the `.data` and `.text` sections as they are emitted and
/// renders the final NASM module
pub struct Assembler {
    data: String,
    text: String,
}

impl Assembler {
    pub fn new() -> Self {
        Self {
            data: String::new(),
            text: String::new(),
        }
    }

    /// One indented instruction in the text section
    pub fn emit(&mut self, line: impl AsRef<str>) {
        self.text.push_str("    ");
        self.text.push_str(line.as_ref());
        self.text.push('\n');
    }

    pub fn label(&mut self, name: &str) {
        self.text.push_str(name);
        self.text.push_str(":\n");
    }

    pub fn global_label(&mut self, name: &str) {
        self.emit(format!("global {name}"));
        self.label(name);
    }

    pub fn blank_line(&mut self) {
        self.text.push('\n');
    }

    pub fn data_line(&mut self, line: impl AsRef<str>) {
        self.data.push_str(line.as_ref());
        self.data.push('\n');
    }

    pub fn function_prologue(&mut self, frame_size: usize) {
        self.emit("push rbp");
        self.emit("mov rbp, rsp");

        if frame_size > 0 {
            self.emit(format!("sub rsp, {frame_size}"));
        }
    }

    /// Tears the frame down and returns. Emitted at every `return` statement
    /// and once more at the end of the body as the fall-through exit.
    pub fn function_epilogue(&mut self) {
        self.emit("leave");
        self.emit("ret");
    }

    pub fn finish(self) -> String {
        format!(
            indoc! {"
                bits 64

                section .data
                {}
                section .text

                {}"},
            self.data, self.text
        )
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything generated for one program
pub struct CodegenOutput {
    pub assembly: String,
    /// Recoverable problems found while building expression DAGs (constant
    /// division by zero); the offending expressions were skipped
    pub diagnostics: Diagnostics,
}

/// Per-function generation state. The pool exclusively owns the function's
/// DAG nodes; dropping the state at the end of the function releases the
/// nodes and the register pool together.
struct FunctionState<'p> {
    name: &'p str,
    pool: DagPool,
    registers: RegisterPool,
    /// Consumptions left per node, per the current expression's use plan
    remaining_uses: HashMap<DagNodeId, usize>,
    /// Registers pinned to nodes whose value is still wanted
    cache: HashMap<DagNodeId, Register>,
}

/// Plans how many times each DAG node's value (or address, for mutation
/// targets) will be consumed while generating one expression. The plan
/// mirrors the generator's traversal exactly so every register is freed on
/// its last use.
struct UsePlan {
    counts: HashMap<DagNodeId, usize>,
    planned: HashSet<DagNodeId>,
}

impl UsePlan {
    fn expression(pool: &DagPool, root: DagNodeId) -> HashMap<DagNodeId, usize> {
        let mut plan = Self {
            counts: HashMap::new(),
            planned: HashSet::new(),
        };
        plan.value(pool, root);
        plan.counts
    }

    fn value(&mut self, pool: &DagPool, id: DagNodeId) {
        *self.counts.entry(id).or_default() += 1;

        // A node already planned will be served from its cached register;
        // its children are only consumed by the first generation
        if !self.planned.insert(id) {
            return;
        }

        let node = pool.get(id);
        match node.kind {
            DagKind::Name
            | DagKind::IntegerLiteral
            | DagKind::CharacterLiteral
            | DagKind::BooleanLiteral
            | DagKind::StringLiteral => {}
            DagKind::Add
            | DagKind::Subtract
            | DagKind::Multiply
            | DagKind::Divide
            | DagKind::Equals
            | DagKind::NotEquals
            | DagKind::LessThan
            | DagKind::LessThanOrEqualTo
            | DagKind::GreaterThan
            | DagKind::GreaterThanOrEqualTo
            | DagKind::Subscript => {
                self.value(pool, node.lhs.expect("binary nodes have a left operand"));
                self.value(pool, node.rhs.expect("binary nodes have a right operand"));
            }
            DagKind::Assign | DagKind::AddAssign | DagKind::SubtractAssign => {
                self.value(pool, node.rhs.expect("assignments carry a value"));
                self.target(pool, node.lhs.expect("assignments have a target"));
            }
            DagKind::Increment | DagKind::Decrement => {
                self.target(pool, node.lhs.expect("increments have a target"));
            }
            DagKind::Call => {
                // The chain is traversed per call, not gated by the planned
                // set: two calls sharing argument nodes each walk the chain
                let mut chain = node.lhs;
                while let Some(argument_id) = chain {
                    let argument = pool.get(argument_id);
                    *self.counts.entry(argument_id).or_default() += 1;
                    self.value(pool, argument.lhs.expect("argument nodes carry a value"));
                    chain = argument.rhs;
                }
            }
            DagKind::Argument => unreachable!("argument chains are planned by their call"),
        }
    }

    /// A mutation target: the node itself is consumed without computing its
    /// value, and a subscript target's address operands are consumed once
    /// per mutation
    fn target(&mut self, pool: &DagPool, id: DagNodeId) {
        *self.counts.entry(id).or_default() += 1;

        let node = pool.get(id);
        if node.kind == DagKind::Subscript {
            self.value(pool, node.lhs.expect("subscripts have a base"));
            self.value(pool, node.rhs.expect("subscripts have an index"));
        }
    }
}

pub struct CodeGenerator<'p> {
    program: &'p Program,
    resolution: &'p Resolution,
    assembler: Assembler,
    diagnostics: Diagnostics,
    label_counter: usize,
    /// Interned string literal contents, in first-use order
    strings: Vec<String>,
}

impl<'p> CodeGenerator<'p> {
    pub fn generate(
        program: &'p Program,
        resolution: &'p Resolution,
    ) -> Result<CodegenOutput, FatalError> {
        let mut generator = Self {
            program,
            resolution,
            assembler: Assembler::new(),
            diagnostics: Diagnostics::new(),
            label_counter: 0,
            strings: Vec::new(),
        };

        generator.emit_externs();

        let program = generator.program;
        for declaration in &program.declarations {
            generator.generate_declaration(declaration)?;
        }

        generator.emit_string_table();

        Ok(CodegenOutput {
            assembly: generator.assembler.finish(),
            diagnostics: generator.diagnostics,
        })
    }

    /// Prototypes with no definition anywhere in the program are external
    /// symbols supplied by the runtime at link time
    fn emit_externs(&mut self) {
        let defined: HashSet<&str> = self
            .program
            .declarations
            .iter()
            .filter(|d| d.body.is_some())
            .map(|d| d.name.as_str())
            .collect();

        let mut any = false;
        for declaration in &self.program.declarations {
            if declaration.ty.is_function()
                && declaration.body.is_none()
                && !defined.contains(declaration.name.as_str())
            {
                self.assembler.emit(format!("extern {}", declaration.name));
                any = true;
            }
        }

        if any {
            self.assembler.blank_line();
        }
    }

    fn next_label(&mut self) -> String {
        let label = format!(".L{}", self.label_counter);
        self.label_counter += 1;
        label
    }

    fn generate_declaration(&mut self, declaration: &'p Declaration) -> Result<(), FatalError> {
        if declaration.ty.is_function() {
            if let Some(body) = &declaration.body {
                self.generate_function(declaration, body)?;
            }
            return Ok(());
        }

        self.generate_global(declaration);
        Ok(())
    }

    /* Globals */

    fn generate_global(&mut self, declaration: &'p Declaration) {
        let name = &declaration.name;

        match &declaration.ty {
            Type::Integer => {
                let value = self.scalar_data_operand(declaration.initializer.as_ref());
                self.assembler.data_line(format!("{name}: dq {value}"));
            }
            Type::Boolean | Type::Character => {
                let value = self.scalar_data_operand(declaration.initializer.as_ref());
                self.assembler.data_line(format!("{name}: db {value}"));
            }
            // String globals hold a pointer word into the string table
            Type::String => {
                let value = self.scalar_data_operand(declaration.initializer.as_ref());
                self.assembler.data_line(format!("{name}: dq {value}"));
            }
            Type::Array { element, length } => {
                let directive = if element.size_in_bytes() == 1 { "db" } else { "dq" };

                let mut values: Vec<String> = Vec::new();
                if let Some(initializer) = &declaration.initializer
                    && let ExpressionKind::InitializerList(elements) = &initializer.kind
                {
                    for element in elements.iter().take(*length) {
                        let operand = self.constant_data_operand(element);
                        values.push(operand);
                    }
                }
                while values.len() < *length {
                    values.push("0".to_string());
                }

                self.assembler
                    .data_line(format!("{name}: {directive} {}", values.iter().join(", ")));
            }
            Type::Void | Type::Function { .. } | Type::Unknown => {}
        }
    }

    fn scalar_data_operand(&mut self, initializer: Option<&Expression>) -> String {
        match initializer {
            Some(expression) => self.constant_data_operand(expression),
            None => "0".to_string(),
        }
    }

    /// One constant value as a data directive operand. The checker has
    /// already rejected non-constant global initializers.
    fn constant_data_operand(&mut self, expression: &Expression) -> String {
        match &expression.kind {
            ExpressionKind::IntegerLiteral(value) => value.to_string(),
            ExpressionKind::BooleanLiteral(value) => (*value as i64).to_string(),
            ExpressionKind::CharacterLiteral(value) => (*value as u32).to_string(),
            ExpressionKind::StringLiteral(value) => self.intern_string(value),
            _ => "0".to_string(),
        }
    }

    fn intern_string(&mut self, text: &str) -> String {
        let index = match self.strings.iter().position(|existing| existing == text) {
            Some(index) => index,
            None => {
                self.strings.push(text.to_string());
                self.strings.len() - 1
            }
        };

        format!("__slate_str_{index}")
    }

    fn emit_string_table(&mut self) {
        for (index, text) in self.strings.iter().enumerate() {
            self.assembler
                .data
                .push_str(&format!("__slate_str_{index}: db {}\n", nasm_string_bytes(text)));
        }
    }

    /* Functions and statements */

    fn generate_function(
        &mut self,
        declaration: &'p Declaration,
        body: &'p [Statement],
    ) -> Result<(), FatalError> {
        let frame_size = self
            .resolution
            .symbol_of_declaration(declaration.id)
            .and_then(|symbol| symbol.frame_size)
            .unwrap_or(0);

        let mut function = FunctionState {
            name: &declaration.name,
            pool: DagPool::new(),
            registers: RegisterPool::new(),
            remaining_uses: HashMap::new(),
            cache: HashMap::new(),
        };

        self.assembler.global_label(&declaration.name);
        self.assembler.function_prologue(frame_size);

        for statement in body {
            self.generate_statement(&mut function, statement)?;
        }

        // Fall-through exit; redundant after a trailing return but harmless
        self.assembler.function_epilogue();
        self.assembler.blank_line();

        Ok(())
    }

    fn generate_statement(
        &mut self,
        f: &mut FunctionState<'p>,
        statement: &'p Statement,
    ) -> Result<(), FatalError> {
        match &statement.kind {
            StatementKind::Declaration(declaration) => self.generate_local(f, declaration)?,
            StatementKind::Expression(expression) => {
                self.generate_expression_effect(f, expression)?;
            }
            StatementKind::If {
                condition,
                then_body,
                else_body,
            } => {
                let end_label = self.next_label();
                let false_label = match else_body {
                    Some(_) => self.next_label(),
                    None => end_label.clone(),
                };

                self.generate_condition(f, condition, &false_label)?;
                for statement in then_body {
                    self.generate_statement(f, statement)?;
                }

                if let Some(else_body) = else_body {
                    self.assembler.emit(format!("jmp {end_label}"));
                    self.assembler.label(&false_label);

                    for statement in else_body {
                        self.generate_statement(f, statement)?;
                    }
                }

                self.assembler.label(&end_label);
            }
            StatementKind::While { condition, body } => {
                let top_label = self.next_label();
                let end_label = self.next_label();

                self.assembler.label(&top_label);
                self.generate_condition(f, condition, &end_label)?;

                for statement in body {
                    self.generate_statement(f, statement)?;
                }

                self.assembler.emit(format!("jmp {top_label}"));
                self.assembler.label(&end_label);
            }
            StatementKind::For {
                initializer,
                condition,
                update,
                body,
            } => {
                if let Some(initializer) = initializer {
                    self.generate_expression_effect(f, initializer)?;
                }

                let top_label = self.next_label();
                let end_label = self.next_label();

                self.assembler.label(&top_label);
                if let Some(condition) = condition {
                    self.generate_condition(f, condition, &end_label)?;
                }

                for statement in body {
                    self.generate_statement(f, statement)?;
                }

                if let Some(update) = update {
                    self.generate_expression_effect(f, update)?;
                }

                self.assembler.emit(format!("jmp {top_label}"));
                self.assembler.label(&end_label);
            }
            StatementKind::Return(value) => {
                if let Some(value) = value
                    && let Some(root) = self.prepare_expression(f, value)
                {
                    let register = self.generate_node(f, root)?;
                    self.assembler.emit(format!("mov rax, {register}"));
                    self.release_operand(f, root, register);
                }

                debug_assert!(
                    f.registers.none_used(),
                    "registers leaked while generating a return in `{}`",
                    f.name
                );
                self.assembler.function_epilogue();
            }
            StatementKind::Block(body) => {
                for statement in body {
                    self.generate_statement(f, statement)?;
                }
            }
        }

        Ok(())
    }

    fn generate_local(
        &mut self,
        f: &mut FunctionState<'p>,
        declaration: &'p Declaration,
    ) -> Result<(), FatalError> {
        let Some(symbol) = self.resolution.symbol_of_declaration(declaration.id).cloned() else {
            // A redeclaration; the first binding already owns the storage
            return Ok(());
        };
        let Some(initializer) = &declaration.initializer else {
            return Ok(());
        };

        if let ExpressionKind::InitializerList(elements) = &initializer.kind {
            let SymbolKind::Local { offset } = symbol.kind else {
                return Ok(());
            };
            let element_size = symbol
                .ty
                .element_type()
                .map_or(WORD_SIZE, Type::size_in_bytes);

            // Element 0 sits at the array's lowest address, [rbp - offset]
            for (position, element) in elements.iter().enumerate() {
                let Some(root) = self.prepare_expression(f, element) else {
                    continue;
                };
                let register = self.generate_node(f, root)?;
                let slot = offset - position * element_size;

                if element_size == 1 {
                    self.assembler
                        .emit(format!("mov byte [rbp - {slot}], {}", register.as_8_bit()));
                } else {
                    self.assembler.emit(format!("mov [rbp - {slot}], {register}"));
                }

                self.release_operand(f, root, register);
            }
        } else {
            let Some(root) = self.prepare_expression(f, initializer) else {
                return Ok(());
            };
            let register = self.generate_node(f, root)?;
            self.store_to_symbol(&symbol, register);
            self.release_operand(f, root, register);
        }

        debug_assert!(
            f.registers.none_used(),
            "registers leaked while initializing `{}`",
            declaration.name
        );
        Ok(())
    }

    /// Generates an expression for its side effects and discards the value
    fn generate_expression_effect(
        &mut self,
        f: &mut FunctionState<'p>,
        expression: &'p Expression,
    ) -> Result<(), FatalError> {
        if let Some(root) = self.prepare_expression(f, expression) {
            let register = self.generate_node(f, root)?;
            self.release_operand(f, root, register);
        }

        debug_assert!(
            f.registers.none_used(),
            "registers leaked while generating an expression statement in `{}`",
            f.name
        );
        Ok(())
    }

    /// Generates a condition that falls through into the guarded body and
    /// jumps to `false_label` otherwise
    fn generate_condition(
        &mut self,
        f: &mut FunctionState<'p>,
        condition: &'p Expression,
        false_label: &str,
    ) -> Result<(), FatalError> {
        let Some(root) = self.prepare_expression(f, condition) else {
            // The condition was rejected while building its DAG; fall
            // through so the rest of the function still gets generated
            return Ok(());
        };

        let node = f.pool.get(root).clone();
        if node.kind.is_comparison() {
            let lhs = node.lhs.expect("comparisons have a left operand");
            let rhs = node.rhs.expect("comparisons have a right operand");

            let left = self.generate_node(f, lhs)?;
            let right = self.generate_node(f, rhs)?;

            self.assembler.emit(format!("cmp {left}, {right}"));
            self.assembler
                .emit(format!("{} {false_label}", inverted_jump(node.kind)));

            self.release_operand(f, lhs, left);
            self.release_operand(f, rhs, right);
            self.skip_operand(f, root);
        } else {
            let register = self.generate_node(f, root)?;
            self.assembler.emit(format!("cmp {register}, 0"));
            self.assembler.emit(format!("je {false_label}"));
            self.release_operand(f, root, register);
        }

        debug_assert!(
            f.registers.none_used(),
            "registers leaked while generating a condition in `{}`",
            f.name
        );
        Ok(())
    }

    /* Expressions */

    /// Canonicalizes one full expression into the function's pool and plans
    /// register consumption for the generation that follows. `None` means
    /// the expression was rejected (constant division by zero) and its code
    /// must be skipped.
    fn prepare_expression(
        &mut self,
        f: &mut FunctionState<'p>,
        expression: &'p Expression,
    ) -> Option<DagNodeId> {
        let root = dag::build_expression(&mut f.pool, self.resolution, expression, &mut self.diagnostics)?;

        f.remaining_uses = UsePlan::expression(&f.pool, root);
        f.cache.clear();

        Some(root)
    }

    /// Materializes one DAG node's value into a register. The caller owns
    /// one consumption of the result and must pass it to
    /// [`Self::claim_operand`] or [`Self::release_operand`].
    fn generate_node(
        &mut self,
        f: &mut FunctionState<'p>,
        id: DagNodeId,
    ) -> Result<Register, FatalError> {
        if let Some(&register) = f.cache.get(&id) {
            return Ok(register);
        }

        let node = f.pool.get(id).clone();
        let register = match node.kind {
            DagKind::IntegerLiteral => {
                let DagPayload::Integer(value) = node.payload else {
                    unreachable!("integer literals carry an integer payload");
                };
                let register = self.alloc(f)?;
                self.assembler.emit(format!("mov {register}, {value}"));
                register
            }
            DagKind::CharacterLiteral => {
                let DagPayload::Character(value) = node.payload else {
                    unreachable!("character literals carry a character payload");
                };
                let register = self.alloc(f)?;
                self.assembler.emit(format!("mov {register}, {}", value as u32));
                register
            }
            DagKind::BooleanLiteral => {
                let DagPayload::Boolean(value) = node.payload else {
                    unreachable!("boolean literals carry a boolean payload");
                };
                let register = self.alloc(f)?;
                self.assembler.emit(format!("mov {register}, {}", value as i64));
                register
            }
            DagKind::StringLiteral => {
                let DagPayload::Text(text) = &node.payload else {
                    unreachable!("string literals carry their contents");
                };
                let label = self.intern_string(text);
                let register = self.alloc(f)?;
                self.assembler.emit(format!("lea {register}, [{label}]"));
                register
            }
            DagKind::Name => self.generate_name_load(f, &node)?,
            DagKind::Add | DagKind::Subtract | DagKind::Multiply => {
                let lhs = node.lhs.expect("binary nodes have a left operand");
                let rhs = node.rhs.expect("binary nodes have a right operand");

                let left = self.generate_node(f, lhs)?;
                let right = self.generate_node(f, rhs)?;

                let instruction = match node.kind {
                    DagKind::Add => "add",
                    DagKind::Subtract => "sub",
                    _ => "imul",
                };

                let destination = self.claim_operand(f, lhs, left)?;
                self.assembler.emit(format!("{instruction} {destination}, {right}"));
                self.release_operand(f, rhs, right);
                destination
            }
            DagKind::Divide => {
                let lhs = node.lhs.expect("divisions have a left operand");
                let rhs = node.rhs.expect("divisions have a right operand");

                let left = self.generate_node(f, lhs)?;
                let right = self.generate_node(f, rhs)?;

                // idiv takes the dividend in rdx:rax and clobbers both
                self.assembler.emit(format!("mov rax, {left}"));
                self.assembler.emit("cqo");
                self.assembler.emit(format!("idiv {right}"));

                let destination = self.claim_operand(f, lhs, left)?;
                self.release_operand(f, rhs, right);
                self.assembler.emit(format!("mov {destination}, rax"));
                destination
            }
            DagKind::Equals
            | DagKind::NotEquals
            | DagKind::LessThan
            | DagKind::LessThanOrEqualTo
            | DagKind::GreaterThan
            | DagKind::GreaterThanOrEqualTo => {
                let lhs = node.lhs.expect("comparisons have a left operand");
                let rhs = node.rhs.expect("comparisons have a right operand");

                let left = self.generate_node(f, lhs)?;
                let right = self.generate_node(f, rhs)?;

                self.assembler.emit(format!("cmp {left}, {right}"));

                // Claiming may move the operand; mov preserves the flags
                let destination = self.claim_operand(f, lhs, left)?;
                self.release_operand(f, rhs, right);

                let true_label = self.next_label();
                let end_label = self.next_label();

                self.assembler
                    .emit(format!("{} {true_label}", comparison_jump(node.kind)));
                self.assembler.emit(format!("mov {destination}, 0"));
                self.assembler.emit(format!("jmp {end_label}"));
                self.assembler.label(&true_label);
                self.assembler.emit(format!("mov {destination}, 1"));
                self.assembler.label(&end_label);

                destination
            }
            DagKind::Assign => self.generate_assignment(f, &node)?,
            DagKind::AddAssign | DagKind::SubtractAssign => {
                self.generate_compound_assignment(f, &node)?
            }
            DagKind::Increment | DagKind::Decrement => self.generate_step(f, &node)?,
            DagKind::Subscript => {
                let element_size = self.value_type(&f.pool, id).size_in_bytes();
                let address = self.generate_subscript_address(f, &node)?;

                if element_size == 1 {
                    self.assembler
                        .emit(format!("movzx {address}, byte [{address}]"));
                } else {
                    self.assembler.emit(format!("mov {address}, [{address}]"));
                }

                address
            }
            DagKind::Call => self.generate_call(f, &node)?,
            DagKind::Argument => unreachable!("argument nodes are traversed by their call"),
        };

        // Pin values that are still wanted after the caller's consumption
        if f.remaining_uses.get(&id).copied().unwrap_or(0) > 1 {
            f.cache.insert(id, register);
        }

        Ok(register)
    }

    fn generate_name_load(
        &mut self,
        f: &mut FunctionState<'p>,
        node: &DagNode,
    ) -> Result<Register, FatalError> {
        let DagPayload::Name { symbol, .. } = &node.payload else {
            unreachable!("name nodes carry a name payload");
        };

        let register = self.alloc(f)?;
        let Some(symbol_id) = symbol else {
            // Unresolved names only survive on error paths whose assembly is
            // discarded; keep the register defined anyway
            self.assembler.emit(format!("mov {register}, 0"));
            return Ok(register);
        };
        let symbol = self.resolution.symbols.get(*symbol_id).clone();

        if symbol.ty.is_array() {
            match symbol.kind {
                SymbolKind::Local { offset } => {
                    self.assembler.emit(format!("lea {register}, [rbp - {offset}]"));
                }
                // Array parameters are passed as a pointer word
                SymbolKind::Param { index } => {
                    self.assembler
                        .emit(format!("mov {register}, [rbp + {}]", parameter_offset(index)));
                }
                SymbolKind::Global => {
                    self.assembler.emit(format!("lea {register}, [{}]", symbol.name));
                }
            }
        } else if symbol.ty.size_in_bytes() == 1 {
            self.assembler
                .emit(format!("movzx {register}, byte {}", memory_operand(&symbol)));
        } else {
            self.assembler
                .emit(format!("mov {register}, {}", memory_operand(&symbol)));
        }

        Ok(register)
    }

    /// Computes the address of a subscripted element into a register the
    /// caller owns outright (it is never cached) and must free
    fn generate_subscript_address(
        &mut self,
        f: &mut FunctionState<'p>,
        node: &DagNode,
    ) -> Result<Register, FatalError> {
        let base_id = node.lhs.expect("subscripts have a base");
        let index_id = node.rhs.expect("subscripts have an index");

        let element_size = self
            .value_type(&f.pool, base_id)
            .element_type()
            .map_or(WORD_SIZE, Type::size_in_bytes);

        let base = self.generate_node(f, base_id)?;
        let index = self.generate_node(f, index_id)?;
        let address = self.claim_operand(f, base_id, base)?;

        match element_size {
            1 | 2 | 4 | 8 => {
                self.assembler.emit(format!(
                    "lea {address}, [{address} + {index} * {element_size}]"
                ));
                self.release_operand(f, index_id, index);
            }
            _ => {
                let scaled = self.claim_operand(f, index_id, index)?;
                self.assembler.emit(format!("imul {scaled}, {element_size}"));
                self.assembler.emit(format!("add {address}, {scaled}"));
                f.registers.free(scaled);
            }
        }

        Ok(address)
    }

    fn generate_assignment(
        &mut self,
        f: &mut FunctionState<'p>,
        node: &DagNode,
    ) -> Result<Register, FatalError> {
        let target_id = node.lhs.expect("assignments have a target");
        let value_id = node.rhs.expect("assignments carry a value");

        let value = self.generate_node(f, value_id)?;
        let target = f.pool.get(target_id).clone();

        match target.kind {
            DagKind::Name => {
                if let DagPayload::Name {
                    symbol: Some(symbol_id),
                    ..
                } = &target.payload
                {
                    let symbol = self.resolution.symbols.get(*symbol_id).clone();
                    self.store_to_symbol(&symbol, value);
                }
                self.skip_operand(f, target_id);
            }
            DagKind::Subscript => {
                let element_size = self.value_type(&f.pool, target_id).size_in_bytes();
                let address = self.generate_subscript_address(f, &target)?;

                if element_size == 1 {
                    self.assembler
                        .emit(format!("mov byte [{address}], {}", value.as_8_bit()));
                } else {
                    self.assembler.emit(format!("mov [{address}], {value}"));
                }

                f.registers.free(address);
                self.skip_operand(f, target_id);
            }
            // The checker rejects every other target shape
            _ => self.skip_operand(f, target_id),
        }

        // The assignment's value is the assigned value
        self.claim_operand(f, value_id, value)
    }

    fn generate_compound_assignment(
        &mut self,
        f: &mut FunctionState<'p>,
        node: &DagNode,
    ) -> Result<Register, FatalError> {
        let target_id = node.lhs.expect("compound assignments have a target");
        let value_id = node.rhs.expect("compound assignments carry a value");

        let instruction = match node.kind {
            DagKind::AddAssign => "add",
            _ => "sub",
        };

        let value = self.generate_node(f, value_id)?;
        let target = f.pool.get(target_id).clone();

        match target.kind {
            DagKind::Name => {
                if let DagPayload::Name {
                    symbol: Some(symbol_id),
                    ..
                } = &target.payload
                {
                    let symbol = self.resolution.symbols.get(*symbol_id).clone();
                    let operand = memory_operand(&symbol);
                    self.assembler.emit(format!("{instruction} {operand}, {value}"));

                    let destination = self.claim_operand(f, value_id, value)?;
                    self.assembler.emit(format!("mov {destination}, {operand}"));
                    self.skip_operand(f, target_id);
                    return Ok(destination);
                }

                self.skip_operand(f, target_id);
                self.claim_operand(f, value_id, value)
            }
            DagKind::Subscript => {
                let address = self.generate_subscript_address(f, &target)?;
                self.assembler
                    .emit(format!("{instruction} [{address}], {value}"));

                let destination = self.claim_operand(f, value_id, value)?;
                self.assembler.emit(format!("mov {destination}, [{address}]"));

                f.registers.free(address);
                self.skip_operand(f, target_id);
                Ok(destination)
            }
            _ => {
                self.skip_operand(f, target_id);
                self.claim_operand(f, value_id, value)
            }
        }
    }

    /// `a++` / `a--`: the expression's value is the value before the step
    fn generate_step(
        &mut self,
        f: &mut FunctionState<'p>,
        node: &DagNode,
    ) -> Result<Register, FatalError> {
        let target_id = node.lhs.expect("increments have a target");

        let instruction = match node.kind {
            DagKind::Increment => "inc",
            _ => "dec",
        };

        let target = f.pool.get(target_id).clone();
        match target.kind {
            DagKind::Name => {
                let register = self.alloc(f)?;

                if let DagPayload::Name {
                    symbol: Some(symbol_id),
                    ..
                } = &target.payload
                {
                    let symbol = self.resolution.symbols.get(*symbol_id).clone();
                    let operand = memory_operand(&symbol);
                    self.assembler.emit(format!("mov {register}, {operand}"));
                    self.assembler.emit(format!("{instruction} qword {operand}"));
                } else {
                    self.assembler.emit(format!("mov {register}, 0"));
                }

                self.skip_operand(f, target_id);
                Ok(register)
            }
            DagKind::Subscript => {
                let address = self.generate_subscript_address(f, &target)?;
                let register = self.alloc(f)?;

                self.assembler.emit(format!("mov {register}, [{address}]"));
                self.assembler.emit(format!("{instruction} qword [{address}]"));

                f.registers.free(address);
                self.skip_operand(f, target_id);
                Ok(register)
            }
            _ => {
                let register = self.alloc(f)?;
                self.assembler.emit(format!("mov {register}, 0"));
                self.skip_operand(f, target_id);
                Ok(register)
            }
        }
    }

    fn generate_call(
        &mut self,
        f: &mut FunctionState<'p>,
        node: &DagNode,
    ) -> Result<Register, FatalError> {
        // Evaluate arguments left to right, head of the chain first
        let mut arguments: Vec<(DagNodeId, Register)> = Vec::new();
        let mut chain = node.lhs;
        while let Some(argument_id) = chain {
            let argument = f.pool.get(argument_id).clone();
            let value_id = argument.lhs.expect("argument nodes carry a value");

            let register = self.generate_node(f, value_id)?;
            arguments.push((value_id, register));

            self.skip_operand(f, argument_id);
            chain = argument.rhs;
        }

        // Releasing emits nothing, so the argument values stay intact in
        // their registers until they are pushed below. Whatever is still
        // live afterwards has to survive the call; the callee may clobber
        // any pool register.
        for (value_id, register) in &arguments {
            self.release_operand(f, *value_id, *register);
        }
        let saved = f.registers.live();
        for register in &saved {
            self.assembler.emit(format!("push {register}"));
        }

        // Push right to left so argument 0 sits nearest the frame base
        for (_, register) in arguments.iter().rev() {
            self.assembler.emit(format!("push {register}"));
        }

        let DagPayload::Name { text, .. } = &node.payload else {
            unreachable!("call nodes carry the callee name");
        };
        self.assembler.emit(format!("call {text}"));

        if !arguments.is_empty() {
            self.assembler
                .emit(format!("add rsp, {}", arguments.len() * WORD_SIZE));
        }
        for register in saved.iter().rev() {
            self.assembler.emit(format!("pop {register}"));
        }

        let register = self.alloc(f)?;
        self.assembler.emit(format!("mov {register}, rax"));
        Ok(register)
    }

    /* Register bookkeeping */

    fn alloc(&mut self, f: &mut FunctionState<'p>) -> Result<Register, FatalError> {
        alloc_or_exhausted(&mut f.registers, f.name)
    }

    /// Consumes one planned use and hands the caller a register it may
    /// clobber: the operand's own register on its last use, a copy otherwise
    fn claim_operand(
        &mut self,
        f: &mut FunctionState<'p>,
        id: DagNodeId,
        register: Register,
    ) -> Result<Register, FatalError> {
        let remaining = f
            .remaining_uses
            .get_mut(&id)
            .expect("claimed an operand that was never planned");
        *remaining -= 1;

        if *remaining == 0 {
            f.cache.remove(&id);
            Ok(register)
        } else {
            let copy = alloc_or_exhausted(&mut f.registers, f.name)?;
            self.assembler.emit(format!("mov {copy}, {register}"));
            Ok(copy)
        }
    }

    /// Consumes one planned use without clobbering; frees the register on
    /// the operand's last use
    fn release_operand(&mut self, f: &mut FunctionState<'p>, id: DagNodeId, register: Register) {
        let remaining = f
            .remaining_uses
            .get_mut(&id)
            .expect("released an operand that was never planned");
        *remaining -= 1;

        if *remaining == 0 {
            f.cache.remove(&id);
            f.registers.free(register);
        }
    }

    /// Consumes one planned use of a node whose value was never
    /// materialized by this consumer (mutation targets, argument links)
    fn skip_operand(&mut self, f: &mut FunctionState<'p>, id: DagNodeId) {
        let remaining = f
            .remaining_uses
            .get_mut(&id)
            .expect("skipped an operand that was never planned");
        *remaining -= 1;

        if *remaining == 0
            && let Some(register) = f.cache.remove(&id)
        {
            f.registers.free(register);
        }
    }

    fn store_to_symbol(&mut self, symbol: &Symbol, register: Register) {
        let operand = memory_operand(symbol);

        if symbol.ty.size_in_bytes() == 1 {
            self.assembler
                .emit(format!("mov byte {operand}, {}", register.as_8_bit()));
        } else {
            self.assembler.emit(format!("mov {operand}, {register}"));
        }
    }

    /// Type of a DAG node's runtime value, recovered from resolved symbols
    fn value_type(&self, pool: &DagPool, id: DagNodeId) -> Type {
        let node = pool.get(id);

        match node.kind {
            DagKind::Name => match &node.payload {
                DagPayload::Name {
                    symbol: Some(symbol_id),
                    ..
                } => self.resolution.symbols.get(*symbol_id).ty.clone(),
                _ => Type::Unknown,
            },
            DagKind::IntegerLiteral => Type::Integer,
            DagKind::CharacterLiteral => Type::Character,
            DagKind::BooleanLiteral => Type::Boolean,
            DagKind::StringLiteral => Type::String,
            DagKind::Add
            | DagKind::Subtract
            | DagKind::Multiply
            | DagKind::Divide
            | DagKind::AddAssign
            | DagKind::SubtractAssign
            | DagKind::Increment
            | DagKind::Decrement => Type::Integer,
            DagKind::Equals
            | DagKind::NotEquals
            | DagKind::LessThan
            | DagKind::LessThanOrEqualTo
            | DagKind::GreaterThan
            | DagKind::GreaterThanOrEqualTo => Type::Boolean,
            DagKind::Assign => node
                .rhs
                .map_or(Type::Unknown, |value| self.value_type(pool, value)),
            DagKind::Subscript => node
                .lhs
                .map(|base| self.value_type(pool, base))
                .and_then(|ty| ty.element_type().cloned())
                .unwrap_or(Type::Unknown),
            DagKind::Call => match &node.payload {
                DagPayload::Name {
                    symbol: Some(symbol_id),
                    ..
                } => self
                    .resolution
                    .symbols
                    .get(*symbol_id)
                    .ty
                    .return_type()
                    .cloned()
                    .unwrap_or(Type::Unknown),
                _ => Type::Unknown,
            },
            DagKind::Argument => Type::Unknown,
        }
    }
}

/// Jump taken when the comparison holds
fn comparison_jump(kind: DagKind) -> &'static str {
    match kind {
        DagKind::Equals => "je",
        DagKind::NotEquals => "jne",
        DagKind::LessThan => "jl",
        DagKind::LessThanOrEqualTo => "jle",
        DagKind::GreaterThan => "jg",
        DagKind::GreaterThanOrEqualTo => "jge",
        _ => unreachable!("only comparisons have a branch form"),
    }
}

/// Jump taken when the comparison fails; used to branch around a guarded
/// body
fn inverted_jump(kind: DagKind) -> &'static str {
    match kind {
        DagKind::Equals => "jne",
        DagKind::NotEquals => "je",
        DagKind::LessThan => "jge",
        DagKind::LessThanOrEqualTo => "jg",
        DagKind::GreaterThan => "jle",
        DagKind::GreaterThanOrEqualTo => "jl",
        _ => unreachable!("only comparisons have a branch form"),
    }
}
