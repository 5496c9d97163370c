//! Name resolution.
//!
//! Walks the program in declaration order, binding every declared name into
//! the scope stack and every name reference to a [`SymbolId`] in a side
//! table. Storage layout happens here too: locals get byte offsets from the
//! frame base in declaration order, parameters get positional indices, and
//! each function symbol ends up with its total 16-byte aligned frame size.
//!
//! Resolution is best-effort: an unresolved name or a redeclaration is
//! reported and the walk continues, leaving the reference unset (downstream
//! passes substitute `Type::Unknown`) or keeping the first binding.

use std::collections::BTreeMap;

use crate::{
    ast::{Declaration, Expression, ExpressionKind, NodeId, Program, Statement, StatementKind},
    diagnostics::{DiagnosticKind, Diagnostics},
    middle::{
        symbols::{ScopeStack, Symbol, SymbolId, SymbolKind, SymbolTable},
        ty::WORD_SIZE,
    },
};

/// Stack frames are kept 16-byte aligned per the System V ABI
const FRAME_ALIGNMENT: usize = 16;

pub fn align_to(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

#[derive(Debug)]
pub struct Resolution {
    /// Every symbol created during resolution; global symbols live for the
    /// whole compilation, locals stay reachable here after their scope pops
    pub symbols: SymbolTable,
    /// Maps name references (Name expressions) to their resolved symbol. A
    /// reference that failed to resolve has no entry.
    pub uses: BTreeMap<NodeId, SymbolId>,
    /// Maps declaration nodes to the symbol they created
    pub declarations: BTreeMap<NodeId, SymbolId>,
    pub diagnostics: Diagnostics,
}

impl Resolution {
    /// Resolved symbol of a name reference, if resolution succeeded
    pub fn symbol_of(&self, id: NodeId) -> Option<&Symbol> {
        self.uses.get(&id).map(|&sid| self.symbols.get(sid))
    }

    pub fn symbol_of_declaration(&self, id: NodeId) -> Option<&Symbol> {
        self.declarations.get(&id).map(|&sid| self.symbols.get(sid))
    }
}

#[derive(Debug)]
pub struct Resolver<'program> {
    program: &'program Program,
    scopes: ScopeStack,
    symbols: SymbolTable,
    uses: BTreeMap<NodeId, SymbolId>,
    declarations: BTreeMap<NodeId, SymbolId>,
    diagnostics: Diagnostics,
    /// Running total of local bytes assigned in the current function; resets
    /// at every function declaration
    local_bytes: usize,
}

impl<'program> Resolver<'program> {
    pub fn resolve_program(program: &'program Program) -> Resolution {
        let mut resolver = Self {
            program,
            scopes: ScopeStack::new(),
            symbols: SymbolTable::new(),
            uses: BTreeMap::new(),
            declarations: BTreeMap::new(),
            diagnostics: Diagnostics::new(),
            local_bytes: 0,
        };

        for declaration in &resolver.program.declarations {
            resolver.resolve_declaration(declaration);
        }

        Resolution {
            symbols: resolver.symbols,
            uses: resolver.uses,
            declarations: resolver.declarations,
            diagnostics: resolver.diagnostics,
        }
    }

    fn resolve_declaration(&mut self, declaration: &Declaration) {
        debug_assert!(
            !declaration.name.is_empty(),
            "parser produced an unnamed declaration"
        );

        // Check that the name is not already bound in the current scope
        // (allowed to be bound in enclosing scopes and shadowed here).
        // Exception: a function prototype and a structurally equal
        // declaration of the same function merge into one symbol, so a
        // forward prototype can precede its definition and mutual recursion
        // works.

        if let Some(existing_id) = self.scopes.lookup_current(&declaration.name) {
            let existing = self.symbols.get(existing_id);
            let merges = declaration.ty.is_function()
                && existing.ty == declaration.ty
                && (declaration.body.is_none() || existing.frame_size.is_none());

            if merges {
                self.declarations.insert(declaration.id, existing_id);
                self.resolve_function_scopes(declaration, Some(existing_id));
                return;
            }
            self.diagnostics.report(
                DiagnosticKind::Redeclaration,
                format!(
                    "`{}` is already declared in this scope; the first declaration stays in effect",
                    declaration.name
                ),
            );

            // The first binding stays authoritative, but the initializer and
            // body still get resolved so their own names are diagnosed
            if let Some(initializer) = &declaration.initializer {
                self.resolve_expression(initializer);
            }
            if declaration.ty.is_function() {
                self.resolve_function_scopes(declaration, None);
            }

            return;
        }

        let kind = if self.scopes.is_global() {
            SymbolKind::Global
        } else {
            // The offset is the running total including this symbol's own
            // size, so `[rbp - offset]` addresses its lowest byte and never
            // overlaps the saved frame pointer
            self.local_bytes += declaration.ty.size_in_bytes();
            SymbolKind::Local {
                offset: self.local_bytes,
            }
        };

        let symbol = Symbol::new(kind, &declaration.name, declaration.ty.clone());
        let id = self.symbols.insert(symbol);

        self.scopes.bind(&declaration.name, id);
        self.declarations.insert(declaration.id, id);

        if declaration.ty.is_function() {
            self.resolve_function_scopes(declaration, Some(id));
        } else if let Some(initializer) = &declaration.initializer {
            self.resolve_expression(initializer);
        }
    }

    /// Opens the two scopes a function declaration introduces — one for
    /// parameters, one for the body — so a parameter and a local can never
    /// collide, then records the accumulated frame size on the function
    /// symbol.
    fn resolve_function_scopes(&mut self, declaration: &Declaration, symbol: Option<SymbolId>) {
        let saved_local_bytes = std::mem::replace(&mut self.local_bytes, 0);

        let parameters = declaration.ty.parameters().unwrap_or(&[]);

        self.scopes.enter_scope();

        for (index, parameter) in parameters.iter().enumerate() {
            if self.scopes.lookup_current(&parameter.name).is_some() {
                self.diagnostics.report(
                    DiagnosticKind::Redeclaration,
                    format!(
                        "duplicate parameter `{}` in function `{}`",
                        parameter.name, declaration.name
                    ),
                );
                continue;
            }

            let id = self.symbols.insert(Symbol::new(
                SymbolKind::Param { index },
                &parameter.name,
                parameter.ty.clone(),
            ));
            self.scopes.bind(&parameter.name, id);
        }

        if let Some(body) = &declaration.body {
            self.scopes.enter_scope();

            for statement in body {
                self.resolve_statement(statement);
            }

            self.scopes.exit_scope();

            // Parameters count one word each toward the reservation even
            // though they live above the frame base
            let frame_size = align_to(
                self.local_bytes + parameters.len() * WORD_SIZE,
                FRAME_ALIGNMENT,
            );

            if let Some(id) = symbol {
                self.symbols.get_mut(id).frame_size = Some(frame_size);
            }
        }

        self.scopes.exit_scope();
        self.local_bytes = saved_local_bytes;
    }

    fn resolve_statement(&mut self, statement: &Statement) {
        match &statement.kind {
            StatementKind::Declaration(declaration) => self.resolve_declaration(declaration),
            StatementKind::Expression(expression) => self.resolve_expression(expression),
            StatementKind::If {
                condition,
                then_body,
                else_body,
            } => {
                self.resolve_expression(condition);
                self.resolve_body(then_body);

                if let Some(else_body) = else_body {
                    self.resolve_body(else_body);
                }
            }
            StatementKind::While { condition, body } => {
                self.resolve_expression(condition);
                self.resolve_body(body);
            }
            StatementKind::For {
                initializer,
                condition,
                update,
                body,
            } => {
                for expression in [initializer, condition, update].into_iter().flatten() {
                    self.resolve_expression(expression);
                }

                self.resolve_body(body);
            }
            StatementKind::Return(value) => {
                if let Some(value) = value {
                    self.resolve_expression(value);
                }
            }
            StatementKind::Block(body) => self.resolve_body(body),
        }
    }

    /// Every control construct body gets exactly one scope, reachable or not
    fn resolve_body(&mut self, body: &[Statement]) {
        self.scopes.enter_scope();

        for statement in body {
            self.resolve_statement(statement);
        }

        self.scopes.exit_scope();
    }

    fn resolve_expression(&mut self, expression: &Expression) {
        match &expression.kind {
            ExpressionKind::Name(name) => match self.scopes.lookup(name) {
                Some(id) => {
                    self.uses.insert(expression.id, id);
                }
                None => {
                    // Leave the reference unset; downstream passes treat an
                    // unset symbol as Unknown instead of dereferencing it
                    self.diagnostics.report(
                        DiagnosticKind::Lookup,
                        format!("use of undeclared identifier `{name}`"),
                    );
                }
            },
            ExpressionKind::IntegerLiteral(_)
            | ExpressionKind::CharacterLiteral(_)
            | ExpressionKind::BooleanLiteral(_)
            | ExpressionKind::StringLiteral(_) => {}
            ExpressionKind::Binary { lhs, rhs, .. } => {
                self.resolve_expression(lhs);
                self.resolve_expression(rhs);
            }
            ExpressionKind::Assignment { lhs, rhs }
            | ExpressionKind::OperatorAssignment { lhs, rhs, .. } => {
                self.resolve_expression(rhs);
                self.resolve_expression(lhs);
            }
            ExpressionKind::Increment(operand) | ExpressionKind::Decrement(operand) => {
                self.resolve_expression(operand);
            }
            ExpressionKind::Subscript { array, index } => {
                self.resolve_expression(array);
                self.resolve_expression(index);
            }
            ExpressionKind::FunctionCall {
                function,
                arguments,
            } => {
                self.resolve_expression(function);

                for argument in arguments {
                    self.resolve_expression(argument);
                }
            }
            ExpressionKind::InitializerList(elements) => {
                for element in elements {
                    self.resolve_expression(element);
                }
            }
        }
    }
}
