//! Static type checking.
//!
//! `infer` walks each expression bottom-up and produces a fresh, owned
//! [`Type`]; the caller owns every temporary and releases it by dropping it.
//! Violations are reported per occurrence and checking continues with
//! `Type::Unknown`, which is deliberately non-cascading: an operand that is
//! already `Unknown` has been reported once and produces no further
//! diagnostics for the same subtree.

use std::collections::BTreeMap;

use crate::{
    ast::{
        BinaryOperatorKind, Declaration, Expression, ExpressionKind, NodeId, Program, Statement,
        StatementKind,
    },
    diagnostics::{DiagnosticKind, Diagnostics},
    middle::{resolve::Resolution, ty::Type},
};

#[derive(Debug)]
pub struct TypeCheckResults {
    /// Inferred type of every checked expression
    pub expression_types: BTreeMap<NodeId, Type>,
    pub diagnostics: Diagnostics,
}

impl TypeCheckResults {
    pub fn type_of(&self, id: NodeId) -> &Type {
        self.expression_types.get(&id).unwrap_or(&Type::Unknown)
    }
}

/// The declared return contract of the function body being checked
struct EnclosingFunction<'a> {
    name: &'a str,
    returns: &'a Type,
}

pub struct TypeChecker<'a> {
    program: &'a Program,
    resolution: &'a Resolution,
    expression_types: BTreeMap<NodeId, Type>,
    diagnostics: Diagnostics,
}

impl<'a> TypeChecker<'a> {
    pub fn check_program(program: &'a Program, resolution: &'a Resolution) -> TypeCheckResults {
        let mut checker = Self {
            program,
            resolution,
            expression_types: BTreeMap::new(),
            diagnostics: Diagnostics::new(),
        };

        for declaration in &checker.program.declarations {
            checker.check_declaration(declaration);
        }

        TypeCheckResults {
            expression_types: checker.expression_types,
            diagnostics: checker.diagnostics,
        }
    }

    fn report(&mut self, kind: DiagnosticKind, message: String) {
        self.diagnostics.report(kind, message);
    }

    fn check_declaration(&mut self, declaration: &Declaration) {
        if declaration.ty.is_function() {
            if let Some(body) = &declaration.body {
                let returns = declaration
                    .ty
                    .return_type()
                    .expect("function types always carry a return type");
                let enclosing = EnclosingFunction {
                    name: &declaration.name,
                    returns,
                };

                for statement in body {
                    self.check_statement(statement, &enclosing);
                }
            }

            return;
        }

        let Some(initializer) = &declaration.initializer else {
            return;
        };

        if let ExpressionKind::InitializerList(elements) = &initializer.kind {
            self.check_initializer_list(declaration, initializer, elements);
        } else {
            let found = self.infer(initializer);

            if !found.is_unknown() && found != declaration.ty {
                self.report(
                    DiagnosticKind::TypeMismatch,
                    format!(
                        "cannot initialize `{}` of type `{}` with a value of type `{found}`",
                        declaration.name, declaration.ty
                    ),
                );
            }
        }

        // Globals are emitted as data directives, so their initializers must
        // be compile time constants
        if self.is_global_declaration(declaration) && !is_constant_expression(initializer) {
            self.report(
                DiagnosticKind::TypeMismatch,
                format!(
                    "global initializer for `{}` must be a constant expression",
                    declaration.name
                ),
            );
        }
    }

    fn check_initializer_list(
        &mut self,
        declaration: &Declaration,
        initializer: &Expression,
        elements: &[Expression],
    ) {
        let Type::Array { element, length } = &declaration.ty else {
            self.report(
                DiagnosticKind::TypeMismatch,
                format!(
                    "initializer list is only allowed for arrays, but `{}` has type `{}`",
                    declaration.name, declaration.ty
                ),
            );

            for element in elements {
                drop(self.infer(element));
            }

            return;
        };

        if elements.len() != *length {
            self.report(
                DiagnosticKind::TypeMismatch,
                format!(
                    "initializer for `{}` has {} elements but the array length is {length}",
                    declaration.name,
                    elements.len()
                ),
            );
        }

        for (position, value) in elements.iter().enumerate() {
            let found = self.infer(value);

            if !found.is_unknown() && found != **element {
                self.report(
                    DiagnosticKind::TypeMismatch,
                    format!(
                        "element {} of `{}`: expected `{element}`, found `{found}`",
                        position + 1,
                        declaration.name
                    ),
                );
            }
        }

        self.expression_types
            .insert(initializer.id, declaration.ty.clone());
    }

    fn is_global_declaration(&self, declaration: &Declaration) -> bool {
        self.resolution
            .symbol_of_declaration(declaration.id)
            .is_some_and(|symbol| symbol.is_global())
    }

    fn check_statement(&mut self, statement: &Statement, enclosing: &EnclosingFunction) {
        match &statement.kind {
            StatementKind::Declaration(declaration) => self.check_declaration(declaration),
            StatementKind::Expression(expression) => {
                // Temporary released here once checking is done
                drop(self.infer(expression));
            }
            StatementKind::If {
                condition,
                then_body,
                else_body,
            } => {
                self.check_condition(condition, "if");

                for statement in then_body {
                    self.check_statement(statement, enclosing);
                }

                if let Some(else_body) = else_body {
                    for statement in else_body {
                        self.check_statement(statement, enclosing);
                    }
                }
            }
            StatementKind::While { condition, body } => {
                self.check_condition(condition, "while");

                for statement in body {
                    self.check_statement(statement, enclosing);
                }
            }
            StatementKind::For {
                initializer,
                condition,
                update,
                body,
            } => {
                if let Some(initializer) = initializer {
                    drop(self.infer(initializer));
                }

                if let Some(condition) = condition {
                    self.check_condition(condition, "for");
                }

                if let Some(update) = update {
                    drop(self.infer(update));
                }

                for statement in body {
                    self.check_statement(statement, enclosing);
                }
            }
            StatementKind::Return(value) => self.check_return(value.as_ref(), enclosing),
            StatementKind::Block(body) => {
                for statement in body {
                    self.check_statement(statement, enclosing);
                }
            }
        }
    }

    fn check_condition(&mut self, condition: &Expression, construct: &str) {
        let found = self.infer(condition);

        if !found.is_unknown() && !found.is_boolean() {
            self.report(
                DiagnosticKind::TypeMismatch,
                format!("`{construct}` condition must be `bool`, found `{found}`"),
            );
        }
    }

    fn check_return(&mut self, value: Option<&Expression>, enclosing: &EnclosingFunction) {
        match value {
            Some(value) => {
                let found = self.infer(value);

                if !found.is_unknown()
                    && !enclosing.returns.is_unknown()
                    && found != *enclosing.returns
                {
                    self.report(
                        DiagnosticKind::TypeMismatch,
                        format!(
                            "return type mismatch in `{}`: expected `{}`, found `{found}`",
                            enclosing.name, enclosing.returns
                        ),
                    );
                }
            }
            // A bare `return` is legal only in a void function
            None => {
                if !enclosing.returns.is_void() {
                    self.report(
                        DiagnosticKind::TypeMismatch,
                        format!(
                            "missing return value: `{}` returns `{}`",
                            enclosing.name, enclosing.returns
                        ),
                    );
                }
            }
        }
    }

    /// Infers the type of an expression bottom-up, recording it in the
    /// side table. The returned type is a fresh value owned by the caller.
    fn infer(&mut self, expression: &Expression) -> Type {
        let ty = self.infer_kind(expression);
        self.expression_types.insert(expression.id, ty.clone());
        ty
    }

    fn infer_kind(&mut self, expression: &Expression) -> Type {
        match &expression.kind {
            ExpressionKind::Name(_) => match self.resolution.symbol_of(expression.id) {
                Some(symbol) => symbol.ty.clone(),
                // Resolution already reported the failed lookup
                None => Type::Unknown,
            },
            ExpressionKind::IntegerLiteral(_) => Type::Integer,
            ExpressionKind::CharacterLiteral(_) => Type::Character,
            ExpressionKind::BooleanLiteral(_) => Type::Boolean,
            ExpressionKind::StringLiteral(_) => Type::String,
            ExpressionKind::Binary { operator, lhs, rhs } => {
                self.infer_binary(*operator, lhs, rhs)
            }
            ExpressionKind::Assignment { lhs, rhs } => {
                self.check_assignable(lhs, "=");

                let target = self.infer(lhs);
                let value = self.infer(rhs);

                if target.is_unknown() || value.is_unknown() {
                    return Type::Unknown;
                }

                if target != value {
                    self.report(
                        DiagnosticKind::TypeMismatch,
                        format!(
                            "cannot assign a value of type `{value}` to a target of type `{target}`"
                        ),
                    );
                    return Type::Unknown;
                }

                // The assignment's own type is a copy of the left side's
                target
            }
            ExpressionKind::OperatorAssignment { operator, lhs, rhs } => {
                debug_assert!(operator.is_arithmetic());
                self.check_assignable(lhs, &format!("{operator}="));

                let target = self.infer(lhs);
                let value = self.infer(rhs);

                if target.is_unknown() || value.is_unknown() {
                    return Type::Unknown;
                }

                if !target.is_integer() || !value.is_integer() {
                    self.report(
                        DiagnosticKind::TypeMismatch,
                        format!(
                            "operator `{operator}=` requires integer operands, found `{target}` and `{value}`"
                        ),
                    );
                    return Type::Unknown;
                }

                Type::Integer
            }
            ExpressionKind::Increment(operand) | ExpressionKind::Decrement(operand) => {
                let operator = match &expression.kind {
                    ExpressionKind::Increment(_) => "++",
                    _ => "--",
                };
                self.check_assignable(operand, operator);

                let found = self.infer(operand);

                if found.is_unknown() {
                    return Type::Unknown;
                }

                if !found.is_integer() {
                    self.report(
                        DiagnosticKind::TypeMismatch,
                        format!("operator `{operator}` requires an integer operand, found `{found}`"),
                    );
                    return Type::Unknown;
                }

                Type::Integer
            }
            ExpressionKind::Subscript { array, index } => {
                let target = self.infer(array);
                let position = self.infer(index);

                if !position.is_unknown() && !position.is_integer() {
                    self.report(
                        DiagnosticKind::TypeMismatch,
                        format!("array index must be `int`, found `{position}`"),
                    );
                }

                if target.is_unknown() {
                    return Type::Unknown;
                }

                match target.element_type() {
                    Some(element) => element.clone(),
                    None => {
                        self.report(
                            DiagnosticKind::TypeMismatch,
                            format!("cannot subscript a value of type `{target}`"),
                        );
                        Type::Unknown
                    }
                }
            }
            ExpressionKind::FunctionCall {
                function,
                arguments,
            } => self.infer_call(function, arguments),
            ExpressionKind::InitializerList(elements) => {
                // Declaration checking handles the legal positions; anywhere
                // else this is an error
                self.report(
                    DiagnosticKind::TypeMismatch,
                    "initializer list is only allowed in an array declaration".to_string(),
                );

                for element in elements {
                    drop(self.infer(element));
                }

                Type::Unknown
            }
        }
    }

    fn infer_binary(
        &mut self,
        operator: BinaryOperatorKind,
        lhs: &Expression,
        rhs: &Expression,
    ) -> Type {
        let left = self.infer(lhs);
        let right = self.infer(rhs);

        if left.is_unknown() || right.is_unknown() {
            return Type::Unknown;
        }

        if !left.is_integer() || !right.is_integer() {
            self.report(
                DiagnosticKind::TypeMismatch,
                format!(
                    "operator `{operator}` requires integer operands, found `{left}` and `{right}`"
                ),
            );
            return Type::Unknown;
        }

        if operator.is_comparison() {
            Type::Boolean
        } else {
            Type::Integer
        }
    }

    fn infer_call(&mut self, function: &Expression, arguments: &[Expression]) -> Type {
        let callee = self.infer(function);

        let argument_types = arguments
            .iter()
            .map(|argument| self.infer(argument))
            .collect::<Vec<_>>();

        if callee.is_unknown() {
            return Type::Unknown;
        }

        let (Some(parameters), Some(returns)) = (callee.parameters(), callee.return_type()) else {
            self.report(
                DiagnosticKind::TypeMismatch,
                format!("called value has type `{callee}`, which is not a function"),
            );
            return Type::Unknown;
        };

        let callee_name = match &function.kind {
            ExpressionKind::Name(name) => name.as_str(),
            _ => "function",
        };

        if argument_types.len() != parameters.len() {
            self.report(
                DiagnosticKind::Arity,
                format!(
                    "`{callee_name}` expects {} argument{}, found {}",
                    parameters.len(),
                    if parameters.len() == 1 { "" } else { "s" },
                    argument_types.len()
                ),
            );
        }

        // Positions past the shorter list were covered by the arity report
        for (position, (parameter, argument)) in
            parameters.iter().zip(&argument_types).enumerate()
        {
            if !argument.is_unknown() && *argument != parameter.ty {
                self.report(
                    DiagnosticKind::TypeMismatch,
                    format!(
                        "argument {} to `{callee_name}`: expected `{}`, found `{argument}`",
                        position + 1,
                        parameter.ty
                    ),
                );
            }
        }

        returns.clone()
    }

    /// Mutation targets must be a variable or an array element
    fn check_assignable(&mut self, target: &Expression, operation: &str) {
        if !matches!(
            target.kind,
            ExpressionKind::Name(_) | ExpressionKind::Subscript { .. }
        ) {
            self.report(
                DiagnosticKind::TypeMismatch,
                format!("target of `{operation}` must be a variable or an array element"),
            );
        }
    }
}

/// Whether an expression can be evaluated at compile time for a data
/// directive: literals, and initializer lists of literals.
fn is_constant_expression(expression: &Expression) -> bool {
    match &expression.kind {
        ExpressionKind::IntegerLiteral(_)
        | ExpressionKind::CharacterLiteral(_)
        | ExpressionKind::BooleanLiteral(_)
        | ExpressionKind::StringLiteral(_) => true,
        ExpressionKind::InitializerList(elements) => elements.iter().all(is_constant_expression),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::Builder,
        middle::{resolve::Resolver, ty::Parameter},
    };

    fn check(program: &Program) -> (Resolution, TypeCheckResults) {
        let resolution = Resolver::resolve_program(program);
        let results = TypeChecker::check_program(program, &resolution);
        (resolution, results)
    }

    /// Wraps statements in `void main()` and checks the program
    fn check_main(b: &mut Builder, body: Vec<Statement>) -> TypeCheckResults {
        let main = b.function("main", Type::function(Type::Void, vec![]), body);
        let program = Builder::program(vec![main]);
        check(&program).1
    }

    #[test]
    fn literals_map_to_their_primitive_types() {
        let mut b = Builder::new();

        let i = b.integer(42);
        let c = b.character('x');
        let t = b.boolean(true);
        let s = b.string("hi");
        let ids = [
            (i.id, Type::Integer),
            (c.id, Type::Character),
            (t.id, Type::Boolean),
            (s.id, Type::String),
        ];

        let statements = vec![
            b.expression_statement(i),
            b.expression_statement(c),
            b.expression_statement(t),
            b.expression_statement(s),
        ];
        let results = check_main(&mut b, statements);

        assert!(results.diagnostics.is_empty());
        for (id, expected) in ids {
            assert_eq!(*results.type_of(id), expected);
        }
    }

    #[test]
    fn arithmetic_requires_integers_and_yields_integer() {
        let mut b = Builder::new();

        let lhs = b.integer(1);
        let rhs = b.integer(2);
        let sum = b.binary(BinaryOperatorKind::Add, lhs, rhs);
        let sum_id = sum.id;

        let statements = vec![b.expression_statement(sum)];
        let results = check_main(&mut b, statements);

        assert!(results.diagnostics.is_empty());
        assert_eq!(*results.type_of(sum_id), Type::Integer);
    }

    #[test]
    fn arithmetic_on_booleans_reports_with_both_types() {
        let mut b = Builder::new();

        let lhs = b.boolean(true);
        let rhs = b.integer(2);
        let sum = b.binary(BinaryOperatorKind::Add, lhs, rhs);
        let sum_id = sum.id;

        let statements = vec![b.expression_statement(sum)];
        let results = check_main(&mut b, statements);

        assert_eq!(results.diagnostics.count_of(DiagnosticKind::TypeMismatch), 1);
        let message = &results.diagnostics.iter().next().unwrap().message;
        assert!(message.contains("`bool`") && message.contains("`int`"));
        assert_eq!(*results.type_of(sum_id), Type::Unknown);
    }

    #[test]
    fn comparison_yields_boolean() {
        let mut b = Builder::new();

        let lhs = b.integer(1);
        let rhs = b.integer(2);
        let cmp = b.binary(BinaryOperatorKind::LessThan, lhs, rhs);
        let cmp_id = cmp.id;

        let statements = vec![b.expression_statement(cmp)];
        let results = check_main(&mut b, statements);

        assert!(results.diagnostics.is_empty());
        assert_eq!(*results.type_of(cmp_id), Type::Boolean);
    }

    #[test]
    fn assignment_requires_structural_equality() {
        let mut b = Builder::new();

        let decl = b.variable("x", Type::Integer, None);
        let target = b.name("x");
        let value = b.boolean(false);
        let assignment = b.assign(target, value);

        let statements = vec![
            b.declaration_statement(decl),
            b.expression_statement(assignment),
        ];
        let results = check_main(&mut b, statements);

        assert_eq!(results.diagnostics.count_of(DiagnosticKind::TypeMismatch), 1);
        let message = &results.diagnostics.iter().next().unwrap().message;
        assert!(message.contains("`bool`") && message.contains("`int`"));
    }

    #[test]
    fn assignment_yields_a_copy_of_the_left_type() {
        let mut b = Builder::new();

        let decl = b.variable("x", Type::Integer, None);
        let target = b.name("x");
        let value = b.integer(3);
        let assignment = b.assign(target, value);
        let assignment_id = assignment.id;

        let statements = vec![
            b.declaration_statement(decl),
            b.expression_statement(assignment),
        ];
        let results = check_main(&mut b, statements);

        assert!(results.diagnostics.is_empty());
        assert_eq!(*results.type_of(assignment_id), Type::Integer);
    }

    #[test]
    fn subscript_yields_the_element_type() {
        let mut b = Builder::new();

        let decl = b.variable("a", Type::array(Type::Character, 4), None);
        let array = b.name("a");
        let index = b.integer(2);
        let subscript = b.subscript(array, index);
        let subscript_id = subscript.id;

        let statements = vec![
            b.declaration_statement(decl),
            b.expression_statement(subscript),
        ];
        let results = check_main(&mut b, statements);

        assert!(results.diagnostics.is_empty());
        assert_eq!(*results.type_of(subscript_id), Type::Character);
    }

    #[test]
    fn subscript_of_non_array_reports() {
        let mut b = Builder::new();

        let decl = b.variable("x", Type::Integer, None);
        let target = b.name("x");
        let index = b.integer(0);
        let subscript = b.subscript(target, index);

        let statements = vec![
            b.declaration_statement(decl),
            b.expression_statement(subscript),
        ];
        let results = check_main(&mut b, statements);

        assert_eq!(results.diagnostics.count_of(DiagnosticKind::TypeMismatch), 1);
    }

    #[test]
    fn non_integer_index_reports() {
        let mut b = Builder::new();

        let decl = b.variable("a", Type::array(Type::Integer, 4), None);
        let array = b.name("a");
        let index = b.boolean(true);
        let subscript = b.subscript(array, index);

        let statements = vec![
            b.declaration_statement(decl),
            b.expression_statement(subscript),
        ];
        let results = check_main(&mut b, statements);

        assert_eq!(results.diagnostics.count_of(DiagnosticKind::TypeMismatch), 1);
    }

    #[test]
    fn call_with_wrong_argument_count_reports_arity_and_continues() {
        let mut b = Builder::new();

        let f = b.prototype(
            "f",
            Type::function(Type::Integer, vec![Parameter::new("x", Type::Integer)]),
        );

        let callee = b.name("f");
        let a0 = b.integer(1);
        let a1 = b.integer(2);
        let call = b.call(callee, vec![a0, a1]);
        let call_id = call.id;

        let statements = vec![b.expression_statement(call)];
        let main = b.function("main", Type::function(Type::Void, vec![]), statements);
        let program = Builder::program(vec![f, main]);
        let (_, results) = check(&program);

        assert_eq!(results.diagnostics.count_of(DiagnosticKind::Arity), 1);
        // The call still produces the declared return type
        assert_eq!(*results.type_of(call_id), Type::Integer);
    }

    #[test]
    fn call_checks_each_argument_position() {
        let mut b = Builder::new();

        let f = b.prototype(
            "f",
            Type::function(
                Type::Void,
                vec![
                    Parameter::new("x", Type::Integer),
                    Parameter::new("y", Type::Boolean),
                ],
            ),
        );

        let callee = b.name("f");
        let a0 = b.boolean(true);
        let a1 = b.integer(0);
        let call = b.call(callee, vec![a0, a1]);

        let statements = vec![b.expression_statement(call)];
        let main = b.function("main", Type::function(Type::Void, vec![]), statements);
        let program = Builder::program(vec![f, main]);
        let (_, results) = check(&program);

        assert_eq!(results.diagnostics.count_of(DiagnosticKind::TypeMismatch), 2);
    }

    #[test]
    fn calling_a_non_function_reports() {
        let mut b = Builder::new();

        let decl = b.variable("x", Type::Integer, None);
        let callee = b.name("x");
        let call = b.call(callee, vec![]);

        let statements = vec![b.declaration_statement(decl), b.expression_statement(call)];
        let results = check_main(&mut b, statements);

        assert_eq!(results.diagnostics.count_of(DiagnosticKind::TypeMismatch), 1);
    }

    #[test]
    fn condition_must_be_boolean() {
        let mut b = Builder::new();

        let condition = b.integer(1);
        let if_statement = b.if_statement(condition, vec![], None);

        let statements = vec![if_statement];
        let results = check_main(&mut b, statements);

        assert_eq!(results.diagnostics.count_of(DiagnosticKind::TypeMismatch), 1);
        assert!(
            results
                .diagnostics
                .iter()
                .next()
                .unwrap()
                .message
                .contains("`if`")
        );
    }

    #[test]
    fn return_type_must_match_the_enclosing_function() {
        let mut b = Builder::new();

        let value = b.boolean(true);
        let return_statement = b.return_statement(Some(value));
        let f = b.function(
            "f",
            Type::function(Type::Integer, vec![]),
            vec![return_statement],
        );
        let program = Builder::program(vec![f]);
        let (_, results) = check(&program);

        assert_eq!(results.diagnostics.count_of(DiagnosticKind::TypeMismatch), 1);
        let message = &results.diagnostics.iter().next().unwrap().message;
        assert!(message.contains("`f`"));
    }

    #[test]
    fn bare_return_is_only_legal_in_void_functions() {
        let mut b = Builder::new();

        let bare = b.return_statement(None);
        let f = b.function("f", Type::function(Type::Integer, vec![]), vec![bare]);

        let ok = b.return_statement(None);
        let g = b.function("g", Type::function(Type::Void, vec![]), vec![ok]);

        let program = Builder::program(vec![f, g]);
        let (_, results) = check(&program);

        assert_eq!(results.diagnostics.count_of(DiagnosticKind::TypeMismatch), 1);
    }

    #[test]
    fn unknown_operands_do_not_cascade() {
        let mut b = Builder::new();

        // `missing + 1` — the lookup failure is reported by the resolver;
        // the checker must not add a second diagnostic for the `+`
        let bad = b.name("missing");
        let one = b.integer(1);
        let sum = b.binary(BinaryOperatorKind::Add, bad, one);

        let statements = vec![b.expression_statement(sum)];
        let main = b.function("main", Type::function(Type::Void, vec![]), statements);
        let program = Builder::program(vec![main]);
        let (resolution, results) = check(&program);

        assert_eq!(resolution.diagnostics.count_of(DiagnosticKind::Lookup), 1);
        assert!(results.diagnostics.is_empty());
    }

    #[test]
    fn array_initializer_checks_length_and_element_types() {
        let mut b = Builder::new();

        let e0 = b.integer(1);
        let e1 = b.boolean(true);
        let list = b.initializer_list(vec![e0, e1]);
        let decl = b.variable("a", Type::array(Type::Integer, 3), Some(list));

        let statements = vec![b.declaration_statement(decl)];
        let results = check_main(&mut b, statements);

        // One report for the length, one for the boolean element
        assert_eq!(results.diagnostics.count_of(DiagnosticKind::TypeMismatch), 2);
    }

    #[test]
    fn global_initializers_must_be_constant() {
        let mut b = Builder::new();

        let f = b.prototype("f", Type::function(Type::Integer, vec![]));
        let callee = b.name("f");
        let call = b.call(callee, vec![]);
        let global = b.variable("x", Type::Integer, Some(call));
        let program = Builder::program(vec![f, global]);
        let (_, results) = check(&program);

        assert_eq!(results.diagnostics.count_of(DiagnosticKind::TypeMismatch), 1);
    }

    #[test]
    fn assigning_to_a_non_lvalue_reports() {
        let mut b = Builder::new();

        let decl = b.variable("x", Type::Integer, None);
        let target = b.integer(5);
        let value = b.name("x");
        let assignment = b.assign(target, value);

        let statements = vec![
            b.declaration_statement(decl),
            b.expression_statement(assignment),
        ];
        let results = check_main(&mut b, statements);

        assert_eq!(results.diagnostics.count_of(DiagnosticKind::TypeMismatch), 1);
    }

    #[test]
    fn incrementing_a_call_result_reports() {
        let mut b = Builder::new();

        let f = b.prototype("f", Type::function(Type::Integer, vec![]));
        let callee = b.name("f");
        let call = b.call(callee, vec![]);
        let step = b.increment(call);

        let statements = vec![b.expression_statement(step)];
        let main = b.function("main", Type::function(Type::Void, vec![]), statements);
        let program = Builder::program(vec![f, main]);
        let (_, results) = check(&program);

        assert_eq!(results.diagnostics.count_of(DiagnosticKind::TypeMismatch), 1);
    }
}
