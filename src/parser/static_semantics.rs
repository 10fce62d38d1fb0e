use crate::parser::ast::{
    DeclarationType, HoistedDeclarations, LexicalName, StatementType,
    VariableDeclarationOrExpression, VariableDeclarationKind,
};

/// Collects the declarations a statement list introduces into its scope and
/// reports the early errors between them (duplicate `let`/`const`, a lexical
/// name clashing with a `var` or a function of the same scope).
pub(crate) fn collect_declarations<'a, I>(statements: I) -> Result<HoistedDeclarations, String>
where
    I: IntoIterator<Item = &'a StatementType>,
{
    let mut declarations = HoistedDeclarations::default();
    for stmt in statements {
        collect_var_names(stmt, &mut declarations.var_names);
        match stmt {
            StatementType::DeclarationStatement(DeclarationType::VariableDeclaration(data))
                if data.kind != VariableDeclarationKind::Var =>
            {
                for d in &data.declarations {
                    if declarations.lexical_names.iter().any(|l| l.name == d.id.name) {
                        return Err(already_declared(&d.id.name));
                    }
                    declarations.lexical_names.push(LexicalName {
                        name: d.id.name.to_string(),
                        is_const: data.kind == VariableDeclarationKind::Const,
                        meta: d.id.meta,
                    });
                }
            }
            StatementType::DeclarationStatement(DeclarationType::FunctionDeclaration(f)) => {
                declarations.functions.push(f.clone());
            }
            _ => {}
        }
    }
    for lexical in &declarations.lexical_names {
        let clashes_with_var = declarations.var_names.iter().any(|v| *v == lexical.name);
        let clashes_with_function = declarations
            .functions
            .iter()
            .any(|f| f.name() == lexical.name);
        if clashes_with_var || clashes_with_function {
            return Err(already_declared(&lexical.name));
        }
    }
    Ok(declarations)
}

fn already_declared(name: &str) -> String {
    format!("Identifier '{}' has already been declared", name)
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

/// `var` declarations are function scoped, so the walk descends into every
/// nested statement except function bodies.
fn collect_var_names(stmt: &StatementType, names: &mut Vec<String>) {
    match stmt {
        StatementType::DeclarationStatement(DeclarationType::VariableDeclaration(data)) => {
            if data.kind == VariableDeclarationKind::Var {
                for d in &data.declarations {
                    push_unique(names, &d.id.name);
                }
            }
        }
        StatementType::BlockStatement(block) => {
            for s in &block.body {
                collect_var_names(s, names);
            }
        }
        StatementType::IfStatement {
            consequent,
            alternate,
            ..
        } => {
            collect_var_names(consequent, names);
            if let Some(alternate) = alternate {
                collect_var_names(alternate, names);
            }
        }
        StatementType::WhileStatement { body, .. }
        | StatementType::DoWhileStatement { body, .. } => collect_var_names(body, names),
        StatementType::ForStatement(data) => {
            if let Some(VariableDeclarationOrExpression::VariableDeclaration(decl)) = &data.init {
                if decl.kind == VariableDeclarationKind::Var {
                    for d in &decl.declarations {
                        push_unique(names, &d.id.name);
                    }
                }
            }
            collect_var_names(&data.body, names);
        }
        StatementType::ForInStatement(data) | StatementType::ForOfStatement(data) => {
            if data.kind == Some(VariableDeclarationKind::Var) {
                push_unique(names, &data.binding.name);
            }
            collect_var_names(&data.body, names);
        }
        StatementType::TryStatement {
            block,
            handler,
            finalizer,
            ..
        } => {
            for s in &block.body {
                collect_var_names(s, names);
            }
            if let Some(handler) = handler {
                for s in &handler.body.body {
                    collect_var_names(s, names);
                }
            }
            if let Some(finalizer) = finalizer {
                for s in &finalizer.body {
                    collect_var_names(s, names);
                }
            }
        }
        StatementType::SwitchStatement(data) => {
            for case in &data.cases {
                for s in &case.consequent {
                    collect_var_names(s, names);
                }
            }
        }
        _ => {}
    }
}
