use std::fmt;

mod parser;

pub use parser::Parser;


/// A parsed source file: the ordered list of top-level statements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `let name = value;`
    Let { name: String, value: Expr },
    /// `return value;`
    Return { value: Expr },
    /// A bare expression followed by an optional semicolon.
    Expr { expression: Expr },
}

/// A braced statement list. Used for `if` branches and function bodies.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(String),
    Int(i64),
    Bool(bool),
    Str(String),
    /// `operator` is one of `!` `-`.
    Prefix {
        operator: String,
        right: Box<Expr>,
    },
    /// `operator` is one of `+` `-` `*` `/` `>` `<` `==` `!=`.
    Infix {
        operator: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    If {
        condition: Box<Expr>,
        consequence: Block,
        alternative: Option<Block>,
    },
    Array(Vec<Expr>),
    /// Pairs in source order; the compiler sorts by printed key form.
    Hash(Vec<(Expr, Expr)>),
    Index {
        left: Box<Expr>,
        index: Box<Expr>,
    },
    /// `name` is filled in when the literal is the direct value of a
    /// `let` statement, enabling self-referential calls in the body.
    Function {
        name: Option<String>,
        parameters: Vec<String>,
        body: Block,
    },
    Call {
        function: Box<Expr>,
        arguments: Vec<Expr>,
    },
}

// The printed forms below are load-bearing: hash-literal keys are sorted by
// them at compile time, so changing them changes emitted bytecode.

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.statements {
            write!(f, "{stmt}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Let { name, value } => write!(f, "let {name} = {value};"),
            Stmt::Return { value } => write!(f, "return {value};"),
            Stmt::Expr { expression } => write!(f, "{expression}"),
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.statements {
            write!(f, "{stmt}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Ident(name) => write!(f, "{name}"),
            Expr::Int(value) => write!(f, "{value}"),
            Expr::Bool(value) => write!(f, "{value}"),
            Expr::Str(value) => write!(f, "{value}"),
            Expr::Prefix { operator, right } => write!(f, "({operator}{right})"),
            Expr::Infix {
                operator,
                left,
                right,
            } => write!(f, "({left} {operator} {right})"),
            Expr::If {
                condition,
                consequence,
                alternative,
            } => {
                write!(f, "if{condition} {consequence}")?;
                if let Some(alt) = alternative {
                    write!(f, "else {alt}")?;
                }
                Ok(())
            }
            Expr::Array(elements) => {
                let parts: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Expr::Hash(pairs) => {
                let parts: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}:{v}")).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Expr::Index { left, index } => write!(f, "({left}[{index}])"),
            Expr::Function {
                name,
                parameters,
                body,
            } => {
                write!(f, "fn")?;
                if let Some(name) = name {
                    write!(f, "<{name}>")?;
                }
                write!(f, "({}) {{{body}}}", parameters.join(", "))
            }
            Expr::Call {
                function,
                arguments,
            } => {
                let parts: Vec<String> = arguments.iter().map(|a| a.to_string()).collect();
                write!(f, "{function}({})", parts.join(", "))
            }
        }
    }
}
