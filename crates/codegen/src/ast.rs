//! The type-checked syntax tree the generator consumes.
//!
//! Every variable reference and call already carries its resolved
//! [`SymbolId`], and every expression carries its static [`Type`] (or
//! `None` for a call to a function that returns nothing). The generator
//! never looks names up or infers types.

use std::fmt;

use night_common::{SymbolId, ValueKind};

/// Width of an integer type in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    pub fn bits(&self) -> u32 {
        match self {
            IntWidth::W8 => 8,
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 => 64,
        }
    }
}

/// Scalar element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    Bool,
    Char,
    Int(IntWidth),
    UInt(IntWidth),
    Float,
    Str,
}

/// A static type: a base type plus a number of array dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Type {
    pub base: BaseType,
    pub dims: usize,
}

impl Type {
    pub const BOOL: Type = Type::scalar(BaseType::Bool);
    pub const CHAR: Type = Type::scalar(BaseType::Char);
    pub const INT: Type = Type::scalar(BaseType::Int(IntWidth::W64));
    pub const UINT: Type = Type::scalar(BaseType::UInt(IntWidth::W64));
    pub const FLOAT: Type = Type::scalar(BaseType::Float);
    pub const STR: Type = Type::scalar(BaseType::Str);

    pub const fn scalar(base: BaseType) -> Self {
        Self { base, dims: 0 }
    }

    pub const fn array(base: BaseType, dims: usize) -> Self {
        Self { base, dims }
    }

    pub fn is_array(&self) -> bool {
        self.dims > 0
    }

    /// Scalar float.
    pub fn is_float(&self) -> bool {
        self.dims == 0 && self.base == BaseType::Float
    }

    /// Scalar string.
    pub fn is_str(&self) -> bool {
        self.dims == 0 && self.base == BaseType::Str
    }

    /// Scalar char.
    pub fn is_char(&self) -> bool {
        self.dims == 0 && self.base == BaseType::Char
    }

    /// Scalar bool, char or integer: anything the integer opcodes accept.
    pub fn is_integral(&self) -> bool {
        self.dims == 0
            && matches!(
                self.base,
                BaseType::Bool | BaseType::Char | BaseType::Int(_) | BaseType::UInt(_)
            )
    }

    /// Type produced by one subscript, if this type can be subscripted.
    pub fn element(&self) -> Option<Type> {
        if self.dims > 0 {
            Some(Type::array(self.base, self.dims - 1))
        } else if self.base == BaseType::Str {
            Some(Type::CHAR)
        } else {
            None
        }
    }

    /// Runtime kind of the scalar leaves.
    pub fn leaf_kind(&self) -> ValueKind {
        match self.base {
            BaseType::Bool | BaseType::Char | BaseType::Int(_) => ValueKind::Int,
            BaseType::UInt(_) => ValueKind::UInt,
            BaseType::Float => ValueKind::Float,
            BaseType::Str => ValueKind::Str,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = match self.base {
            BaseType::Bool => "bool".to_string(),
            BaseType::Char => "char".to_string(),
            BaseType::Int(w) => format!("int{}", w.bits()),
            BaseType::UInt(w) => format!("uint{}", w.bits()),
            BaseType::Float => "float".to_string(),
            BaseType::Str => "str".to_string(),
        };
        f.write_str(&base)?;
        for _ in 0..self.dims {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

/// A constant written in the source.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Char(char),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    /// Source spelling, used in diagnostics.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// Assignment operator of an assignment statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl AssignOp {
    /// The binary operator a compound assignment applies.
    pub fn binary(&self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Mod => Some(BinaryOp::Mod),
        }
    }
}

/// A typed expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    /// Static type; `None` only for calls that return nothing.
    pub ty: Option<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Variable(SymbolId),
    /// Array literal.
    Array(Vec<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Subscript {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        id: SymbolId,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Option<Type>) -> Self {
        Self { kind, ty }
    }

    pub fn bool(b: bool) -> Self {
        Self::new(ExprKind::Literal(Literal::Bool(b)), Some(Type::BOOL))
    }

    pub fn char(c: char) -> Self {
        Self::new(ExprKind::Literal(Literal::Char(c)), Some(Type::CHAR))
    }

    pub fn int(i: i64) -> Self {
        Self::new(ExprKind::Literal(Literal::Int(i)), Some(Type::INT))
    }

    pub fn uint(u: u64) -> Self {
        Self::new(ExprKind::Literal(Literal::UInt(u)), Some(Type::UINT))
    }

    pub fn float(f: f64) -> Self {
        Self::new(ExprKind::Literal(Literal::Float(f)), Some(Type::FLOAT))
    }

    pub fn str(s: &str) -> Self {
        Self::new(ExprKind::Literal(Literal::Str(s.to_string())), Some(Type::STR))
    }

    pub fn var(id: SymbolId, ty: Type) -> Self {
        Self::new(ExprKind::Variable(id), Some(ty))
    }

    /// Array literal; the type gains one dimension over the elements'.
    pub fn array(elements: Vec<Expr>, element_ty: Type) -> Self {
        let ty = Type::array(element_ty.base, element_ty.dims + 1);
        Self::new(ExprKind::Array(elements), Some(ty))
    }

    pub fn unary(op: UnaryOp, operand: Expr, ty: Type) -> Self {
        Self::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            Some(ty),
        )
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, ty: Type) -> Self {
        Self::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            Some(ty),
        )
    }

    /// `base[index]`, typed from the base when it is known.
    pub fn subscript(base: Expr, index: Expr) -> Self {
        let ty = base.ty.and_then(|t| t.element());
        Self::new(
            ExprKind::Subscript {
                base: Box::new(base),
                index: Box::new(index),
            },
            ty,
        )
    }

    pub fn call(id: SymbolId, args: Vec<Expr>, ty: Option<Type>) -> Self {
        Self::new(ExprKind::Call { id, args }, ty)
    }
}

/// A typed statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `id: ty[sizes...] = init;`
    ///
    /// `sizes` has one entry per dimension of `ty`; `None` means the size
    /// was left for the initializer to decide.
    VarInit {
        id: SymbolId,
        ty: Type,
        sizes: Vec<Option<Expr>>,
        init: Option<Expr>,
    },
    /// `id op= value;` where `ty` is the variable's type.
    Assign {
        id: SymbolId,
        ty: Type,
        op: AssignOp,
        value: Expr,
    },
    /// `id[i][j]... op= value;` where `ty` is the addressed element's type.
    IndexAssign {
        id: SymbolId,
        ty: Type,
        indices: Vec<Expr>,
        op: AssignOp,
        value: Expr,
    },
    /// `if` / `elif` chain with an optional `else`.
    Conditional {
        arms: Vec<(Expr, Vec<Stmt>)>,
        else_body: Option<Vec<Stmt>>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    /// `for (init; cond; ...) body`; the step is part of `body`.
    For {
        init: Box<Stmt>,
        cond: Expr,
        body: Vec<Stmt>,
    },
    Function {
        id: SymbolId,
        params: Vec<SymbolId>,
        body: Vec<Stmt>,
    },
    Return(Option<Expr>),
    /// An expression evaluated for its side effects, normally a call.
    Expr(Expr),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_types() {
        let grid = Type::array(BaseType::Float, 2);
        assert_eq!(grid.element(), Some(Type::array(BaseType::Float, 1)));
        assert_eq!(Type::STR.element(), Some(Type::CHAR));
        assert_eq!(Type::INT.element(), None);
    }

    #[test]
    fn integral_covers_bool_and_char() {
        assert!(Type::BOOL.is_integral());
        assert!(Type::CHAR.is_integral());
        assert!(Type::UINT.is_integral());
        assert!(!Type::FLOAT.is_integral());
        assert!(!Type::array(BaseType::Int(IntWidth::W8), 1).is_integral());
    }

    #[test]
    fn leaf_kinds() {
        assert_eq!(Type::BOOL.leaf_kind(), ValueKind::Int);
        assert_eq!(Type::array(BaseType::UInt(IntWidth::W16), 3).leaf_kind(), ValueKind::UInt);
        assert_eq!(Type::array(BaseType::Str, 1).leaf_kind(), ValueKind::Str);
    }

    #[test]
    fn display() {
        assert_eq!(Type::array(BaseType::Int(IntWidth::W32), 2).to_string(), "int32[][]");
        assert_eq!(Type::STR.to_string(), "str");
    }

    #[test]
    fn subscript_takes_element_type() {
        let s = Expr::subscript(Expr::var(64, Type::STR), Expr::int(0));
        assert_eq!(s.ty, Some(Type::CHAR));
    }
}
