//! Statement and expression lowering.
//!
//! Expressions are emitted post-order: operands left to right, then the
//! operator, so the interpreter pops the right operand first.

use night_common::{Builtin, Bytecode, Instruction, Opcode, SymbolId};

use crate::ast::{BaseType, BinaryOp, Expr, ExprKind, Literal, Stmt, Type, UnaryOp};
use crate::context::CompileContext;
use crate::emitter::Emitter;
use crate::error::CodegenError;

type Result<T> = std::result::Result<T, CodegenError>;

/// Opcode family selected by operand types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Int,
    Float,
    Str,
}

pub struct Generator<'c> {
    ctx: &'c mut CompileContext,
    out: Emitter,
}

impl<'c> Generator<'c> {
    pub fn new(ctx: &'c mut CompileContext) -> Self {
        Self {
            ctx,
            out: Emitter::new(),
        }
    }

    pub fn finish(self) -> Bytecode {
        self.out.finish()
    }

    pub fn stmts(&mut self, stmts: &[Stmt]) -> Result<()> {
        stmts.iter().try_for_each(|stmt| self.stmt(stmt))
    }

    pub fn stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::VarInit {
                id,
                ty,
                sizes,
                init,
            } => {
                match init {
                    Some(init) if ty.is_array() => match &init.kind {
                        ExprKind::Array(elements) => self.array_literal(elements, *ty, sizes)?,
                        _ => self.expr(init)?,
                    },
                    Some(init) => {
                        self.expr(init)?;
                        self.convert(typed(init, "initializer")?, *ty);
                    }
                    None if ty.is_array() => self.zero_array(*ty, sizes)?,
                    None => self.zero_scalar(*ty),
                }
                self.out.emit(Instruction::store(*id));
            }

            Stmt::Assign { id, ty, op, value } => {
                match op.binary() {
                    None => {
                        self.expr(value)?;
                        self.convert(typed(value, "assigned value")?, *ty);
                    }
                    Some(bin) => {
                        let current = Expr::var(*id, *ty);
                        let result = self.binary(bin, &current, value)?;
                        self.convert(result, *ty);
                    }
                }
                self.out.emit(Instruction::store(*id));
            }

            Stmt::IndexAssign {
                id,
                ty,
                indices,
                op,
                value,
            } => {
                for index in indices.iter().rev() {
                    self.expr(index)?;
                }
                match op.binary() {
                    None => {
                        self.expr(value)?;
                        self.convert(typed(value, "assigned value")?, *ty);
                    }
                    Some(bin) => {
                        let current = element_of(*id, indices, *ty);
                        let result = self.binary(bin, &current, value)?;
                        self.convert(result, *ty);
                    }
                }
                self.out
                    .emit(Instruction::store_index(*id, indices.len() as u64));
            }

            Stmt::Conditional { arms, else_body } => {
                let mut exits = Vec::with_capacity(arms.len());
                for (cond, body) in arms {
                    self.expr(cond)?;
                    let skip = self.out.emit_jump(Opcode::JumpIfFalse);
                    self.stmts(body)?;
                    exits.push(self.out.emit_jump(Opcode::Jump));
                    self.out.patch_to_here(skip)?;
                }
                if let Some(body) = else_body {
                    self.stmts(body)?;
                }
                for exit in exits {
                    self.out.patch_to_here(exit)?;
                }
            }

            Stmt::While { cond, body } => self.while_loop(cond, body)?,

            Stmt::For { init, cond, body } => {
                self.stmt(init)?;
                self.while_loop(cond, body)?;
            }

            Stmt::Function { id, params, body } => {
                self.ctx.declare_function(*id, params)?;
                let mut inner = Generator::new(&mut *self.ctx);
                inner.stmts(body)?;
                let code = inner.finish();
                self.ctx.define_function(*id, code);
            }

            Stmt::Return(value) => {
                if let Some(value) = value {
                    self.expr(value)?;
                }
                self.out.emit_op(Opcode::Return);
            }

            Stmt::Expr(expr) => {
                self.expr(expr)?;
                if expr.ty.is_some() {
                    self.out.emit_op(Opcode::Pop);
                }
            }
        }
        Ok(())
    }

    fn while_loop(&mut self, cond: &Expr, body: &[Stmt]) -> Result<()> {
        let start = self.out.here();
        self.expr(cond)?;
        let exit = self.out.emit_jump(Opcode::JumpIfFalse);
        self.stmts(body)?;
        self.out.emit_jump_back(start);
        self.out.patch_to_here(exit)
    }

    pub fn expr(&mut self, expr: &Expr) -> Result<()> {
        match &expr.kind {
            ExprKind::Literal(lit) => self.literal(lit),
            ExprKind::Variable(id) => {
                self.out.emit(Instruction::load(*id));
            }
            ExprKind::Array(elements) => {
                for element in elements {
                    self.expr(element)?;
                }
                self.out.emit(Instruction::with_word(
                    Opcode::AllocateArray,
                    elements.len() as u64,
                ));
            }
            ExprKind::Unary { op, operand } => {
                let ty = typed(operand, "unary operand")?;
                let opcode = match (op, family_of(ty)) {
                    (UnaryOp::Neg, Some(Family::Int)) => Opcode::NegI,
                    (UnaryOp::Neg, Some(Family::Float)) => Opcode::NegF,
                    (UnaryOp::Not, Some(Family::Int)) => Opcode::NotI,
                    (UnaryOp::Not, Some(Family::Float)) => Opcode::NotF,
                    (UnaryOp::Neg, _) => return Err(unsupported("-", ty)),
                    (UnaryOp::Not, _) => return Err(unsupported("!", ty)),
                };
                self.expr(operand)?;
                self.out.emit_op(opcode);
            }
            ExprKind::Binary { op, lhs, rhs } => {
                self.binary(*op, lhs, rhs)?;
            }
            ExprKind::Subscript { .. } => self.subscript(expr)?,
            ExprKind::Call { id, args } => self.call(*id, args)?,
        }
        Ok(())
    }

    fn literal(&mut self, lit: &Literal) {
        match lit {
            Literal::Bool(b) => {
                self.out.emit(Instruction::push_int(i64::from(*b)));
            }
            Literal::Char(c) => {
                self.out.emit(Instruction::push_int(i64::from(u32::from(*c))));
            }
            Literal::Int(i) => {
                self.out.emit(Instruction::push_int(*i));
            }
            Literal::UInt(u) => {
                self.out.emit(Instruction::push_uint(*u));
            }
            Literal::Float(x) => {
                self.out.emit(Instruction::push_float(*x));
            }
            Literal::Str(s) => {
                let mut count = 0u64;
                for c in s.chars() {
                    self.out.emit(Instruction::push_int(i64::from(u32::from(c))));
                    count += 1;
                }
                self.out
                    .emit(Instruction::with_word(Opcode::AllocateString, count));
            }
        }
    }

    /// Emit `lhs op rhs` and return the result type.
    fn binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Type> {
        let lt = typed(lhs, "left operand")?;
        let rt = typed(rhs, "right operand")?;

        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            self.expr(lhs)?;
            self.expr(rhs)?;
            self.out.emit_op(if op == BinaryOp::And {
                Opcode::And
            } else {
                Opcode::Or
            });
            return Ok(Type::BOOL);
        }

        let family = if lt.is_str() || rt.is_str() {
            Family::Str
        } else if lt.is_float() || rt.is_float() {
            Family::Float
        } else if lt.is_integral() && rt.is_integral() {
            Family::Int
        } else {
            let ty = if lt.is_array() { lt } else { rt };
            return Err(unsupported(op.symbol(), ty));
        };

        let opcode = binary_opcode(op, family).ok_or_else(|| {
            let ty = match family {
                Family::Str => Type::STR,
                Family::Float => Type::FLOAT,
                Family::Int => lt,
            };
            unsupported(op.symbol(), ty)
        })?;

        self.operand(lhs, lt, family, op)?;
        self.operand(rhs, rt, family, op)?;
        self.out.emit_op(opcode);

        Ok(match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                match family {
                    Family::Str => Type::STR,
                    Family::Float => Type::FLOAT,
                    Family::Int => lt,
                }
            }
            _ => Type::BOOL,
        })
    }

    /// Emit one operand, widening it to the operator's family.
    fn operand(&mut self, expr: &Expr, ty: Type, family: Family, op: BinaryOp) -> Result<()> {
        self.expr(expr)?;
        match family {
            Family::Str if ty.is_str() => {}
            Family::Str if ty.is_char() && op == BinaryOp::Add => {
                self.out.emit(Instruction::call(Builtin::CharToStr.id()));
            }
            Family::Float if ty.is_float() => {}
            Family::Float if ty.is_integral() => {
                self.out.emit_op(Opcode::IntToFloat);
            }
            Family::Int if ty.is_integral() => {}
            _ => return Err(unsupported(op.symbol(), ty)),
        }
        Ok(())
    }

    /// Subscripts rooted at a variable become one `LOAD_ELEM`; anything
    /// else is indexed one level at a time.
    fn subscript(&mut self, expr: &Expr) -> Result<()> {
        let mut indices = Vec::new();
        let mut root = expr;
        while let ExprKind::Subscript { base, index } = &root.kind {
            indices.push(index.as_ref());
            root = base.as_ref();
        }

        if let ExprKind::Variable(id) = root.kind {
            if let Some(ty) = root.ty {
                check_depth(ty, indices.len())?;
            }
            // Innermost index first, leaving the outermost on top.
            for index in &indices {
                self.expr(index)?;
            }
            self.out
                .emit(Instruction::load_elem(id, indices.len() as u64));
            return Ok(());
        }

        if let ExprKind::Subscript { base, index } = &expr.kind {
            if let Some(ty) = base.ty {
                check_depth(ty, 1)?;
            }
            self.expr(base)?;
            self.expr(index)?;
            self.out.emit_op(Opcode::Index);
        }
        Ok(())
    }

    fn call(&mut self, id: SymbolId, args: &[Expr]) -> Result<()> {
        let expected = if Builtin::is_reserved(id) {
            let builtin = Builtin::from_id(id).ok_or(CodegenError::ReservedId { id })?;
            Some(builtin.arity())
        } else {
            self.ctx.arity(id)
        };
        if let Some(expected) = expected {
            if expected != args.len() {
                return Err(CodegenError::ArityMismatch {
                    id,
                    expected,
                    found: args.len(),
                });
            }
        }
        for arg in args {
            self.expr(arg)?;
        }
        self.out.emit(Instruction::call(id));
        Ok(())
    }

    /// Implicit numeric conversion from `from` to `to`.
    fn convert(&mut self, from: Type, to: Type) {
        if from.is_array() || to.is_array() {
            return;
        }
        let opcode = if to.is_float() && from.is_integral() {
            Opcode::IntToFloat
        } else if from.is_float() && to.base == BaseType::Bool {
            Opcode::FloatToBool
        } else if from.is_float() && to.is_integral() {
            Opcode::FloatToInt
        } else {
            return;
        };
        self.out.emit_op(opcode);
    }

    /// Array literal for a declaration, padded out to a literal declared size.
    fn array_literal(&mut self, elements: &[Expr], ty: Type, sizes: &[Option<Expr>]) -> Result<()> {
        let element_ty = Type::array(ty.base, ty.dims.saturating_sub(1));
        let rest = sizes.get(1..).unwrap_or(&[]);

        for element in elements {
            match &element.kind {
                ExprKind::Array(inner) if element_ty.is_array() => {
                    self.array_literal(inner, element_ty, rest)?
                }
                _ => {
                    self.expr(element)?;
                    self.convert(typed(element, "array element")?, element_ty);
                }
            }
        }

        let declared = sizes
            .first()
            .and_then(Option::as_ref)
            .and_then(literal_size);
        let mut count = elements.len();
        if let Some(declared) = declared {
            for _ in count..declared {
                if element_ty.is_array() {
                    self.zero_array(element_ty, rest)?;
                } else {
                    self.zero_scalar(element_ty);
                }
            }
            count = count.max(declared);
        }
        self.out
            .emit(Instruction::with_word(Opcode::AllocateArray, count as u64));
        Ok(())
    }

    /// Zero-filled array; missing sizes count as 0.
    fn zero_array(&mut self, ty: Type, sizes: &[Option<Expr>]) -> Result<()> {
        for level in 0..ty.dims {
            match sizes.get(level).and_then(Option::as_ref) {
                Some(size) => self.expr(size)?,
                None => {
                    self.out.emit(Instruction::push_int(0));
                }
            }
        }
        self.out
            .emit(Instruction::allocate_filled(ty.dims as u64, ty.leaf_kind()));
        Ok(())
    }

    fn zero_scalar(&mut self, ty: Type) {
        let instr = match ty.base {
            BaseType::Float => Instruction::push_float(0.0),
            BaseType::UInt(_) => Instruction::push_uint(0),
            BaseType::Str => Instruction::with_word(Opcode::AllocateString, 0),
            BaseType::Bool | BaseType::Char | BaseType::Int(_) => Instruction::push_int(0),
        };
        self.out.emit(instr);
    }
}

fn typed(expr: &Expr, what: &'static str) -> Result<Type> {
    expr.ty.ok_or(CodegenError::MissingType { what })
}

fn unsupported(op: &'static str, ty: Type) -> CodegenError {
    CodegenError::UnsupportedOperator { op, ty }
}

fn family_of(ty: Type) -> Option<Family> {
    if ty.is_integral() {
        Some(Family::Int)
    } else if ty.is_float() {
        Some(Family::Float)
    } else if ty.is_str() {
        Some(Family::Str)
    } else {
        None
    }
}

fn binary_opcode(op: BinaryOp, family: Family) -> Option<Opcode> {
    use BinaryOp::*;
    use Family::*;

    let opcode = match (op, family) {
        (Add, Int) => Opcode::AddI,
        (Add, Float) => Opcode::AddF,
        (Add, Str) => Opcode::AddS,
        (Sub, Int) => Opcode::SubI,
        (Sub, Float) => Opcode::SubF,
        (Mul, Int) => Opcode::MulI,
        (Mul, Float) => Opcode::MulF,
        (Div, Int) => Opcode::DivI,
        (Div, Float) => Opcode::DivF,
        (Mod, Int) => Opcode::Mod,
        (Lt, Int) => Opcode::LtI,
        (Lt, Float) => Opcode::LtF,
        (Lt, Str) => Opcode::LtS,
        (Le, Int) => Opcode::LeI,
        (Le, Float) => Opcode::LeF,
        (Le, Str) => Opcode::LeS,
        (Gt, Int) => Opcode::GtI,
        (Gt, Float) => Opcode::GtF,
        (Gt, Str) => Opcode::GtS,
        (Ge, Int) => Opcode::GeI,
        (Ge, Float) => Opcode::GeF,
        (Ge, Str) => Opcode::GeS,
        (Eq, Int) => Opcode::EqI,
        (Eq, Float) => Opcode::EqF,
        (Eq, Str) => Opcode::EqS,
        (Ne, Int) => Opcode::NeI,
        (Ne, Float) => Opcode::NeF,
        (Ne, Str) => Opcode::NeS,
        (And, _) => Opcode::And,
        (Or, _) => Opcode::Or,
        (Sub | Mul | Div | Mod, Str) | (Mod, Float) => return None,
    };
    Some(opcode)
}

/// `depth` subscripts must all land inside `ty`.
fn check_depth(ty: Type, depth: usize) -> Result<()> {
    let mut current = ty;
    for _ in 0..depth {
        current = current
            .element()
            .ok_or(CodegenError::SubscriptOnScalar { ty: current })?;
    }
    Ok(())
}

/// `id[indices...]` as an expression of type `ty`.
fn element_of(id: SymbolId, indices: &[Expr], ty: Type) -> Expr {
    let mut current = Expr::new(ExprKind::Variable(id), None);
    for index in indices {
        current = Expr::new(
            ExprKind::Subscript {
                base: Box::new(current),
                index: Box::new(index.clone()),
            },
            None,
        );
    }
    current.ty = Some(ty);
    current
}

fn literal_size(expr: &Expr) -> Option<usize> {
    match expr.kind {
        ExprKind::Literal(Literal::Int(n)) => usize::try_from(n).ok(),
        ExprKind::Literal(Literal::UInt(n)) => usize::try_from(n).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::IntWidth;
    use night_common::ValueKind;

    fn lower(stmts: &[Stmt]) -> Result<Vec<Instruction>> {
        let mut ctx = CompileContext::new();
        let mut generator = Generator::new(&mut ctx);
        generator.stmts(stmts)?;
        let code = generator.finish();
        Ok(code
            .instructions()
            .map(|item| item.map(|(_, instr)| instr))
            .collect::<std::result::Result<_, _>>()?)
    }

    fn opcodes(stmts: &[Stmt]) -> Vec<Opcode> {
        lower(stmts).unwrap().iter().map(|i| i.opcode).collect()
    }

    #[test]
    fn operands_emitted_left_to_right() {
        let expr = Expr::binary(BinaryOp::Sub, Expr::int(9), Expr::int(4), Type::INT);
        let instrs = lower(&[Stmt::Expr(expr)]).unwrap();
        assert_eq!(
            instrs,
            vec![
                Instruction::push_int(9),
                Instruction::push_int(4),
                Instruction::op(Opcode::SubI),
                Instruction::op(Opcode::Pop),
            ]
        );
    }

    #[test]
    fn mixed_arithmetic_widens_int_side() {
        let expr = Expr::binary(BinaryOp::Mul, Expr::int(2), Expr::float(1.5), Type::FLOAT);
        assert_eq!(
            opcodes(&[Stmt::Expr(expr)]),
            vec![
                Opcode::PushI8,
                Opcode::IntToFloat,
                Opcode::PushF32,
                Opcode::MulF,
                Opcode::Pop,
            ]
        );
    }

    #[test]
    fn float_modulo_is_rejected() {
        let expr = Expr::binary(BinaryOp::Mod, Expr::float(1.0), Expr::int(2), Type::FLOAT);
        assert_eq!(
            lower(&[Stmt::Expr(expr)]),
            Err(CodegenError::UnsupportedOperator {
                op: "%",
                ty: Type::FLOAT,
            })
        );
    }

    #[test]
    fn char_joins_string() {
        let expr = Expr::binary(BinaryOp::Add, Expr::str("a"), Expr::char('b'), Type::STR);
        let instrs = lower(&[Stmt::Expr(expr)]).unwrap();
        assert!(instrs.contains(&Instruction::call(Builtin::CharToStr.id())));
        assert_eq!(instrs[instrs.len() - 2].opcode, Opcode::AddS);
    }

    #[test]
    fn declaration_casts_initializer() {
        let stmt = Stmt::VarInit {
            id: 64,
            ty: Type::FLOAT,
            sizes: vec![],
            init: Some(Expr::int(3)),
        };
        assert_eq!(
            opcodes(&[stmt]),
            vec![Opcode::PushI8, Opcode::IntToFloat, Opcode::Store]
        );

        let stmt = Stmt::VarInit {
            id: 64,
            ty: Type::BOOL,
            sizes: vec![],
            init: Some(Expr::float(0.5)),
        };
        assert_eq!(
            opcodes(&[stmt]),
            vec![Opcode::PushF32, Opcode::FloatToBool, Opcode::Store]
        );
    }

    #[test]
    fn uninitialized_declarations() {
        let stmts = [
            Stmt::VarInit {
                id: 64,
                ty: Type::STR,
                sizes: vec![],
                init: None,
            },
            Stmt::VarInit {
                id: 65,
                ty: Type::array(BaseType::UInt(IntWidth::W8), 2),
                sizes: vec![Some(Expr::int(2)), None],
                init: None,
            },
        ];
        let instrs = lower(&stmts).unwrap();
        assert_eq!(
            instrs,
            vec![
                Instruction::with_word(Opcode::AllocateString, 0),
                Instruction::store(64),
                Instruction::push_int(2),
                Instruction::push_int(0),
                Instruction::allocate_filled(2, ValueKind::UInt),
                Instruction::store(65),
            ]
        );
    }

    #[test]
    fn array_literal_padded_to_declared_size() {
        let stmt = Stmt::VarInit {
            id: 64,
            ty: Type::array(BaseType::Int(IntWidth::W64), 1),
            sizes: vec![Some(Expr::int(4))],
            init: Some(Expr::array(vec![Expr::int(1), Expr::int(2)], Type::INT)),
        };
        let instrs = lower(&[stmt]).unwrap();
        assert_eq!(
            instrs,
            vec![
                Instruction::push_int(1),
                Instruction::push_int(2),
                Instruction::push_int(0),
                Instruction::push_int(0),
                Instruction::with_word(Opcode::AllocateArray, 4),
                Instruction::store(64),
            ]
        );
    }

    #[test]
    fn variable_subscript_pushes_innermost_first() {
        let grid = Expr::var(64, Type::array(BaseType::Int(IntWidth::W32), 2));
        let expr = Expr::subscript(Expr::subscript(grid, Expr::int(1)), Expr::int(2));
        let instrs = lower(&[Stmt::Expr(expr)]).unwrap();
        assert_eq!(
            instrs,
            vec![
                Instruction::push_int(2),
                Instruction::push_int(1),
                Instruction::load_elem(64, 2),
                Instruction::op(Opcode::Pop),
            ]
        );
    }

    #[test]
    fn subscript_on_call_result_uses_index() {
        let call = Expr::call(Builtin::Input.id(), vec![], Some(Type::STR));
        let expr = Expr::subscript(call, Expr::int(0));
        assert_eq!(
            opcodes(&[Stmt::Expr(expr)]),
            vec![Opcode::Call, Opcode::PushI8, Opcode::Index, Opcode::Pop]
        );
    }

    #[test]
    fn scalar_subscript_is_rejected() {
        let expr = Expr::subscript(Expr::var(64, Type::INT), Expr::int(0));
        assert_eq!(
            lower(&[Stmt::Expr(expr)]),
            Err(CodegenError::SubscriptOnScalar { ty: Type::INT })
        );
    }

    #[test]
    fn void_call_statement_has_no_pop() {
        let print = Expr::call(Builtin::PrintI64.id(), vec![Expr::int(1)], None);
        assert_eq!(opcodes(&[Stmt::Expr(print)]), vec![Opcode::PushI8, Opcode::Call]);
    }

    #[test]
    fn builtin_arity_checked() {
        let call = Expr::call(Builtin::Len.id(), vec![], Some(Type::INT));
        assert_eq!(
            lower(&[Stmt::Expr(call)]),
            Err(CodegenError::ArityMismatch {
                id: Builtin::Len.id(),
                expected: 1,
                found: 0,
            })
        );
        let unknown = Expr::call(50, vec![], None);
        assert_eq!(
            lower(&[Stmt::Expr(unknown)]),
            Err(CodegenError::ReservedId { id: 50 })
        );
    }

    #[test]
    fn function_body_is_not_inlined() {
        let stmt = Stmt::Function {
            id: 80,
            params: vec![81],
            body: vec![Stmt::Return(Some(Expr::var(81, Type::INT)))],
        };
        let mut ctx = CompileContext::new();
        let mut generator = Generator::new(&mut ctx);
        generator.stmt(&stmt).unwrap();
        assert!(generator.finish().is_empty());
        let function = &ctx.functions()[&80];
        assert_eq!(function.params, vec![81]);
        assert_eq!(
            function.code,
            Bytecode::from_instructions(&[Instruction::load(81), Instruction::op(Opcode::Return)])
        );
    }

    #[test]
    fn missing_type_is_reported() {
        let untyped = Expr::new(ExprKind::Variable(64), None);
        let expr = Expr::binary(BinaryOp::Add, untyped, Expr::int(1), Type::INT);
        assert_eq!(
            lower(&[Stmt::Expr(expr)]),
            Err(CodegenError::MissingType {
                what: "left operand"
            })
        );
    }
}
