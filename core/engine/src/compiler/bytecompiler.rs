//! Emits bytecode for a syntax tree.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::{
    JsError, JsResult,
    compiler::{
        ScriptData,
        ast::{BinaryOp, Expr, FunctionNode, LogicalOp, Stmt, UnaryOp},
    },
    script::ScriptKind,
    vm::Opcode,
};

/// A jump whose target operand still has to be patched.
#[derive(Debug, Clone, Copy)]
struct Label(usize);

pub(crate) struct ByteCompiler {
    kind: ScriptKind,
    code: Vec<u8>,
    numbers: Vec<f64>,
    number_map: FxHashMap<u64, u16>,
    atoms: Vec<Rc<str>>,
    atom_map: FxHashMap<Rc<str>, u16>,
    children: Vec<ScriptData>,
    lines: Vec<(u32, u32)>,
    boundaries: Vec<u32>,
}

impl ByteCompiler {
    fn new(kind: ScriptKind) -> Self {
        Self {
            kind,
            code: Vec::new(),
            numbers: Vec::new(),
            number_map: FxHashMap::default(),
            atoms: Vec::new(),
            atom_map: FxHashMap::default(),
            children: Vec::new(),
            lines: Vec::new(),
            boundaries: Vec::new(),
        }
    }

    /// Compiles top-level program code.
    pub(crate) fn compile_program(body: &[Stmt], start_line: u32, end_line: u32) -> JsResult<ScriptData> {
        let mut compiler = Self::new(ScriptKind::Global);
        compiler.compile_body(body)?;
        compiler.emit(Opcode::RetRval, &[]);
        compiler.finish(None, Vec::new(), start_line, end_line)
    }

    fn compile_function(function: &FunctionNode) -> JsResult<ScriptData> {
        let mut compiler = Self::new(ScriptKind::Function);
        compiler.compile_body(&function.body)?;
        compiler.emit(Opcode::PushUndefined, &[]);
        compiler.emit(Opcode::Return, &[]);
        compiler.finish(
            function.name.clone(),
            function.params.clone(),
            function.start_line,
            function.end_line,
        )
    }

    fn finish(
        self,
        name: Option<Rc<str>>,
        params: Vec<Rc<str>>,
        start_line: u32,
        end_line: u32,
    ) -> JsResult<ScriptData> {
        if self.code.len() > usize::from(u16::MAX) {
            return Err(JsError::syntax_error("script is too large"));
        }
        Ok(ScriptData {
            kind: self.kind,
            name,
            params,
            start_line,
            end_line: end_line.max(start_line),
            code: self.code,
            numbers: self.numbers,
            atoms: self.atoms,
            children: self.children,
            lines: self.lines,
            boundaries: self.boundaries,
        })
    }

    fn offset(&self) -> u32 {
        u32::try_from(self.code.len()).unwrap_or(u32::MAX)
    }

    fn emit(&mut self, opcode: Opcode, operands: &[u8]) {
        self.boundaries.push(self.offset());
        self.code.push(opcode as u8);
        self.code.extend_from_slice(operands);
    }

    fn emit_u16(&mut self, opcode: Opcode, operand: u16) {
        self.emit(opcode, &operand.to_le_bytes());
    }

    fn emit_jump(&mut self, opcode: Opcode) -> Label {
        self.emit_u16(opcode, u16::MAX);
        Label(self.code.len() - 2)
    }

    fn patch(&mut self, label: Label) {
        let target = u16::try_from(self.code.len()).unwrap_or(u16::MAX).to_le_bytes();
        self.code[label.0] = target[0];
        self.code[label.0 + 1] = target[1];
    }

    fn emit_jump_to(&mut self, opcode: Opcode, target: u32) {
        self.emit_u16(opcode, u16::try_from(target).unwrap_or(u16::MAX));
    }

    /// Records that a statement on `line` starts at the current offset.
    fn mark_line(&mut self, line: u32) {
        let offset = self.offset();
        match self.lines.last_mut() {
            Some(last) if last.0 == offset => last.1 = line,
            _ => self.lines.push((offset, line)),
        }
    }

    fn atom(&mut self, name: &Rc<str>) -> JsResult<u16> {
        if let Some(&index) = self.atom_map.get(name) {
            return Ok(index);
        }
        let index = u16::try_from(self.atoms.len())
            .map_err(|_| JsError::syntax_error("too many names in one script"))?;
        self.atoms.push(name.clone());
        self.atom_map.insert(name.clone(), index);
        Ok(index)
    }

    fn number(&mut self, n: f64) -> JsResult<u16> {
        if let Some(&index) = self.number_map.get(&n.to_bits()) {
            return Ok(index);
        }
        let index = u16::try_from(self.numbers.len())
            .map_err(|_| JsError::syntax_error("too many constants in one script"))?;
        self.numbers.push(n);
        self.number_map.insert(n.to_bits(), index);
        Ok(index)
    }

    fn child(&mut self, function: &FunctionNode) -> JsResult<u16> {
        let data = Self::compile_function(function)?;
        let index = u16::try_from(self.children.len())
            .map_err(|_| JsError::syntax_error("too many functions in one script"))?;
        self.children.push(data);
        Ok(index)
    }

    /// Emits the hoisted declarations, then the statements.
    fn compile_body(&mut self, body: &[Stmt]) -> JsResult<()> {
        let mut vars = Vec::new();
        let mut functions = Vec::new();
        hoist(body, &mut vars, &mut functions);

        for name in &vars {
            let index = self.atom(name)?;
            self.emit_u16(Opcode::DefVar, index);
        }
        for function in functions {
            let Some(name) = &function.name else {
                continue;
            };
            let child = self.child(function)?;
            let index = self.atom(name)?;
            self.emit_u16(Opcode::Lambda, child);
            self.emit_u16(Opcode::SetName, index);
            self.emit(Opcode::Pop, &[]);
        }

        for stmt in body {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    fn compile_statement(&mut self, stmt: &Stmt) -> JsResult<()> {
        match stmt {
            Stmt::Empty | Stmt::Function(_) => {}
            Stmt::Block(body) => {
                for stmt in body {
                    self.compile_statement(stmt)?;
                }
            }
            Stmt::Var { declarations, line } => {
                if declarations.iter().any(|(_, init)| init.is_some()) {
                    self.mark_line(*line);
                }
                for (name, init) in declarations {
                    let Some(init) = init else {
                        continue;
                    };
                    self.compile_expression(init)?;
                    let index = self.atom(name)?;
                    self.emit_u16(Opcode::SetName, index);
                    self.emit(Opcode::Pop, &[]);
                }
            }
            Stmt::Expression { expr, line } => {
                self.mark_line(*line);
                self.compile_expression(expr)?;
                match self.kind {
                    ScriptKind::Global => self.emit(Opcode::SetRval, &[]),
                    ScriptKind::Function => self.emit(Opcode::Pop, &[]),
                }
            }
            Stmt::Return { value, line } => {
                self.mark_line(*line);
                match value {
                    Some(value) => self.compile_expression(value)?,
                    None => self.emit(Opcode::PushUndefined, &[]),
                }
                self.emit(Opcode::Return, &[]);
            }
            Stmt::If {
                condition,
                then,
                otherwise,
                line,
            } => {
                self.mark_line(*line);
                self.compile_expression(condition)?;
                let else_label = self.emit_jump(Opcode::JumpIfFalse);
                self.compile_statement(then)?;
                if let Some(otherwise) = otherwise {
                    let end_label = self.emit_jump(Opcode::Jump);
                    self.patch(else_label);
                    self.compile_statement(otherwise)?;
                    self.patch(end_label);
                } else {
                    self.patch(else_label);
                }
            }
            Stmt::While {
                condition,
                body,
                line,
            } => {
                let start = self.offset();
                self.mark_line(*line);
                self.compile_expression(condition)?;
                let end_label = self.emit_jump(Opcode::JumpIfFalse);
                self.compile_statement(body)?;
                self.emit_jump_to(Opcode::Jump, start);
                self.patch(end_label);
            }
            Stmt::Throw { value, line } => {
                self.mark_line(*line);
                self.compile_expression(value)?;
                self.emit(Opcode::Throw, &[]);
            }
            Stmt::Debugger { line } => {
                self.mark_line(*line);
                self.emit(Opcode::Debugger, &[]);
            }
        }
        Ok(())
    }

    fn compile_expression(&mut self, expr: &Expr) -> JsResult<()> {
        match expr {
            Expr::Number(n) => {
                let index = self.number(*n)?;
                self.emit_u16(Opcode::PushNumber, index);
            }
            Expr::String(s) => {
                let index = self.atom(s)?;
                self.emit_u16(Opcode::PushString, index);
            }
            Expr::Boolean(true) => self.emit(Opcode::PushTrue, &[]),
            Expr::Boolean(false) => self.emit(Opcode::PushFalse, &[]),
            Expr::Null => self.emit(Opcode::PushNull, &[]),
            Expr::Undefined => self.emit(Opcode::PushUndefined, &[]),
            Expr::This => self.emit(Opcode::PushThis, &[]),
            Expr::Identifier(name) => {
                let index = self.atom(name)?;
                self.emit_u16(Opcode::GetName, index);
            }
            Expr::Object(properties) => {
                self.emit(Opcode::NewObject, &[]);
                for (key, value) in properties {
                    self.compile_expression(value)?;
                    let index = self.atom(key)?;
                    self.emit_u16(Opcode::InitProp, index);
                }
            }
            Expr::Function(function) => {
                let child = self.child(function)?;
                self.emit_u16(Opcode::Lambda, child);
            }
            Expr::Unary(op, operand) => {
                self.compile_expression(operand)?;
                let opcode = match op {
                    UnaryOp::Neg => Opcode::Neg,
                    UnaryOp::Not => Opcode::Not,
                    UnaryOp::TypeOf => Opcode::TypeOf,
                };
                self.emit(opcode, &[]);
            }
            Expr::Binary(op, lhs, rhs) => {
                self.compile_expression(lhs)?;
                self.compile_expression(rhs)?;
                let opcode = match op {
                    BinaryOp::Add => Opcode::Add,
                    BinaryOp::Sub => Opcode::Sub,
                    BinaryOp::Mul => Opcode::Mul,
                    BinaryOp::Div => Opcode::Div,
                    BinaryOp::Mod => Opcode::Mod,
                    BinaryOp::Eq => Opcode::Eq,
                    BinaryOp::NotEq => Opcode::NotEq,
                    BinaryOp::StrictEq => Opcode::StrictEq,
                    BinaryOp::StrictNotEq => Opcode::StrictNotEq,
                    BinaryOp::Less => Opcode::LessThan,
                    BinaryOp::LessEq => Opcode::LessThanOrEq,
                    BinaryOp::Greater => Opcode::GreaterThan,
                    BinaryOp::GreaterEq => Opcode::GreaterThanOrEq,
                };
                self.emit(opcode, &[]);
            }
            Expr::Logical(op, lhs, rhs) => {
                self.compile_expression(lhs)?;
                self.emit(Opcode::Dup, &[]);
                let end_label = self.emit_jump(match op {
                    LogicalOp::And => Opcode::JumpIfFalse,
                    LogicalOp::Or => Opcode::JumpIfTrue,
                });
                self.emit(Opcode::Pop, &[]);
                self.compile_expression(rhs)?;
                self.patch(end_label);
            }
            Expr::Assign { target, value } => match target.as_ref() {
                Expr::Identifier(name) => {
                    self.compile_expression(value)?;
                    let index = self.atom(name)?;
                    self.emit_u16(Opcode::SetName, index);
                }
                Expr::Member { object, name } => {
                    self.compile_expression(object)?;
                    self.compile_expression(value)?;
                    let index = self.atom(name)?;
                    self.emit_u16(Opcode::SetProp, index);
                }
                _ => return Err(JsError::syntax_error("invalid assignment target")),
            },
            Expr::Member { object, name } => {
                self.compile_expression(object)?;
                let index = self.atom(name)?;
                self.emit_u16(Opcode::GetProp, index);
            }
            Expr::Call { callee, args } => {
                let argc = u8::try_from(args.len())
                    .map_err(|_| JsError::syntax_error("too many arguments"))?;
                if let Expr::Member { object, name } = callee.as_ref() {
                    self.compile_expression(object)?;
                    for arg in args {
                        self.compile_expression(arg)?;
                    }
                    let [lo, hi] = self.atom(name)?.to_le_bytes();
                    self.emit(Opcode::CallMethod, &[lo, hi, argc]);
                } else {
                    self.compile_expression(callee)?;
                    for arg in args {
                        self.compile_expression(arg)?;
                    }
                    self.emit(Opcode::Call, &[argc]);
                }
            }
        }
        Ok(())
    }
}

/// Collects `var` names and function declarations of one function body,
/// without descending into nested functions.
fn hoist<'a>(body: &'a [Stmt], vars: &mut Vec<Rc<str>>, functions: &mut Vec<&'a FunctionNode>) {
    for stmt in body {
        match stmt {
            Stmt::Var { declarations, .. } => {
                for (name, _) in declarations {
                    if !vars.contains(name) {
                        vars.push(name.clone());
                    }
                }
            }
            Stmt::Function(function) => {
                if let Some(name) = &function.name
                    && !vars.contains(name)
                {
                    vars.push(name.clone());
                }
                functions.push(function);
            }
            Stmt::Block(body) => hoist(body, vars, functions),
            Stmt::If { then, otherwise, .. } => {
                hoist(std::slice::from_ref(&**then), vars, functions);
                if let Some(otherwise) = otherwise {
                    hoist(std::slice::from_ref(&**otherwise), vars, functions);
                }
            }
            Stmt::While { body, .. } => hoist(std::slice::from_ref(&**body), vars, functions),
            _ => {}
        }
    }
}
