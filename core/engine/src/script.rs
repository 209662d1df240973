//! Compiled scripts.
//!
//! A [`Script`] is a unit of bytecode: a top-level program, a function body
//! or a piece of debugger eval code. Scripts compiled through
//! [`Context::compile`](crate::Context::compile) and every function script
//! are *held*: a holder object keeps them alive and they die with it.
//! Scripts evaluated directly are *non-held* and are destroyed as soon as
//! their single execution ends.

use std::rc::Rc;

use crate::{gc::Id, object::ObjectId, realm::RealmId, vm::opcode::Opcode};

/// Identifier of a compiled script.
pub type ScriptId = Id<Script>;

/// Source text handed to the compiler.
#[derive(Debug, Clone, Copy)]
pub struct Source<'a> {
    pub(crate) text: &'a str,
    pub(crate) url: &'a str,
    pub(crate) start_line: u32,
}

impl<'a> Source<'a> {
    /// Creates a source from program text.
    #[must_use]
    pub const fn from_bytes(text: &'a str) -> Self {
        Self {
            text,
            url: "<anonymous>",
            start_line: 1,
        }
    }

    /// Sets the url reported for scripts compiled from this source.
    #[must_use]
    pub const fn with_url(mut self, url: &'a str) -> Self {
        self.url = url;
        self
    }

    /// Sets the line number of the first line of the text.
    #[must_use]
    pub const fn with_start_line(mut self, line: u32) -> Self {
        self.start_line = line;
        self
    }
}

/// The syntactic origin of a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    /// Top-level program code.
    Global,
    /// A function body.
    Function,
}

/// Compiled bytecode plus the tables it refers to.
#[derive(Debug)]
pub struct Script {
    pub(crate) realm: RealmId,
    pub(crate) kind: ScriptKind,
    pub(crate) url: Rc<str>,
    pub(crate) name: Option<Rc<str>>,
    pub(crate) params: Vec<Rc<str>>,
    pub(crate) start_line: u32,
    pub(crate) end_line: u32,
    pub(crate) code: Vec<u8>,
    pub(crate) numbers: Vec<f64>,
    pub(crate) atoms: Vec<Rc<str>>,
    pub(crate) children: Vec<ScriptId>,
    pub(crate) lines: Vec<(u32, u32)>,
    pub(crate) boundaries: Vec<u32>,
    pub(crate) holder: Option<ObjectId>,
}

impl Script {
    /// The realm the script was compiled for.
    #[must_use]
    pub const fn realm(&self) -> RealmId {
        self.realm
    }

    /// Whether this is program or function code.
    #[must_use]
    pub const fn kind(&self) -> ScriptKind {
        self.kind
    }

    /// The url of the source the script was compiled from.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The function name, for named function scripts.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Parameter names, for function scripts.
    #[must_use]
    pub fn params(&self) -> &[Rc<str>] {
        &self.params
    }

    /// The line the script starts on.
    #[must_use]
    pub const fn start_line(&self) -> u32 {
        self.start_line
    }

    /// Number of source lines the script spans.
    #[must_use]
    pub const fn line_count(&self) -> u32 {
        self.end_line - self.start_line + 1
    }

    /// The bytecode, with any breakpoint patches applied.
    #[must_use]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Scripts of functions defined directly inside this script.
    #[must_use]
    pub fn children(&self) -> &[ScriptId] {
        &self.children
    }

    /// The object keeping this script alive, if it is held.
    #[must_use]
    pub const fn holder(&self) -> Option<ObjectId> {
        self.holder
    }

    /// Returns `true` if `offset` is the first byte of an instruction.
    #[must_use]
    pub fn is_instruction_boundary(&self, offset: u32) -> bool {
        self.boundaries.binary_search(&offset).is_ok()
    }

    /// The source line of the instruction at `offset`.
    #[must_use]
    pub fn offset_line(&self, offset: u32) -> Option<u32> {
        if offset as usize >= self.code.len() {
            return None;
        }
        let index = self.lines.partition_point(|&(start, _)| start <= offset);
        Some(
            index
                .checked_sub(1)
                .map_or(self.start_line, |i| self.lines[i].1),
        )
    }

    /// Offsets at which execution of a statement on `line` can begin.
    #[must_use]
    pub fn line_offsets(&self, line: u32) -> Vec<u32> {
        self.lines
            .iter()
            .filter(|&&(_, l)| l == line)
            .map(|&(offset, _)| offset)
            .collect()
    }

    /// Every line with code, paired with its statement entry offsets, in line order.
    #[must_use]
    pub fn all_offsets(&self) -> Vec<(u32, Vec<u32>)> {
        let mut result: Vec<(u32, Vec<u32>)> = Vec::new();
        let mut sorted = self.lines.clone();
        sorted.sort_by_key(|&(offset, line)| (line, offset));
        for (offset, line) in sorted {
            match result.last_mut() {
                Some((last, offsets)) if *last == line => offsets.push(offset),
                _ => result.push((line, vec![offset])),
            }
        }
        result
    }

    /// Decodes the opcode at `offset`. A patched byte decodes as [`Opcode::Trap`].
    #[must_use]
    pub fn opcode_at(&self, offset: u32) -> Option<Opcode> {
        self.code
            .get(offset as usize)
            .and_then(|&byte| Opcode::from_byte(byte))
    }

    pub(crate) fn read_u8(&self, offset: u32) -> u8 {
        self.code.get(offset as usize).copied().unwrap_or_default()
    }

    pub(crate) fn read_u16(&self, offset: u32) -> u16 {
        u16::from_le_bytes([self.read_u8(offset), self.read_u8(offset + 1)])
    }
}
