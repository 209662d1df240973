//! The virtual machine.
//!
//! Execution is re-entrant: every call runs a nested instance of the
//! interpreter loop, so debugger hooks may call back into the context to any
//! depth. The loop never holds a borrow of the context across an
//! instruction; all state lives in [`Vm`] and is addressed by index.
//!
//! The loop reports debugger events at fixed points: frame entry and exit,
//! patched breakpoint sites, `debugger` statements, and exceptions about to
//! leave a frame.

use std::{ops::ControlFlow, rc::Rc};

use crate::{
    Context, JsError, JsNativeErrorKind, JsResult, JsValue,
    debugger::{DebugApi, Resumption, TrapOutcome},
    object::{FunctionKind, ObjectKind},
    realm::Realm,
};

pub mod frame;
pub mod opcode;

pub use frame::{CallFrame, FrameId, FrameKind};
pub use opcode::Opcode;

/// How an instruction or a whole frame completed.
#[derive(Debug)]
pub(crate) enum CompletionRecord {
    Return(JsValue),
    Throw(JsError),
}

/// The default maximum number of nested frames.
pub const DEFAULT_MAX_STACK_DEPTH: usize = 512;

/// Interpreter state: the frame stack and the shared operand stack.
#[derive(Debug)]
pub struct Vm {
    pub(crate) frames: Vec<CallFrame>,
    pub(crate) stack: Vec<JsValue>,
    pub(crate) next_frame_id: u64,
    pub(crate) max_stack_depth: usize,
    pub(crate) cost: u64,
    /// The exception the debuggers last saw leave a frame, while it
    /// propagates into outer frames.
    pub(crate) reported: Option<JsError>,
}

impl Default for Vm {
    fn default() -> Self {
        Self {
            frames: Vec::new(),
            stack: Vec::new(),
            next_frame_id: 1,
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
            cost: 0,
            reported: None,
        }
    }
}

impl Vm {
    pub(crate) fn push(&mut self, value: JsValue) {
        self.stack.push(value);
    }

    pub(crate) fn pop(&mut self) -> JsValue {
        self.stack.pop().unwrap_or_default()
    }

    pub(crate) fn pop_n(&mut self, n: usize) -> Vec<JsValue> {
        let at = self.stack.len().saturating_sub(n);
        self.stack.split_off(at)
    }

    pub(crate) fn frame(&self) -> Option<&CallFrame> {
        self.frames.last()
    }

    pub(crate) fn frame_mut(&mut self) -> Option<&mut CallFrame> {
        self.frames.last_mut()
    }

    /// The live frames, oldest first.
    #[must_use]
    pub fn frames(&self) -> &[CallFrame] {
        &self.frames
    }
}

impl Resumption {
    /// Maps a resumption onto the control flow of the running frame.
    pub(crate) fn into_control_flow(self) -> ControlFlow<CompletionRecord> {
        match self {
            Self::Continue => ControlFlow::Continue(()),
            Self::Return(value) => ControlFlow::Break(CompletionRecord::Return(value)),
            Self::Throw(value) => ControlFlow::Break(CompletionRecord::Throw(JsError::Thrown(value))),
            Self::Abort => ControlFlow::Break(CompletionRecord::Throw(JsError::Terminated)),
        }
    }
}

impl Context {
    pub(crate) fn handle_error(&mut self, err: JsError) -> ControlFlow<CompletionRecord> {
        ControlFlow::Break(CompletionRecord::Throw(err))
    }

    /// Reads the `u8` operand at `offset` bytes past the current opcode.
    pub(crate) fn operand_u8(&self, offset: u32) -> u8 {
        self.vm
            .frame()
            .and_then(|frame| Some(self.scripts.get(frame.script)?.read_u8(frame.pc + 1 + offset)))
            .unwrap_or_default()
    }

    /// Reads the `u16` operand at `offset` bytes past the current opcode.
    pub(crate) fn operand_u16(&self, offset: u32) -> u16 {
        self.vm
            .frame()
            .and_then(|frame| Some(self.scripts.get(frame.script)?.read_u16(frame.pc + 1 + offset)))
            .unwrap_or_default()
    }

    /// Resolves an atom of the current script.
    pub(crate) fn atom(&self, index: u16) -> Rc<str> {
        self.vm
            .frame()
            .and_then(|frame| self.scripts.get(frame.script)?.atoms.get(usize::from(index)).cloned())
            .unwrap_or_else(|| "".into())
    }

    /// Pushes `frame`, runs it to completion and pops it again.
    pub(crate) fn run_frame(&mut self, mut frame: CallFrame) -> JsResult<JsValue> {
        if self.vm.frames.len() >= self.vm.max_stack_depth {
            return Err(JsError::range_error("too much recursion"));
        }
        frame.id = FrameId(self.vm.next_frame_id);
        self.vm.next_frame_id += 1;
        frame.stack_base = self.vm.stack.len();
        let realm = frame.realm;
        self.vm.frames.push(frame);

        if self.realms.get(realm).is_some_and(Realm::is_under_debug) {
            DebugApi::on_enter_frame(self);
        }

        let record = self.run();

        DebugApi::on_leave_frame(self);
        if let Some(frame) = self.vm.frames.pop() {
            self.vm.stack.truncate(frame.stack_base);
        }

        match record {
            CompletionRecord::Return(value) => Ok(value),
            CompletionRecord::Throw(err) => Err(err),
        }
    }

    fn run(&mut self) -> CompletionRecord {
        loop {
            self.vm.reported = None;
            let Some(frame) = self.vm.frame() else {
                return CompletionRecord::Throw(JsError::native(
                    JsNativeErrorKind::Error,
                    "no frame to execute",
                ));
            };
            let (script, pc) = (frame.script, frame.pc);
            let byte = self
                .scripts
                .get(script)
                .and_then(|s| s.code.get(pc as usize).copied());

            let opcode = match byte.map(Opcode::from_byte) {
                Some(Some(Opcode::Trap)) => match DebugApi::on_trap(self, script, pc) {
                    TrapOutcome::Execute(opcode) => opcode,
                    TrapOutcome::Complete(resumption) => match resumption.into_control_flow() {
                        ControlFlow::Continue(()) => {
                            return CompletionRecord::Throw(JsError::native(
                                JsNativeErrorKind::Error,
                                "breakpoint trap completed without a directive",
                            ));
                        }
                        ControlFlow::Break(CompletionRecord::Return(value)) => {
                            return CompletionRecord::Return(value);
                        }
                        ControlFlow::Break(CompletionRecord::Throw(err)) => return self.unwind(err),
                    },
                    TrapOutcome::Error(err) => return self.unwind(err),
                },
                Some(Some(opcode)) => opcode,
                _ => {
                    return CompletionRecord::Throw(JsError::native(
                        JsNativeErrorKind::Error,
                        format!("invalid bytecode at offset {pc}"),
                    ));
                }
            };

            if let Some(frame) = self.vm.frame_mut() {
                frame.next_pc = pc + opcode.length();
            }
            self.vm.cost += u64::from(opcode.cost());

            #[cfg(feature = "trace")]
            log::trace!(
                "{:06} {:<16} {:<24} stack: {}",
                pc,
                opcode.as_str(),
                opcode.as_instruction_str(),
                self.vm.stack.len()
            );

            match opcode.execute(self) {
                ControlFlow::Continue(()) => {
                    if let Some(frame) = self.vm.frame_mut() {
                        frame.pc = frame.next_pc;
                    }
                }
                ControlFlow::Break(CompletionRecord::Return(value)) => {
                    return CompletionRecord::Return(value);
                }
                ControlFlow::Break(CompletionRecord::Throw(err)) => return self.unwind(err),
            }
        }
    }

    /// An exception is about to leave the current frame.
    ///
    /// The throw hook sees each exception once, in the frame that raised it;
    /// outer frames the same exception propagates through stay silent.
    fn unwind(&mut self, err: JsError) -> CompletionRecord {
        if let Some(reported) = self.vm.reported.take()
            && reported.is_same(&err)
        {
            self.vm.reported = Some(reported);
            return CompletionRecord::Throw(err);
        }
        match DebugApi::on_exception_unwind(self, err) {
            Ok(value) => CompletionRecord::Return(value),
            Err(err) => {
                self.vm.reported = Some(err.clone());
                CompletionRecord::Throw(err)
            }
        }
    }

    /// Calls `function` with the given `this` and arguments.
    pub fn call(&mut self, function: &JsValue, this: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
        let Some(id) = function.as_object() else {
            return Err(JsError::type_error(format!(
                "{} is not a function",
                self.display_value(function)
            )));
        };
        let object = self.object_or_throw(id)?;
        let (kind, realm) = (object.kind.clone(), object.realm);
        match kind {
            ObjectKind::Function(FunctionKind::Native { function, .. }) => function.call(this, args, self),
            ObjectKind::Function(FunctionKind::Interpreted { script, scope }) => {
                let params = self
                    .scripts
                    .get(script)
                    .map(|s| s.params.clone())
                    .unwrap_or_default();
                let call_scope = self.alloc_object(realm, ObjectKind::Scope { parent: scope });
                for (index, param) in params.iter().enumerate() {
                    let value = args.get(index).cloned().unwrap_or_default();
                    self.define_property(call_scope, param, value)?;
                }
                let this = if this.is_null_or_undefined() {
                    JsValue::Object(self.global_object_of(realm)?)
                } else {
                    this.clone()
                };
                let frame = CallFrame::new(FrameKind::Call, realm, script, call_scope, this)
                    .with_call(id, args.to_vec());
                self.run_frame(frame)
            }
            ObjectKind::Wrapper(target) => {
                let target_realm = self.object_or_throw(target)?.realm;
                let this = self.wrap_into(target_realm, this.clone())?;
                let args = args
                    .iter()
                    .map(|arg| self.wrap_into(target_realm, arg.clone()))
                    .collect::<JsResult<Vec<_>>>()?;
                match self.call(&JsValue::Object(target), &this, &args) {
                    Ok(result) => self.wrap_into(realm, result),
                    Err(JsError::Thrown(value)) => Err(JsError::Thrown(self.wrap_into(realm, value)?)),
                    Err(err) => Err(err),
                }
            }
            _ => Err(JsError::type_error(format!(
                "{} is not a function",
                self.display_value(function)
            ))),
        }
    }

    /// Total cost of the instructions executed so far.
    #[must_use]
    pub const fn instruction_cost(&self) -> u64 {
        self.vm.cost
    }

    /// Sets the maximum number of nested frames.
    pub const fn set_max_stack_depth(&mut self, depth: usize) {
        self.vm.max_stack_depth = depth;
    }
}
