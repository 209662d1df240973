//! The bytecode instruction set.
//!
//! Every instruction is one opcode byte followed by its operands, encoded
//! little endian. An instruction's length depends only on its opcode, so a
//! breakpoint can replace the opcode byte with [`Opcode::Trap`] without
//! disturbing the operands; the original byte is kept by the breakpoint site.

use std::ops::ControlFlow;

use crate::{
    Context,
    vm::CompletionRecord,
};

mod binary_ops;
mod call;
mod control_flow;
mod debugger;
mod environment;
mod property;
mod push;

use binary_ops::{
    Add, Div, Eq, GreaterThan, GreaterThanOrEq, LessThan, LessThanOrEq, Mod, Mul, Neg, Not,
    NotEq, StrictEq, StrictNotEq, Sub, TypeOf,
};
use call::{Call, CallMethod};
use control_flow::{Dup, Jump, JumpIfFalse, JumpIfTrue, Nop, Pop, RetRval, Return, SetRval, Throw};
use debugger::{Debugger, Trap};
use environment::{DefVar, GetName, SetName};
use property::{GetProp, InitProp, SetProp};
use push::{
    Lambda, NewObject, PushFalse, PushNull, PushNumber, PushString, PushThis, PushTrue,
    PushUndefined,
};

/// A single instruction implementation.
pub(crate) trait Operation {
    const NAME: &'static str;
    const INSTRUCTION: &'static str;
    const COST: u8;

    /// Executes the instruction at the current frame's `pc`.
    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord>;
}

macro_rules! generate_opcodes {
    ( $( $(#[$comment:meta])* $Variant:ident => $len:literal, )* ) => {
        /// The opcodes of the virtual machine.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $( $(#[$comment])* $Variant, )*
        }

        impl Opcode {
            const ALL: &'static [Self] = &[ $( Self::$Variant, )* ];

            /// Decodes an opcode byte.
            #[must_use]
            pub fn from_byte(byte: u8) -> Option<Self> {
                Self::ALL.get(usize::from(byte)).copied()
            }

            /// Length in bytes of the instruction, operands included.
            #[must_use]
            pub const fn length(self) -> u32 {
                match self {
                    $( Self::$Variant => $len, )*
                }
            }

            /// The opcode's name.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Self::$Variant => <$Variant as Operation>::NAME, )*
                }
            }

            /// A short description used by instruction traces.
            #[must_use]
            pub const fn as_instruction_str(self) -> &'static str {
                match self {
                    $( Self::$Variant => <$Variant as Operation>::INSTRUCTION, )*
                }
            }

            pub(crate) const fn cost(self) -> u8 {
                match self {
                    $( Self::$Variant => <$Variant as Operation>::COST, )*
                }
            }

            pub(crate) fn execute(self, context: &mut Context) -> ControlFlow<CompletionRecord> {
                match self {
                    $( Self::$Variant => $Variant::execute(context), )*
                }
            }
        }
    };
}

generate_opcodes! {
    /// No-operation.
    ///
    /// Stack: **=>**
    Nop => 1,

    /// Push `undefined`.
    ///
    /// Stack: **=>** `undefined`
    PushUndefined => 1,

    /// Push `null`.
    ///
    /// Stack: **=>** `null`
    PushNull => 1,

    /// Push `true`.
    ///
    /// Stack: **=>** `true`
    PushTrue => 1,

    /// Push `false`.
    ///
    /// Stack: **=>** `false`
    PushFalse => 1,

    /// Push the frame's `this` value.
    ///
    /// Stack: **=>** this
    PushThis => 1,

    /// Push a number from the constant table.
    ///
    /// Operands: index: `u16`
    ///
    /// Stack: **=>** number
    PushNumber => 3,

    /// Push a string from the atom table.
    ///
    /// Operands: index: `u16`
    ///
    /// Stack: **=>** string
    PushString => 3,

    /// Create an empty object.
    ///
    /// Stack: **=>** object
    NewObject => 1,

    /// Define a property on the object below the value.
    ///
    /// Operands: name: `u16`
    ///
    /// Stack: object, value **=>** object
    InitProp => 3,

    /// Resolve a name along the scope chain.
    ///
    /// Operands: name: `u16`
    ///
    /// Stack: **=>** value
    GetName => 3,

    /// Assign to a name along the scope chain.
    ///
    /// Operands: name: `u16`
    ///
    /// Stack: value **=>** value
    SetName => 3,

    /// Declare a variable in the frame's scope.
    ///
    /// Operands: name: `u16`
    ///
    /// Stack: **=>**
    DefVar => 3,

    /// Read a property.
    ///
    /// Operands: name: `u16`
    ///
    /// Stack: object **=>** value
    GetProp => 3,

    /// Write a property.
    ///
    /// Operands: name: `u16`
    ///
    /// Stack: object, value **=>** value
    SetProp => 3,

    /// Create a closure over the current scope.
    ///
    /// Operands: child script index: `u16`
    ///
    /// Stack: **=>** function
    Lambda => 3,

    /// Call a function with `this` set to `undefined`.
    ///
    /// Operands: argument count: `u8`
    ///
    /// Stack: func, argument_1, ... argument_n **=>** result
    Call => 2,

    /// Call a method of an object.
    ///
    /// Operands: name: `u16`, argument count: `u8`
    ///
    /// Stack: object, argument_1, ... argument_n **=>** result
    CallMethod => 4,

    /// Binary `+` operator.
    ///
    /// Stack: lhs, rhs **=>** (lhs + rhs)
    Add => 1,

    /// Binary `-` operator.
    ///
    /// Stack: lhs, rhs **=>** (lhs - rhs)
    Sub => 1,

    /// Binary `*` operator.
    ///
    /// Stack: lhs, rhs **=>** (lhs * rhs)
    Mul => 1,

    /// Binary `/` operator.
    ///
    /// Stack: lhs, rhs **=>** (lhs / rhs)
    Div => 1,

    /// Binary `%` operator.
    ///
    /// Stack: lhs, rhs **=>** (lhs % rhs)
    Mod => 1,

    /// Binary `==` operator.
    ///
    /// Stack: lhs, rhs **=>** (lhs == rhs)
    Eq => 1,

    /// Binary `!=` operator.
    ///
    /// Stack: lhs, rhs **=>** (lhs != rhs)
    NotEq => 1,

    /// Binary `===` operator.
    ///
    /// Stack: lhs, rhs **=>** (lhs === rhs)
    StrictEq => 1,

    /// Binary `!==` operator.
    ///
    /// Stack: lhs, rhs **=>** (lhs !== rhs)
    StrictNotEq => 1,

    /// Binary `<` operator.
    ///
    /// Stack: lhs, rhs **=>** (lhs < rhs)
    LessThan => 1,

    /// Binary `<=` operator.
    ///
    /// Stack: lhs, rhs **=>** (lhs <= rhs)
    LessThanOrEq => 1,

    /// Binary `>` operator.
    ///
    /// Stack: lhs, rhs **=>** (lhs > rhs)
    GreaterThan => 1,

    /// Binary `>=` operator.
    ///
    /// Stack: lhs, rhs **=>** (lhs >= rhs)
    GreaterThanOrEq => 1,

    /// Unary `-` operator.
    ///
    /// Stack: value **=>** (-value)
    Neg => 1,

    /// Unary `!` operator.
    ///
    /// Stack: value **=>** (!value)
    Not => 1,

    /// Unary `typeof` operator.
    ///
    /// Stack: value **=>** (typeof value)
    TypeOf => 1,

    /// Pop the top value.
    ///
    /// Stack: value **=>**
    Pop => 1,

    /// Duplicate the top value.
    ///
    /// Stack: value **=>** value, value
    Dup => 1,

    /// Store the top value as the frame's completion value.
    ///
    /// Stack: value **=>**
    SetRval => 1,

    /// Unconditional jump.
    ///
    /// Operands: target: `u16`
    ///
    /// Stack: **=>**
    Jump => 3,

    /// Jump if the popped value is falsy.
    ///
    /// Operands: target: `u16`
    ///
    /// Stack: cond **=>**
    JumpIfFalse => 3,

    /// Jump if the popped value is truthy.
    ///
    /// Operands: target: `u16`
    ///
    /// Stack: cond **=>**
    JumpIfTrue => 3,

    /// Return the popped value from the frame.
    ///
    /// Stack: value **=>**
    Return => 1,

    /// Return the frame's completion value.
    ///
    /// Stack: **=>**
    RetRval => 1,

    /// Throw the popped value.
    ///
    /// Stack: value **=>**
    Throw => 1,

    /// The `debugger` statement.
    ///
    /// Stack: **=>**
    Debugger => 1,

    /// A patched breakpoint site. Never emitted by the compiler.
    ///
    /// Stack: **=>**
    Trap => 1,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_bytes_round_trip() {
        for &op in Opcode::ALL {
            assert_eq!(Opcode::from_byte(op as u8), Some(op));
        }
        assert_eq!(Opcode::from_byte(u8::MAX), None);
    }

    #[test]
    fn trap_has_no_operands() {
        assert_eq!(Opcode::Trap.length(), 1);
        assert_eq!(Opcode::Trap.as_str(), "Trap");
        assert_eq!(Opcode::CallMethod.length(), 4);
    }
}
