use std::ops::ControlFlow;

use crate::{
    Context, JsValue,
    vm::{CompletionRecord, opcode::Operation},
};

fn add(lhs: &JsValue, rhs: &JsValue) -> JsValue {
    match (lhs, rhs) {
        (JsValue::String(a), b) => JsValue::from(format!("{a}{b}")),
        (a, JsValue::String(b)) => JsValue::from(format!("{a}{b}")),
        _ => JsValue::Number(lhs.to_number() + rhs.to_number()),
    }
}

fn compare(lhs: &JsValue, rhs: &JsValue, f: fn(std::cmp::Ordering) -> bool) -> JsValue {
    let ordering = match (lhs, rhs) {
        (JsValue::String(a), JsValue::String(b)) => Some(a.cmp(b)),
        _ => lhs.to_number().partial_cmp(&rhs.to_number()),
    };
    JsValue::Boolean(ordering.is_some_and(f))
}

macro_rules! implement_bin_ops {
    ($name:ident, $cost:literal, $doc:literal, |$lhs:ident, $rhs:ident| $body:expr) => {
        #[doc = concat!("`", stringify!($name), "` implements the Opcode Operation for `Opcode::", stringify!($name), "`\n\n")]
        #[doc = "Operation:\n"]
        #[doc = concat!(" - ", $doc)]
        #[derive(Debug, Clone, Copy)]
        pub(crate) struct $name;

        impl Operation for $name {
            const NAME: &'static str = stringify!($name);
            const INSTRUCTION: &'static str = concat!("INST - ", stringify!($name));
            const COST: u8 = $cost;

            fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
                let $rhs = context.vm.pop();
                let $lhs = context.vm.pop();
                context.vm.push($body);
                ControlFlow::Continue(())
            }
        }
    };
}

implement_bin_ops!(Add, 2, "Binary `+` operator.", |lhs, rhs| add(&lhs, &rhs));
implement_bin_ops!(Sub, 1, "Binary `-` operator.", |lhs, rhs| JsValue::Number(
    lhs.to_number() - rhs.to_number()
));
implement_bin_ops!(Mul, 1, "Binary `*` operator.", |lhs, rhs| JsValue::Number(
    lhs.to_number() * rhs.to_number()
));
implement_bin_ops!(Div, 1, "Binary `/` operator.", |lhs, rhs| JsValue::Number(
    lhs.to_number() / rhs.to_number()
));
implement_bin_ops!(Mod, 1, "Binary `%` operator.", |lhs, rhs| JsValue::Number(
    lhs.to_number() % rhs.to_number()
));
implement_bin_ops!(Eq, 1, "Binary `==` operator.", |lhs, rhs| JsValue::Boolean(
    lhs.loose_equals(&rhs)
));
implement_bin_ops!(NotEq, 1, "Binary `!=` operator.", |lhs, rhs| JsValue::Boolean(
    !lhs.loose_equals(&rhs)
));
implement_bin_ops!(StrictEq, 1, "Binary `===` operator.", |lhs, rhs| JsValue::Boolean(
    lhs.strict_equals(&rhs)
));
implement_bin_ops!(StrictNotEq, 1, "Binary `!==` operator.", |lhs, rhs| JsValue::Boolean(
    !lhs.strict_equals(&rhs)
));
implement_bin_ops!(LessThan, 1, "Binary `<` operator.", |lhs, rhs| compare(
    &lhs,
    &rhs,
    std::cmp::Ordering::is_lt
));
implement_bin_ops!(LessThanOrEq, 1, "Binary `<=` operator.", |lhs, rhs| compare(
    &lhs,
    &rhs,
    std::cmp::Ordering::is_le
));
implement_bin_ops!(GreaterThan, 1, "Binary `>` operator.", |lhs, rhs| compare(
    &lhs,
    &rhs,
    std::cmp::Ordering::is_gt
));
implement_bin_ops!(GreaterThanOrEq, 1, "Binary `>=` operator.", |lhs, rhs| compare(
    &lhs,
    &rhs,
    std::cmp::Ordering::is_ge
));

/// `Neg` implements the Opcode Operation for `Opcode::Neg`
///
/// Operation:
///  - Unary `-` operator.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Neg;

impl Operation for Neg {
    const NAME: &'static str = "Neg";
    const INSTRUCTION: &'static str = "INST - Neg";
    const COST: u8 = 1;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        let value = context.vm.pop();
        context.vm.push(JsValue::Number(-value.to_number()));
        ControlFlow::Continue(())
    }
}

/// `Not` implements the Opcode Operation for `Opcode::Not`
///
/// Operation:
///  - Unary `!` operator.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Not;

impl Operation for Not {
    const NAME: &'static str = "Not";
    const INSTRUCTION: &'static str = "INST - Not";
    const COST: u8 = 1;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        let value = context.vm.pop();
        context.vm.push(JsValue::Boolean(!value.to_boolean()));
        ControlFlow::Continue(())
    }
}

/// `TypeOf` implements the Opcode Operation for `Opcode::TypeOf`
///
/// Operation:
///  - Unary `typeof` operator.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TypeOf;

impl Operation for TypeOf {
    const NAME: &'static str = "TypeOf";
    const INSTRUCTION: &'static str = "INST - TypeOf";
    const COST: u8 = 1;

    fn execute(context: &mut Context) -> ControlFlow<CompletionRecord> {
        let value = context.vm.pop();
        let type_of = value.type_of(context.is_callable(&value));
        context.vm.push(JsValue::from(type_of));
        ControlFlow::Continue(())
    }
}
