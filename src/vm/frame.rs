//! Stack frames. §2.6

use std::rc::Rc;

use crate::vm::class::Class;
use crate::vm::error::{JavaException, VmError};
use crate::vm::member::Method;
use crate::vm::value::Value;

/// What happens when a frame completes normally.
#[derive(Debug, Clone)]
pub enum ReturnAction {
    /// Hand the return value, if any, to the calling frame.
    PushToCaller,
    /// The frame runs `<clinit>`: mark the classes initialised. The first is the class declaring
    /// the initialiser, the rest are subclasses without one that waited on it. If the frame is
    /// unwound instead, they all become erroneous. The calling frame re-executes the instruction
    /// that triggered initialisation.
    FinishInitialization(Vec<Rc<Class>>),
}

/// A frame is used to store data and partial results, as well as to perform dynamic linking,
/// return values for methods, and dispatch exceptions.
#[derive(Debug)]
pub struct StackFrame {
    /// The class declaring the executing method. Its constant pool is the one instructions refer
    /// to.
    pub class: Rc<Class>,
    pub method: Rc<Method>,
    /// The offset of the executing instruction in the method's code.
    pub pc: usize,
    /// The local variables of the current method. A `long` or `double` is written to two
    /// consecutive slots. `None` marks a slot that has never been written.
    pub locals: Vec<Option<Value>>,
    /// The operand stack. A `long` or `double` takes two slots, both holding the value.
    operand_stack: Vec<Value>,
    pub max_stack: usize,
    /// How far the caller's pc moves on once this frame returns: the length of the invoke
    /// instruction, or 0 to make the caller re-execute it.
    pub return_offset: usize,
    pub on_return: ReturnAction,
}

impl StackFrame {
    pub fn new(class: Rc<Class>, method: Rc<Method>, pc: usize, locals: Vec<Option<Value>>)
               -> Self {
        let max_stack = method.code.as_ref().map_or(0, |code| code.max_stack as usize);
        StackFrame {
            class,
            method,
            pc,
            locals,
            operand_stack: Vec::with_capacity(max_stack),
            max_stack,
            return_offset: 0,
            on_return: ReturnAction::PushToCaller,
        }
    }

    /// The bytecode of the method, empty for `native` and `abstract` methods.
    pub fn code(&self) -> &[u8] {
        self.method.code.as_ref().map_or(&[][..], |code| &code.code[..])
    }

    pub fn is_native(&self) -> bool {
        self.method.code.is_none()
    }

    pub fn operand_stack(&self) -> &[Value] {
        &self.operand_stack
    }

    /// Pushes one slot, raising `StackOverflowError` past `max_stack`.
    pub fn push_slot(&mut self, value: Value) -> Result<(), JavaException> {
        if self.operand_stack.len() >= self.max_stack {
            return Err(JavaException::stack_overflow());
        }
        self.operand_stack.push(value);
        Ok(())
    }

    pub fn pop_slot(&mut self) -> Result<Value, VmError> {
        self.operand_stack.pop().ok_or_else(|| VmError::StackUnderflow {
            method: self.method.native_key(),
        })
    }

    pub fn clear_stack(&mut self) {
        self.operand_stack.clear();
    }

    pub fn load_local(&self, index: usize) -> Result<Value, VmError> {
        match self.locals.get(index) {
            Some(&Some(ref value)) => Ok(value.clone()),
            Some(&None) => Err(VmError::UninitializedLocal { index }),
            None => Err(VmError::LocalOutOfRange { index, max_locals: self.locals.len() }),
        }
    }

    pub fn store_local(&mut self, index: usize, value: Value) -> Result<(), VmError> {
        let max_locals = self.locals.len();
        match self.locals.get_mut(index) {
            Some(slot) => {
                *slot = Some(value);
                Ok(())
            },
            None => Err(VmError::LocalOutOfRange { index, max_locals }),
        }
    }

    /// Finds the handler for an exception of class `thrown` raised at the current pc. Catch
    /// types are resolved by `resolve`; a catch type that fails to resolve matches nothing.
    pub fn find_handler<F>(&self, thrown: &Class, mut resolve: F) -> Option<usize>
        where F: FnMut(u16) -> Option<Rc<Class>>
    {
        let code = self.method.code.as_ref()?;
        code.exception_table.iter().find(|entry| {
            let covered = entry.start_pc as usize <= self.pc && self.pc < entry.end_pc as usize;
            covered && (entry.catch_type == 0
                || resolve(entry.catch_type).map_or(false, |catch| thrown.check_cast(&catch)))
        }).map(|entry| entry.handler_pc as usize)
    }
}
