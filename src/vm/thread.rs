//! Java threads: a stack of frames plus the fetch-decode-execute loop driving it.
//!
//! A thread never runs on its own. The host calls `run_for(n)` to execute up to `n`
//! instructions, which lets a scheduler interleave several threads on one host thread.

use std::cell::Cell;
use std::rc::Rc;

use crate::vm::class::{Class, ClassStatus};
use crate::vm::error::{names, ExecResult, JavaException, Trap, VmError};
use crate::vm::frame::{ReturnAction, StackFrame};
use crate::vm::heap::ObjectRef;
use crate::vm::interpreter;
use crate::vm::member::{field_key, Method};
use crate::vm::value::Value;
use crate::vm::Jvm;

/// The states of `java.lang.Thread.State`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    New,
    Runnable,
    /// Waiting to enter a monitor.
    Blocked,
    /// In `Object.wait()`.
    Waiting,
    /// In `Object.wait(timeout)`.
    TimedWaiting,
    Terminated,
}

pub struct Thread {
    id: u64,
    jvm: Rc<Jvm>,
    /// Shared with the monitors this thread is queued on, so that they can wake it.
    status: Rc<Cell<ThreadStatus>>,
    frames: Vec<StackFrame>,
    /// The exception that terminated the thread, if any.
    uncaught: Option<ObjectRef>,
    /// The value returned by the bottom frame.
    last_return: Option<Value>,
    /// The first frame of the thread, held back while the initialisers of its class run.
    entry: Option<StackFrame>,
    /// Instructions executed so far.
    executed: u64,
}

fn width_mismatch(operation: &'static str, value: &Value) -> VmError {
    VmError::WidthMismatch { operation, value: format!("{:?}", value) }
}

impl Thread {
    pub fn new(id: u64, jvm: Rc<Jvm>) -> Self {
        Thread {
            id,
            jvm,
            status: Rc::new(Cell::new(ThreadStatus::New)),
            frames: vec![],
            uncaught: None,
            last_return: None,
            entry: None,
            executed: 0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn jvm(&self) -> &Rc<Jvm> {
        &self.jvm
    }

    pub fn status(&self) -> ThreadStatus {
        self.status.get()
    }

    pub fn set_status(&self, status: ThreadStatus) {
        self.status.set(status);
    }

    pub fn status_cell(&self) -> &Rc<Cell<ThreadStatus>> {
        &self.status
    }

    pub fn is_runnable(&self) -> bool {
        self.status() == ThreadStatus::Runnable
    }

    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn current_frame(&self) -> Result<&StackFrame, VmError> {
        self.frames.last().ok_or(VmError::NoFrame)
    }

    pub fn current_frame_mut(&mut self) -> Result<&mut StackFrame, VmError> {
        self.frames.last_mut().ok_or(VmError::NoFrame)
    }

    pub fn uncaught_exception(&self) -> Option<&ObjectRef> {
        self.uncaught.as_ref()
    }

    /// The value returned by the method at the bottom of the stack once the thread finished.
    pub fn return_value(&self) -> Option<&Value> {
        self.last_return.as_ref()
    }

    pub fn executed_instructions(&self) -> u64 {
        self.executed
    }

    // operand stack

    /// Pushes an `int`, `float`, reference or `returnAddress`.
    pub fn push_stack(&mut self, value: Value) -> ExecResult {
        if value.is_category_2() {
            return Err(width_mismatch("push_stack", &value).into());
        }
        self.current_frame_mut()?.push_slot(value)?;
        Ok(())
    }

    /// Pushes a `long` or `double` into two slots.
    pub fn push_stack64(&mut self, value: Value) -> ExecResult {
        if !value.is_category_2() {
            return Err(width_mismatch("push_stack64", &value).into());
        }
        let frame = self.current_frame_mut()?;
        frame.push_slot(value.clone())?;
        frame.push_slot(value)?;
        Ok(())
    }

    /// Pushes a value of either width.
    pub fn push_value(&mut self, value: Value) -> ExecResult {
        if value.is_category_2() {
            self.push_stack64(value)
        } else {
            self.push_stack(value)
        }
    }

    pub fn pop_stack(&mut self) -> Result<Value, VmError> {
        let value = self.current_frame_mut()?.pop_slot()?;
        if value.is_category_2() {
            return Err(width_mismatch("pop_stack", &value));
        }
        Ok(value)
    }

    pub fn pop_stack64(&mut self) -> Result<Value, VmError> {
        let frame = self.current_frame_mut()?;
        let high = frame.pop_slot()?;
        let low = frame.pop_slot()?;
        if !high.is_category_2() || high != low {
            return Err(width_mismatch("pop_stack64", &high));
        }
        Ok(high)
    }

    /// Pushes a single slot without looking at its width. Used by the type-agnostic stack
    /// instructions (`dup2`, `swap`, ...), which move the halves of a `long` like any slot.
    pub fn push_slot(&mut self, value: Value) -> ExecResult {
        self.current_frame_mut()?.push_slot(value)?;
        Ok(())
    }

    pub fn pop_slot(&mut self) -> Result<Value, VmError> {
        self.current_frame_mut()?.pop_slot()
    }

    pub fn pop_int(&mut self) -> Result<i32, VmError> {
        self.pop_stack()?.as_int()
    }

    pub fn pop_float(&mut self) -> Result<f32, VmError> {
        self.pop_stack()?.as_float()
    }

    pub fn pop_long(&mut self) -> Result<i64, VmError> {
        self.pop_stack64()?.as_long()
    }

    pub fn pop_double(&mut self) -> Result<f64, VmError> {
        self.pop_stack64()?.as_double()
    }

    /// Pops a reference, `None` for `null`.
    pub fn pop_reference(&mut self) -> Result<Option<ObjectRef>, VmError> {
        self.pop_stack()?.as_reference()
    }

    /// Pops a reference, raising `NullPointerException` for `null`.
    pub fn pop_object(&mut self) -> ExecResult<ObjectRef> {
        match self.pop_reference()? {
            Some(object) => Ok(object),
            None => Err(JavaException::null_pointer().into()),
        }
    }

    // local variables

    pub fn load_local(&self, index: usize) -> Result<Value, VmError> {
        self.current_frame()?.load_local(index)
    }

    pub fn store_local(&mut self, index: usize, value: Value) -> Result<(), VmError> {
        self.current_frame_mut()?.store_local(index, value)
    }

    /// Stores a `long` or `double` into `index` and `index + 1`.
    pub fn store_local64(&mut self, index: usize, value: Value) -> Result<(), VmError> {
        let frame = self.current_frame_mut()?;
        frame.store_local(index, value.clone())?;
        frame.store_local(index + 1, value)
    }

    // instruction stream

    pub fn pc(&self) -> Result<usize, VmError> {
        Ok(self.current_frame()?.pc)
    }

    pub fn set_pc(&mut self, pc: usize) -> Result<(), VmError> {
        self.current_frame_mut()?.pc = pc;
        Ok(())
    }

    /// Moves the pc by a branch offset relative to the current instruction.
    pub fn offset_pc(&mut self, offset: i32) -> Result<(), VmError> {
        let frame = self.current_frame_mut()?;
        let target = frame.pc as i64 + offset as i64;
        if target < 0 || target as usize >= frame.code().len() {
            return Err(VmError::CodeOverrun {
                pc: target.max(0) as usize,
                method: frame.method.native_key(),
            });
        }
        frame.pc = target as usize;
        Ok(())
    }

    /// Reads the byte at `pc + offset`.
    pub fn read_u8(&self, offset: usize) -> Result<u8, VmError> {
        let frame = self.current_frame()?;
        frame.code().get(frame.pc + offset).cloned().ok_or_else(|| VmError::CodeOverrun {
            pc: frame.pc + offset,
            method: frame.method.native_key(),
        })
    }

    pub fn read_i8(&self, offset: usize) -> Result<i8, VmError> {
        Ok(self.read_u8(offset)? as i8)
    }

    pub fn read_u16(&self, offset: usize) -> Result<u16, VmError> {
        Ok(((self.read_u8(offset)? as u16) << 8) | self.read_u8(offset + 1)? as u16)
    }

    pub fn read_i16(&self, offset: usize) -> Result<i16, VmError> {
        Ok(self.read_u16(offset)? as i16)
    }

    pub fn read_i32(&self, offset: usize) -> Result<i32, VmError> {
        Ok(((self.read_u16(offset)? as u32) << 16 | self.read_u16(offset + 2)? as u32) as i32)
    }

    /// The class whose constant pool the executing instruction refers to.
    pub fn current_class(&self) -> Result<Rc<Class>, VmError> {
        Ok(self.current_frame()?.class.clone())
    }

    // frames

    /// Pushes a frame for `method` of `class`, starting at `pc`. The operand stack is sized from
    /// the method's `Code` attribute (0 for `native` and `abstract` methods) and the locals are
    /// padded to `max_locals`.
    pub fn push_stack_frame(&mut self, class: Rc<Class>, method: Rc<Method>, pc: usize,
                            mut locals: Vec<Option<Value>>) -> ExecResult {
        if self.frames.len() >= self.jvm.options.max_stack_frames {
            return Err(JavaException::stack_overflow().into());
        }
        if let Some(ref code) = method.code {
            if locals.len() < code.max_locals as usize {
                locals.resize(code.max_locals as usize, None);
            }
        }
        trace!("thread {}: enter {}", self.id, method.native_key());
        self.frames.push(StackFrame::new(class, method, pc, locals));
        if self.status() == ThreadStatus::New {
            self.set_status(ThreadStatus::Runnable);
        }
        Ok(())
    }

    /// Invokes `method` with arguments laid out as local variable slots (`this` first, `long`
    /// and `double` twice). Once the callee returns, the caller's pc moves on by
    /// `return_offset`.
    pub fn invoke_method(&mut self, method: Rc<Method>, args: Vec<Value>, return_offset: usize)
                         -> ExecResult {
        if method.is_abstract() {
            return Err(JavaException::new(names::ABSTRACT_METHOD_ERROR,
                                          method.native_key()).into());
        }
        let class = method.class()?;
        let locals = args.into_iter().map(Some).collect();
        self.push_stack_frame(class, method, 0, locals)?;
        self.current_frame_mut()?.return_offset = return_offset;
        Ok(())
    }

    /// Starts a fresh thread in `method` of `class`. The class is initialised first: `method`
    /// runs once its initialisers have returned, and never if one of them fails.
    pub fn start_in(&mut self, class: &Rc<Class>, method: Rc<Method>, args: Vec<Value>)
                    -> ExecResult {
        self.invoke_method(method, args, 0)?;
        let entry = self.frames.pop().ok_or(VmError::NoFrame)?;
        if self.initialize_class(class)? {
            self.frames.push(entry);
        } else {
            self.entry = Some(entry);
        }
        Ok(())
    }

    /// Pops the arguments of `method`, and `this` for instance methods, off the operand stack in
    /// local variable layout.
    pub fn pop_args(&mut self, method: &Method) -> Result<Vec<Value>, VmError> {
        let count = method.arg_slots();
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            args.push(self.pop_slot()?);
        }
        args.reverse();
        Ok(args)
    }

    /// Completes the current frame with an `int`, `float` or reference result, or none.
    pub fn return_stack_frame(&mut self, value: Option<Value>) -> ExecResult {
        if let Some(ref value) = value {
            if value.is_category_2() {
                return Err(width_mismatch("return_stack_frame", value).into());
            }
        }
        self.finish_frame(value)
    }

    /// Completes the current frame with a `long` or `double` result.
    pub fn return_stack_frame64(&mut self, value: Value) -> ExecResult {
        if !value.is_category_2() {
            return Err(width_mismatch("return_stack_frame64", &value).into());
        }
        self.finish_frame(Some(value))
    }

    fn finish_frame(&mut self, value: Option<Value>) -> ExecResult {
        let frame = self.frames.pop().ok_or(VmError::NoFrame)?;
        trace!("thread {}: leave {}", self.id, frame.method.native_key());
        if let ReturnAction::FinishInitialization(ref classes) = frame.on_return {
            for class in classes {
                class.set_status(ClassStatus::Initialized);
                debug!("initialized {}", class.name);
            }
        }
        match self.frames.last_mut() {
            Some(caller) => {
                caller.pc += frame.return_offset;
                if let Some(value) = value {
                    self.push_value(value)?;
                }
            },
            None if self.entry.is_some() => {
                self.frames.extend(self.entry.take());
            },
            None => {
                self.last_return = value;
                self.set_status(ThreadStatus::Terminated);
                debug!("thread {} terminated", self.id);
            },
        }
        Ok(())
    }

    // exceptions

    /// Creates an exception of the named class and throws it.
    pub fn throw_new_exception(&mut self, class_name: &str, message: &str) -> Result<(), VmError> {
        debug!("thread {}: {}: {}", self.id, class_name, message);
        let exception = self.jvm.new_throwable(class_name, message)?;
        self.throw_exception(exception)
    }

    /// Unwinds to the innermost handler covering the current pc of each frame whose catch type
    /// the exception is assignable to. Without one the thread terminates.
    pub fn throw_exception(&mut self, exception: ObjectRef) -> Result<(), VmError> {
        let class = exception.borrow().class().clone();
        while let Some(frame) = self.frames.last() {
            let handler = if frame.is_native() {
                None
            } else {
                let owner = frame.class.clone();
                frame.find_handler(&class, |catch_type| {
                    match owner.resolve_class_ref(self, catch_type) {
                        Ok(catch) => Some(catch),
                        Err(error) => {
                            warn!("cannot resolve catch type #{} of {}: {:?}",
                                  catch_type, owner.name, error);
                            None
                        },
                    }
                })
            };
            if let Some(handler_pc) = handler {
                let frame = self.current_frame_mut()?;
                frame.clear_stack();
                frame.pc = handler_pc;
                if frame.push_slot(Value::Reference(exception)).is_err() {
                    // max_stack is 0, which no verifiable method with a handler has
                    return Err(VmError::CodeOverrun { pc: handler_pc,
                                                      method: frame.method.native_key() });
                }
                return Ok(());
            }
            if let Some(frame) = self.frames.pop() {
                if let ReturnAction::FinishInitialization(ref classes) = frame.on_return {
                    for class in classes {
                        class.set_status(ClassStatus::Error);
                        debug!("initialization of {} failed", class.name);
                    }
                }
            }
        }
        self.die(exception)
    }

    /// Terminates the thread with an uncaught exception and tells the host.
    fn die(&mut self, exception: ObjectRef) -> Result<(), VmError> {
        let class_name = exception.borrow().class().name.replace('/', ".");
        let message = self.jvm.throwable_message(&exception)?;
        let report = match message {
            Some(message) => format!("Exception in thread \"{}\" {}: {}", self.id, class_name,
                                     message),
            None => format!("Exception in thread \"{}\" {}", self.id, class_name),
        };
        error!("{}", report);
        self.jvm.system().stderr(&format!("{}\n", report));
        self.uncaught = Some(exception);
        self.entry = None;
        self.set_status(ThreadStatus::Terminated);
        Ok(())
    }

    /// Raises a guest exception produced by a failed instruction.
    pub fn raise(&mut self, exception: JavaException) -> Result<(), VmError> {
        match exception {
            JavaException::New { class_name, message } =>
                self.throw_new_exception(&class_name, &message),
            JavaException::Thrown(object) => self.throw_exception(object),
        }
    }

    // class initialization

    /// Makes sure `class` is initialised before an instruction uses it. §5.5
    ///
    /// Returns `true` when the class is ready. Returns `false` when `<clinit>` frames have been
    /// pushed: the instruction must not advance, so that it runs again once they return.
    pub fn initialize_class(&mut self, class: &Rc<Class>) -> ExecResult<bool> {
        match class.status() {
            // re-entrant use from the initialiser itself, or another thread's pending one
            ClassStatus::Initialized | ClassStatus::Initializing => return Ok(true),
            ClassStatus::Error => {
                class.check_not_erroneous()?;
                return Ok(true);
            },
            ClassStatus::Linked => (),
        }
        class.set_status(ClassStatus::Initializing);
        debug!("initializing {}", class.name);

        let result = self.start_initialization(class);
        if result.is_err() {
            class.set_status(ClassStatus::Error);
        }
        result
    }

    fn start_initialization(&mut self, class: &Rc<Class>) -> ExecResult<bool> {
        self.assign_string_constants(class)?;

        let depth = self.frames.len();
        let clinit = class.clinit();
        if let Some(ref clinit) = clinit {
            self.push_stack_frame(class.clone(), clinit.clone(), 0, vec![])?;
            self.current_frame_mut()?.on_return =
                ReturnAction::FinishInitialization(vec![class.clone()]);
        }
        // pushed last so that it runs first
        let mut superclass_ready = true;
        if !class.is_interface() {
            if let Some(superclass) = class.superclass() {
                superclass_ready = self.initialize_class(&superclass)?;
            }
        }

        match (clinit, superclass_ready) {
            (Some(_), _) => Ok(false),
            (None, true) => {
                class.set_status(ClassStatus::Initialized);
                Ok(true)
            },
            (None, false) => {
                self.finish_with_frame(depth, class)?;
                Ok(false)
            },
        }
    }

    /// Ties the status of `class` to the initialiser frame at `depth`, the outermost one its
    /// superclass pushed.
    fn finish_with_frame(&mut self, depth: usize, class: &Rc<Class>) -> ExecResult {
        match self.frames.get_mut(depth).map(|frame| &mut frame.on_return) {
            Some(ReturnAction::FinishInitialization(classes)) => {
                classes.push(class.clone());
                Ok(())
            },
            _ => Err(VmError::NoFrame.into()),
        }
    }

    /// Assigns `static final String` fields from their `ConstantValue` attributes.
    fn assign_string_constants(&mut self, class: &Rc<Class>) -> ExecResult {
        for field in class.fields.values() {
            if let (true, Some(index), "Ljava/lang/String;") =
                    (field.is_static(), field.constant_value, field.descriptor.as_str()) {
                let string = class.resolve_string(self, index)?;
                field.set(Value::Reference(string));
            }
        }
        Ok(())
    }

    /// Reads an instance field by declaring class, name and descriptor.
    pub fn get_field(&self, object: &ObjectRef, class_name: &str, name: &str, descriptor: &str)
                     -> Result<Value, VmError> {
        object.borrow().get_field(&field_key(class_name, name, descriptor))
    }

    // execution

    /// Executes one instruction, or one native method call.
    pub fn step(&mut self) -> Result<(), VmError> {
        let frame = self.current_frame()?;
        let result = if frame.is_native() {
            let method = frame.method.clone();
            self.call_native(method)
        } else {
            interpreter::execute(self)
        };
        self.executed += 1;
        match result {
            Ok(()) => Ok(()),
            Err(Trap::Throw(exception)) => self.raise(exception),
            Err(Trap::Fatal(error)) => {
                error!("thread {}: {}", self.id, error);
                Err(error)
            },
        }
    }

    /// Runs the native function bound to `method` with the locals of the current frame. The
    /// function must pop the frame itself, by returning or throwing.
    fn call_native(&mut self, method: Rc<Method>) -> ExecResult {
        let key = method.native_key();
        let native = match self.jvm.native(&key) {
            Some(native) => native,
            None => return Err(JavaException::new(names::UNSATISFIED_LINK_ERROR, key).into()),
        };
        let depth = self.frames.len();
        let locals = self.current_frame()?.locals.iter()
            .map(|local| local.clone().unwrap_or(Value::NullReference))
            .collect();
        native(self, locals)?;
        let still_there = self.frames.len() == depth
            && self.frames.last().map_or(false, |frame| Rc::ptr_eq(&frame.method, &method));
        if still_there {
            return Err(VmError::NativeDidNotReturn { key }.into());
        }
        Ok(())
    }

    /// Executes up to `count` instructions. Stops early when the thread blocks, waits or
    /// terminates. Returns the number of instructions executed.
    pub fn run_for(&mut self, count: usize) -> Result<usize, VmError> {
        let mut executed = 0;
        while executed < count && self.is_runnable() {
            if self.frames.is_empty() {
                self.set_status(ThreadStatus::Terminated);
                break;
            }
            self.step()?;
            executed += 1;
        }
        Ok(executed)
    }

    /// Runs until the thread stops being runnable.
    pub fn run(&mut self) -> Result<(), VmError> {
        while self.is_runnable() {
            self.run_for(usize::MAX)?;
        }
        Ok(())
    }
}
