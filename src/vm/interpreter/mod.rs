//! Instruction execution. §6.5
//!
//! Every opcode maps to a handler through a table built at compile time. A handler reads its
//! operands relative to the current pc and moves the pc past the instruction only once the
//! instruction has completed. An instruction that throws leaves the pc on itself, which is what
//! exception table lookup expects. An instruction that pushes a frame (an invoke, or a class
//! initialiser) leaves the pc alone too: the callee's return offset moves it later.

mod comparisons;
mod constants;
mod control;
mod conversions;
mod extended;
mod loads;
mod math;
mod references;
mod stack;
mod stores;

use crate::vm::bytecode::opcode;
use crate::vm::error::{ExecResult, VmError};
use crate::vm::thread::Thread;

/// An instruction handler.
pub type Handler = fn(&mut Thread) -> ExecResult;

fn unsupported(thread: &mut Thread) -> ExecResult {
    let opcode = thread.read_u8(0)?;
    Err(VmError::UnsupportedOpcode { opcode, pc: thread.pc()? }.into())
}

/// Moves the pc past an instruction of `length` bytes.
fn advance(thread: &mut Thread, length: usize) -> ExecResult {
    thread.current_frame_mut()?.pc += length;
    Ok(())
}

const fn build_dispatch_table() -> [Handler; 256] {
    let mut table: [Handler; 256] = [unsupported; 256];

    table[opcode::NOP as usize] = constants::nop;
    table[opcode::ACONST_NULL as usize] = constants::aconst_null;
    table[opcode::ICONST_M1 as usize] = constants::iconst_m1;
    table[opcode::ICONST_0 as usize] = constants::iconst_0;
    table[opcode::ICONST_1 as usize] = constants::iconst_1;
    table[opcode::ICONST_2 as usize] = constants::iconst_2;
    table[opcode::ICONST_3 as usize] = constants::iconst_3;
    table[opcode::ICONST_4 as usize] = constants::iconst_4;
    table[opcode::ICONST_5 as usize] = constants::iconst_5;
    table[opcode::LCONST_0 as usize] = constants::lconst_0;
    table[opcode::LCONST_1 as usize] = constants::lconst_1;
    table[opcode::FCONST_0 as usize] = constants::fconst_0;
    table[opcode::FCONST_1 as usize] = constants::fconst_1;
    table[opcode::FCONST_2 as usize] = constants::fconst_2;
    table[opcode::DCONST_0 as usize] = constants::dconst_0;
    table[opcode::DCONST_1 as usize] = constants::dconst_1;
    table[opcode::BIPUSH as usize] = constants::bipush;
    table[opcode::SIPUSH as usize] = constants::sipush;
    table[opcode::LDC as usize] = constants::ldc;
    table[opcode::LDC_W as usize] = constants::ldc_w;
    table[opcode::LDC2_W as usize] = constants::ldc2_w;

    table[opcode::ILOAD as usize] = loads::iload;
    table[opcode::LLOAD as usize] = loads::lload;
    table[opcode::FLOAD as usize] = loads::fload;
    table[opcode::DLOAD as usize] = loads::dload;
    table[opcode::ALOAD as usize] = loads::aload;
    table[opcode::ILOAD_0 as usize] = loads::iload_0;
    table[opcode::ILOAD_1 as usize] = loads::iload_1;
    table[opcode::ILOAD_2 as usize] = loads::iload_2;
    table[opcode::ILOAD_3 as usize] = loads::iload_3;
    table[opcode::LLOAD_0 as usize] = loads::lload_0;
    table[opcode::LLOAD_1 as usize] = loads::lload_1;
    table[opcode::LLOAD_2 as usize] = loads::lload_2;
    table[opcode::LLOAD_3 as usize] = loads::lload_3;
    table[opcode::FLOAD_0 as usize] = loads::fload_0;
    table[opcode::FLOAD_1 as usize] = loads::fload_1;
    table[opcode::FLOAD_2 as usize] = loads::fload_2;
    table[opcode::FLOAD_3 as usize] = loads::fload_3;
    table[opcode::DLOAD_0 as usize] = loads::dload_0;
    table[opcode::DLOAD_1 as usize] = loads::dload_1;
    table[opcode::DLOAD_2 as usize] = loads::dload_2;
    table[opcode::DLOAD_3 as usize] = loads::dload_3;
    table[opcode::ALOAD_0 as usize] = loads::aload_0;
    table[opcode::ALOAD_1 as usize] = loads::aload_1;
    table[opcode::ALOAD_2 as usize] = loads::aload_2;
    table[opcode::ALOAD_3 as usize] = loads::aload_3;
    table[opcode::IALOAD as usize] = loads::iaload;
    table[opcode::LALOAD as usize] = loads::laload;
    table[opcode::FALOAD as usize] = loads::faload;
    table[opcode::DALOAD as usize] = loads::daload;
    table[opcode::AALOAD as usize] = loads::aaload;
    table[opcode::BALOAD as usize] = loads::baload;
    table[opcode::CALOAD as usize] = loads::caload;
    table[opcode::SALOAD as usize] = loads::saload;

    table[opcode::ISTORE as usize] = stores::istore;
    table[opcode::LSTORE as usize] = stores::lstore;
    table[opcode::FSTORE as usize] = stores::fstore;
    table[opcode::DSTORE as usize] = stores::dstore;
    table[opcode::ASTORE as usize] = stores::astore;
    table[opcode::ISTORE_0 as usize] = stores::istore_0;
    table[opcode::ISTORE_1 as usize] = stores::istore_1;
    table[opcode::ISTORE_2 as usize] = stores::istore_2;
    table[opcode::ISTORE_3 as usize] = stores::istore_3;
    table[opcode::LSTORE_0 as usize] = stores::lstore_0;
    table[opcode::LSTORE_1 as usize] = stores::lstore_1;
    table[opcode::LSTORE_2 as usize] = stores::lstore_2;
    table[opcode::LSTORE_3 as usize] = stores::lstore_3;
    table[opcode::FSTORE_0 as usize] = stores::fstore_0;
    table[opcode::FSTORE_1 as usize] = stores::fstore_1;
    table[opcode::FSTORE_2 as usize] = stores::fstore_2;
    table[opcode::FSTORE_3 as usize] = stores::fstore_3;
    table[opcode::DSTORE_0 as usize] = stores::dstore_0;
    table[opcode::DSTORE_1 as usize] = stores::dstore_1;
    table[opcode::DSTORE_2 as usize] = stores::dstore_2;
    table[opcode::DSTORE_3 as usize] = stores::dstore_3;
    table[opcode::ASTORE_0 as usize] = stores::astore_0;
    table[opcode::ASTORE_1 as usize] = stores::astore_1;
    table[opcode::ASTORE_2 as usize] = stores::astore_2;
    table[opcode::ASTORE_3 as usize] = stores::astore_3;
    table[opcode::IASTORE as usize] = stores::iastore;
    table[opcode::LASTORE as usize] = stores::lastore;
    table[opcode::FASTORE as usize] = stores::fastore;
    table[opcode::DASTORE as usize] = stores::dastore;
    table[opcode::AASTORE as usize] = stores::aastore;
    table[opcode::BASTORE as usize] = stores::bastore;
    table[opcode::CASTORE as usize] = stores::castore;
    table[opcode::SASTORE as usize] = stores::sastore;

    table[opcode::POP as usize] = stack::pop;
    table[opcode::POP2 as usize] = stack::pop2;
    table[opcode::DUP as usize] = stack::dup;
    table[opcode::DUP_X1 as usize] = stack::dup_x1;
    table[opcode::DUP_X2 as usize] = stack::dup_x2;
    table[opcode::DUP2 as usize] = stack::dup2;
    table[opcode::DUP2_X1 as usize] = stack::dup2_x1;
    table[opcode::DUP2_X2 as usize] = stack::dup2_x2;
    table[opcode::SWAP as usize] = stack::swap;

    table[opcode::IADD as usize] = math::iadd;
    table[opcode::LADD as usize] = math::ladd;
    table[opcode::FADD as usize] = math::fadd;
    table[opcode::DADD as usize] = math::dadd;
    table[opcode::ISUB as usize] = math::isub;
    table[opcode::LSUB as usize] = math::lsub;
    table[opcode::FSUB as usize] = math::fsub;
    table[opcode::DSUB as usize] = math::dsub;
    table[opcode::IMUL as usize] = math::imul;
    table[opcode::LMUL as usize] = math::lmul;
    table[opcode::FMUL as usize] = math::fmul;
    table[opcode::DMUL as usize] = math::dmul;
    table[opcode::IDIV as usize] = math::idiv;
    table[opcode::LDIV as usize] = math::ldiv;
    table[opcode::FDIV as usize] = math::fdiv;
    table[opcode::DDIV as usize] = math::ddiv;
    table[opcode::IREM as usize] = math::irem;
    table[opcode::LREM as usize] = math::lrem;
    table[opcode::FREM as usize] = math::frem;
    table[opcode::DREM as usize] = math::drem;
    table[opcode::INEG as usize] = math::ineg;
    table[opcode::LNEG as usize] = math::lneg;
    table[opcode::FNEG as usize] = math::fneg;
    table[opcode::DNEG as usize] = math::dneg;
    table[opcode::ISHL as usize] = math::ishl;
    table[opcode::LSHL as usize] = math::lshl;
    table[opcode::ISHR as usize] = math::ishr;
    table[opcode::LSHR as usize] = math::lshr;
    table[opcode::IUSHR as usize] = math::iushr;
    table[opcode::LUSHR as usize] = math::lushr;
    table[opcode::IAND as usize] = math::iand;
    table[opcode::LAND as usize] = math::land;
    table[opcode::IOR as usize] = math::ior;
    table[opcode::LOR as usize] = math::lor;
    table[opcode::IXOR as usize] = math::ixor;
    table[opcode::LXOR as usize] = math::lxor;
    table[opcode::IINC as usize] = math::iinc;

    table[opcode::I2L as usize] = conversions::i2l;
    table[opcode::I2F as usize] = conversions::i2f;
    table[opcode::I2D as usize] = conversions::i2d;
    table[opcode::L2I as usize] = conversions::l2i;
    table[opcode::L2F as usize] = conversions::l2f;
    table[opcode::L2D as usize] = conversions::l2d;
    table[opcode::F2I as usize] = conversions::f2i;
    table[opcode::F2L as usize] = conversions::f2l;
    table[opcode::F2D as usize] = conversions::f2d;
    table[opcode::D2I as usize] = conversions::d2i;
    table[opcode::D2L as usize] = conversions::d2l;
    table[opcode::D2F as usize] = conversions::d2f;
    table[opcode::I2B as usize] = conversions::i2b;
    table[opcode::I2C as usize] = conversions::i2c;
    table[opcode::I2S as usize] = conversions::i2s;

    table[opcode::LCMP as usize] = comparisons::lcmp;
    table[opcode::FCMPL as usize] = comparisons::fcmpl;
    table[opcode::FCMPG as usize] = comparisons::fcmpg;
    table[opcode::DCMPL as usize] = comparisons::dcmpl;
    table[opcode::DCMPG as usize] = comparisons::dcmpg;
    table[opcode::IFEQ as usize] = comparisons::ifeq;
    table[opcode::IFNE as usize] = comparisons::ifne;
    table[opcode::IFLT as usize] = comparisons::iflt;
    table[opcode::IFGE as usize] = comparisons::ifge;
    table[opcode::IFGT as usize] = comparisons::ifgt;
    table[opcode::IFLE as usize] = comparisons::ifle;
    table[opcode::IF_ICMPEQ as usize] = comparisons::if_icmpeq;
    table[opcode::IF_ICMPNE as usize] = comparisons::if_icmpne;
    table[opcode::IF_ICMPLT as usize] = comparisons::if_icmplt;
    table[opcode::IF_ICMPGE as usize] = comparisons::if_icmpge;
    table[opcode::IF_ICMPGT as usize] = comparisons::if_icmpgt;
    table[opcode::IF_ICMPLE as usize] = comparisons::if_icmple;
    table[opcode::IF_ACMPEQ as usize] = comparisons::if_acmpeq;
    table[opcode::IF_ACMPNE as usize] = comparisons::if_acmpne;

    table[opcode::GOTO as usize] = control::goto;
    table[opcode::JSR as usize] = control::jsr;
    table[opcode::RET as usize] = control::ret;
    table[opcode::TABLESWITCH as usize] = control::tableswitch;
    table[opcode::LOOKUPSWITCH as usize] = control::lookupswitch;
    table[opcode::IRETURN as usize] = control::ireturn;
    table[opcode::LRETURN as usize] = control::lreturn;
    table[opcode::FRETURN as usize] = control::freturn;
    table[opcode::DRETURN as usize] = control::dreturn;
    table[opcode::ARETURN as usize] = control::areturn;
    table[opcode::RETURN as usize] = control::return_void;

    table[opcode::GETSTATIC as usize] = references::getstatic;
    table[opcode::PUTSTATIC as usize] = references::putstatic;
    table[opcode::GETFIELD as usize] = references::getfield;
    table[opcode::PUTFIELD as usize] = references::putfield;
    table[opcode::INVOKEVIRTUAL as usize] = references::invokevirtual;
    table[opcode::INVOKESPECIAL as usize] = references::invokespecial;
    table[opcode::INVOKESTATIC as usize] = references::invokestatic;
    table[opcode::INVOKEINTERFACE as usize] = references::invokeinterface;
    table[opcode::NEW as usize] = references::new;
    table[opcode::NEWARRAY as usize] = references::newarray;
    table[opcode::ANEWARRAY as usize] = references::anewarray;
    table[opcode::ARRAYLENGTH as usize] = references::arraylength;
    table[opcode::ATHROW as usize] = references::athrow;
    table[opcode::CHECKCAST as usize] = references::checkcast;
    table[opcode::INSTANCEOF as usize] = references::instanceof;
    table[opcode::MONITORENTER as usize] = references::monitorenter;
    table[opcode::MONITOREXIT as usize] = references::monitorexit;

    table[opcode::WIDE as usize] = extended::wide;
    table[opcode::MULTIANEWARRAY as usize] = extended::multianewarray;
    table[opcode::IFNULL as usize] = extended::ifnull;
    table[opcode::IFNONNULL as usize] = extended::ifnonnull;
    table[opcode::GOTO_W as usize] = extended::goto_w;
    table[opcode::JSR_W as usize] = extended::jsr_w;

    table
}

static DISPATCH: [Handler; 256] = build_dispatch_table();

/// Executes the instruction at the pc of the current frame.
pub fn execute(thread: &mut Thread) -> ExecResult {
    let opcode = thread.read_u8(0)?;
    trace!("thread {}: {:>4} {}", thread.id(), thread.pc()?,
           crate::vm::bytecode::mnemonic(opcode).unwrap_or("???"));
    DISPATCH[opcode as usize](thread)
}
