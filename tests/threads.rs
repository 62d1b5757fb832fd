mod common;

use jvm_engine::model::class_file::field_access_flags;
use jvm_engine::model::class_file::method_access_flags::ACC_STATIC;
use jvm_engine::util::class_builder::{code_attribute, ClassBuilder};
use jvm_engine::vm::bytecode::opcode::*;
use jvm_engine::vm::{Thread, ThreadPool, ThreadStatus};

use crate::common::*;

const LOCK: &str = "Ljava/lang/Object;";

/// `Main` with a static `lock` object and methods that take it in various ways.
fn lock_vm() -> TestVm {
    let mut builder = ClassBuilder::new("Main", Some(OBJECT));
    builder.field(field_access_flags::ACC_STATIC, "lock", LOCK);
    let lock = builder.field_ref("Main", "lock", LOCK);
    let object = builder.class(OBJECT);
    let object_init = builder.method_ref(OBJECT, "<init>", "()V");
    let wait = builder.method_ref(OBJECT, "wait", "()V");
    let notify = builder.method_ref(OBJECT, "notify", "()V");
    let (h, l) = (high(lock), low(lock));

    builder.method(ACC_STATIC, "<clinit>", "()V", vec![code_attribute(2, 0, vec![
        NEW, high(object), low(object),
        DUP,
        INVOKESPECIAL, high(object_init), low(object_init),
        PUTSTATIC, h, l,
        RETURN,
    ], vec![])]);
    static_method(&mut builder, "touch", "()V", 1, 0, vec![GETSTATIC, h, l, POP, RETURN]);
    static_method(&mut builder, "hold", "()V", 1, 0, vec![
        GETSTATIC, h, l, MONITORENTER,
        NOP, NOP, NOP, NOP, NOP,
        GETSTATIC, h, l, MONITOREXIT,
        RETURN,
    ]);
    static_method(&mut builder, "grab", "()I", 1, 0, vec![
        GETSTATIC, h, l, MONITORENTER,
        GETSTATIC, h, l, MONITOREXIT,
        ICONST_1, IRETURN,
    ]);
    static_method(&mut builder, "await", "()I", 1, 0, vec![
        GETSTATIC, h, l, MONITORENTER,
        GETSTATIC, h, l, INVOKEVIRTUAL, high(wait), low(wait),
        GETSTATIC, h, l, MONITOREXIT,
        ICONST_1, IRETURN,
    ]);
    static_method(&mut builder, "signal", "()V", 1, 0, vec![
        GETSTATIC, h, l, MONITORENTER,
        GETSTATIC, h, l, INVOKEVIRTUAL, high(notify), low(notify),
        GETSTATIC, h, l, MONITOREXIT,
        RETURN,
    ]);
    static_method(&mut builder, "signalUnowned", "()V", 1, 0, vec![
        GETSTATIC, h, l, INVOKEVIRTUAL, high(notify), low(notify),
        RETURN,
    ]);

    let vm = vm(vec![builder.build()]);
    call_static(&vm, "Main", "touch", "()V", vec![]);
    vm
}

fn start(vm: &TestVm, name: &str) -> Thread {
    let class = vm.jvm.resolve_class("Main").unwrap();
    let method = class.get_method(name, "()V").or_else(|| class.get_method(name, "()I")).unwrap();
    let mut thread = vm.jvm.new_thread();
    thread.invoke_method(method, vec![], 0).unwrap();
    thread
}

fn lock_owner(vm: &TestVm) -> Option<u64> {
    let class = vm.jvm.resolve_class("Main").unwrap();
    let lock = class.resolve_field("lock", LOCK).unwrap().get().as_reference().unwrap().unwrap();
    let lock = lock.borrow();
    lock.monitor().and_then(|monitor| monitor.owner())
}

#[test]
fn contended_monitor_blocks_then_hands_over() {
    let vm = lock_vm();
    let mut holder = start(&vm, "hold");
    let mut grabber = start(&vm, "grab");

    holder.run_for(2).unwrap();
    assert_eq!(lock_owner(&vm), Some(holder.id()));

    assert_eq!(grabber.run_for(10).unwrap(), 2);
    assert_eq!(grabber.status(), ThreadStatus::Blocked);

    holder.run().unwrap();
    assert_eq!(holder.status(), ThreadStatus::Terminated);
    assert_eq!(grabber.status(), ThreadStatus::Runnable);
    assert_eq!(lock_owner(&vm), Some(grabber.id()));

    grabber.run().unwrap();
    assert_eq!(int_result(&grabber), 1);
    assert_eq!(lock_owner(&vm), None);
}

#[test]
fn pool_runs_threads_round_robin() {
    let vm = lock_vm();
    let mut pool = ThreadPool::new();
    pool.add_thread(start(&vm, "hold"));
    pool.add_thread(start(&vm, "grab"));
    assert_eq!(pool.len(), 2);

    let finished = pool.run(1).unwrap();
    assert!(pool.is_empty());
    assert_eq!(finished.len(), 2);
    assert!(finished.iter().all(|thread| thread.uncaught_exception().is_none()));
    let grabber = finished.iter().find(|thread| thread.return_value().is_some()).unwrap();
    assert_eq!(int_result(grabber), 1);
}

#[test]
fn wait_and_notify() {
    let vm = lock_vm();
    let mut waiter = start(&vm, "await");
    waiter.run().unwrap();
    assert_eq!(waiter.status(), ThreadStatus::Waiting);
    assert_eq!(lock_owner(&vm), None);

    let mut signaller = start(&vm, "signal");
    signaller.run().unwrap();
    assert!(signaller.uncaught_exception().is_none());
    assert_eq!(waiter.status(), ThreadStatus::Runnable);
    assert_eq!(lock_owner(&vm), Some(waiter.id()));

    waiter.run().unwrap();
    assert_eq!(int_result(&waiter), 1);
}

#[test]
fn pool_gives_up_on_waiting_threads() {
    let vm = lock_vm();
    let mut pool = ThreadPool::new();
    pool.add_thread(start(&vm, "await"));
    let finished = pool.run(4).unwrap();
    assert!(finished.is_empty());
    assert_eq!(pool.len(), 1);
    assert!(pool.threads().all(|thread| thread.status() == ThreadStatus::Waiting));
}

#[test]
fn notify_requires_ownership() {
    let vm = lock_vm();
    let mut thread = start(&vm, "signalUnowned");
    thread.run().unwrap();
    assert_eq!(uncaught_class(&thread).as_deref(),
               Some("java/lang/IllegalMonitorStateException"));
}
