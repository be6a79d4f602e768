use {
    tests::{func_export, init_logging, register_env, ModuleBuilder},
    wasmjit_runtime::{
        runtime::{error::TrapKind, values::Value, Store},
        syntax::{
            types::{FunctionType, ValueType::*},
            ExportDesc, Instruction as I,
        },
    },
};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// A module that fills slots of the env table, and one that dispatches
/// through it.
fn linked(store: &mut Store) -> Result<()> {
    let provider = ModuleBuilder::new()
        .import_table("env", "table", 10, Some(20))
        .func(&[], &[I32], &[], vec![I::i32const(1u32)])
        .func(&[], &[I32], &[], vec![I::i32const(2u32)])
        .func(&[I32], &[I32], &[], vec![I::LocalGet(0)])
        .elems(4, &[0, 1, 2])
        .build();
    store.instantiate("provider", provider)?;

    let (caller, sig) = ModuleBuilder::new()
        .import_table("env", "table", 10, None)
        .functype(&[], &[I32]);
    let caller = caller
        .func(&[I32], &[I32], &[], vec![I::LocalGet(0), I::CallIndirect(sig)])
        .export("dispatch", ExportDesc::Func(0))
        .build();
    store.instantiate("caller", caller)?;
    Ok(())
}

#[test]
fn call_indirect_through_a_shared_table() -> Result<()> {
    init_logging();
    let mut store = Store::new();
    let env = register_env(&mut store)?;
    linked(&mut store)?;

    let dispatch = |store: &mut Store, i: u32| store.call("caller", "dispatch", &[i.into()]);
    assert_eq!(dispatch(&mut store, 4)?, vec![Value::I32(1)]);
    assert_eq!(dispatch(&mut store, 5)?, vec![Value::I32(2)]);
    assert_eq!(
        dispatch(&mut store, 6).unwrap_err().as_trap_error(),
        Some(&TrapKind::CallIndirectTypeMismatch)
    );
    assert_eq!(
        dispatch(&mut store, 0).unwrap_err().as_trap_error(),
        Some(&TrapKind::UninitializedElement(0))
    );
    assert_eq!(
        dispatch(&mut store, 10).unwrap_err().as_trap_error(),
        Some(&TrapKind::UndefinedElement(10))
    );

    // Slots added by growth are reachable immediately.
    let one = store.table(env.table)?.elements()[4];
    assert_eq!(store.grow_table(env.table, 2, one)?, Some(10));
    assert_eq!(dispatch(&mut store, 11)?, vec![Value::I32(1)]);
    assert_eq!(store.grow_table(env.table, 9, None)?, None);
    assert_eq!(store.table(env.table)?.size(), 12);
    Ok(())
}

#[test]
fn host_can_install_table_elements() -> Result<()> {
    init_logging();
    let mut store = Store::new();
    let env = register_env(&mut store)?;
    linked(&mut store)?;
    let dispatch = func_export(&store, "caller", "dispatch");

    // Host functions are ordinary table elements.
    let host = store.add_host_function(
        FunctionType::new(&[], &[I32]),
        |_, _| Ok(vec![Value::I32(99)]),
    )?;
    store.table_mut(env.table)?.set(0, Some(host))?;
    assert_eq!(store.invoke(dispatch, &[0u32.into()])?, vec![Value::I32(99)]);

    let err = store.table_mut(env.table)?.set(10, Some(host)).unwrap_err();
    assert_eq!(err.as_trap_error(), Some(&TrapKind::OutOfBoundsTableAccess(10, 1)));
    Ok(())
}
