use {
    tests::{init_logging, register_env, ModuleBuilder},
    wasmjit_runtime::{
        runtime::{error::TrapKind, instance::PAGE_SIZE, values::Value, Config, Store},
        syntax::{
            types::{MemType, ValueType::*},
            ExportDesc, Instruction as I, MemArg,
        },
    },
};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[test]
fn rejected_growth_is_idempotent() -> Result<()> {
    init_logging();
    let mut store = Store::new();
    let env = register_env(&mut store)?;
    assert_eq!(store.grow_mem(env.memory, 1)?, Some(1));
    for _ in 0..3 {
        assert_eq!(store.grow_mem(env.memory, 1)?, None);
        assert_eq!(store.mem(env.memory)?.size(), 2);
        assert_eq!(store.mem(env.memory)?.data().len(), 2 * PAGE_SIZE);
    }
    Ok(())
}

#[test]
fn configured_page_cap_bounds_unlimited_memories() -> Result<()> {
    init_logging();
    let mut store = Store::with_config(Config::default().with_max_memory_pages(3));
    let mem = store.add_memory(MemType::new(1, None))?;
    assert_eq!(store.grow_mem(mem, 2)?, Some(1));
    assert_eq!(store.grow_mem(mem, 1)?, None);
    assert!(store.add_memory(MemType::new(4, None)).is_err());
    Ok(())
}

#[test]
fn modules_share_an_imported_memory() -> Result<()> {
    init_logging();
    let mut store = Store::new();
    let env = register_env(&mut store)?;

    let writer = ModuleBuilder::new()
        .import_memory("env", "memory", 1, None)
        .func(&[I32, I64], &[], &[], vec![
            I::LocalGet(0),
            I::LocalGet(1),
            I::Store(I64, MemArg { offset: 0 }),
        ])
        .export("write", ExportDesc::Func(0))
        .build();
    let reader = ModuleBuilder::new()
        .import_memory("env", "memory", 1, Some(2))
        .func(&[I32], &[I64], &[], vec![
            I::LocalGet(0),
            I::Load(I64, MemArg { offset: 0 }),
        ])
        .func(&[], &[I32], &[], vec![I::MemorySize])
        .export("read", ExportDesc::Func(0))
        .export("size", ExportDesc::Func(1))
        .build();
    store.instantiate("writer", writer)?;
    store.instantiate("reader", reader)?;

    store.call("writer", "write", &[8u32.into(), 0x0102_0304_0506_0708u64.into()])?;
    assert_eq!(
        store.call("reader", "read", &[8u32.into()])?,
        vec![Value::I64(0x0102_0304_0506_0708)]
    );
    assert_eq!(store.mem(env.memory)?.read(8, 2)?, &[0x08, 0x07]);

    // Growth by the host is visible to guest code through the same address.
    store.grow_mem(env.memory, 1)?;
    assert_eq!(store.call("reader", "size", &[])?, vec![Value::I32(2)]);
    Ok(())
}

#[test]
fn data_segment_out_of_bounds_fails_instantiation() -> Result<()> {
    init_logging();
    let mut store = Store::new();
    let module = ModuleBuilder::new()
        .memory(1, None)
        .data(PAGE_SIZE as u32 - 1, &[1, 2])
        .export("mem", ExportDesc::Mem(0))
        .build();
    let err = store.instantiate("m", module).unwrap_err();
    assert_eq!(
        err.as_trap_error(),
        Some(&TrapKind::OutOfBoundsMemoryAccess(PAGE_SIZE as u64 - 1, 2))
    );
    assert!(store.resolve("m", "mem").is_none());
    Ok(())
}
