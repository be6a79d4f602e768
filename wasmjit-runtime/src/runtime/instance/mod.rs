pub mod addr;
pub mod export_instance;
pub mod function_instance;
pub mod global_instance;
pub mod mem_instance;
pub mod module_instance;
pub mod table_instance;

pub use {
    export_instance::{ExportInstance, ExternKind, ExternType, ExternalVal},
    function_instance::{CompiledCode, FunctionInstance, GuestFunction, HostFunc, HostFunction},
    global_instance::GlobalInstance,
    mem_instance::{MemInstance, PAGE_SIZE},
    module_instance::{ModuleInstance, ModuleInstanceBuilder},
    table_instance::TableInstance,
};
