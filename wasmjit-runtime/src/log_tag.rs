use log::Level;

#[derive(Debug)]
pub enum Tag {
    Alloc,
    Link,
    Load,
    Call,
    Host,
    Mem,
    Trap,
}

impl wasmjit_common::logger::Tag for Tag {
    fn level(&self) -> Level {
        match self {
            Tag::Load | Tag::Link | Tag::Trap => Level::Debug,
            Tag::Alloc | Tag::Call | Tag::Host | Tag::Mem => Level::Trace,
        }
    }
}
