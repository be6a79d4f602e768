/// A macro to create a new zero-sized marker type for an existing trait.
///
/// ```
/// use wasmjit_common::marker;
/// trait Kind {
///     const NAME: &'static str;
/// }
/// marker!(Function: Kind);
/// assert_eq!(<Function as Kind>::NAME, "Function");
/// ```
///
/// The marker trait is expected to carry a `NAME` constant; the macro fills it
/// in with the name of the generated type, which is what diagnostics print.
#[macro_export]
macro_rules! marker {
    (
        $(#[$($attrss:tt)*])*
        $n:ident: $t:path
    ) => {
        $(#[$($attrss)*])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
        pub struct $n;
        impl $t for $n {
            const NAME: &'static str = stringify!($n);
        }
    };
}
