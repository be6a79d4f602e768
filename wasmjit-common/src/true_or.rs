//! Turn boolean checks into `Result`s, so predicate-heavy code can use `?`.

pub trait TrueOr {
    fn true_or<E>(self, err: E) -> std::result::Result<(), E>;
    fn true_or_else<E, F: FnOnce() -> E>(self, err: F) -> std::result::Result<(), E>;
}

impl TrueOr for bool {
    fn true_or<E>(self, err: E) -> std::result::Result<(), E> {
        self.true_or_else(|| err)
    }

    fn true_or_else<E, F: FnOnce() -> E>(self, err: F) -> std::result::Result<(), E> {
        match self {
            true => Ok(()),
            false => Err(err()),
        }
    }
}
