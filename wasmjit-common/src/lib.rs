pub mod logger;
pub mod marker;
pub mod true_or;
