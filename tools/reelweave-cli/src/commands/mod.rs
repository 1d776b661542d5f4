pub mod check;
pub mod compile;
pub mod history;
pub mod render;
pub mod select;
pub mod validate;
pub mod xmeml;
