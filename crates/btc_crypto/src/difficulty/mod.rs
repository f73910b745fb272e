pub mod filter;
pub mod target;
pub mod work;
