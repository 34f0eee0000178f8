pub mod lanes;
pub mod protocol;
pub mod stdio;
