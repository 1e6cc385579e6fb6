pub mod decode;
pub mod source;
pub mod tap;
