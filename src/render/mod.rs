pub mod canvas;
pub mod frame;
pub mod layout;
pub mod text;
