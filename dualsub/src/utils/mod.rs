pub mod filename;
pub mod fs;
pub mod json;
pub mod url;
