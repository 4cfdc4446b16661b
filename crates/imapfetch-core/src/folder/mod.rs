//! Folder selection and local naming.

mod name;
mod selector;

pub use name::{decode_local_name, local_name};
pub use selector::FolderFilter;
