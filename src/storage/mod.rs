pub mod db;
mod files;
pub mod models;
mod tables;

pub use db::{Database, DatabaseError};
pub use files::ListFilter;
pub use tables::*;
