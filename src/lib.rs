pub mod bgzf;
pub mod config;
pub mod cursor;
pub mod error;
pub mod index;
pub mod query;
pub mod reader;
pub mod record;
pub mod types;

pub use config::Config;
pub use cursor::{Advance, Cursor};
pub use error::{Error, Result};
pub use index::Index;
pub use reader::TabixReader;
