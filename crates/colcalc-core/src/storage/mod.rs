//! Session files in, column lists out.

mod session;
mod writer;

pub use session::{Session, load_session, parse_session};
pub use writer::{write_columns, write_columns_content};
