pub mod db;
pub mod enrich;
pub mod error;
pub mod lookup;

pub use enrich::enrich_calls;
pub use error::DirectoryError;
pub use lookup::{DirectoryLookup, NoDirectory, SqliteDirectory};
