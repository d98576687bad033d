pub mod operations;
pub mod schema;


pub use operations::{Database, DbError, EventRow};
pub use schema::initialize_schema;
