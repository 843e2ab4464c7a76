//! Data access layer: the store trait and its backends.

pub mod store {
    pub use crate::store::*;
}

pub mod db_storage {
    pub use crate::db_storage::*;
}

pub mod db {
    pub use crate::db::*;
}
