pub mod dtos;
pub mod entities;
pub mod protocol;
pub mod stages;
pub mod store;

use sqlx::migrate::Migrator;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");
