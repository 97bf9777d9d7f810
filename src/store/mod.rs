// orgvault — Store Module
//
// Access-scoped storage for users, organizations, memberships and their
// secret entries. Membership checks live inside the queries themselves.

mod db;
mod error;
mod models;
mod password;
mod repository;

pub use db::Database;
pub use error::StoreError;
pub use models::{
    Lookup, MemberProfile, Membership, NewOrganization, NewSecretEntry, NewUser, Organization,
    SecretEntry, User,
};
pub use password::{HASH_COST, MAX_PASSWORD_BYTES};
pub use repository::{AccessStore, SqliteAccessStore};
