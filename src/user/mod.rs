mod auth;
mod sqlite_user_store;
mod user_manager;
mod user_store;

pub use auth::{AuthToken, AuthTokenValue, CredentialsHasher, PasswordCredentials};
pub use sqlite_user_store::{SqliteUserStore, USER_SCHEMA};
pub use user_manager::UserManager;
pub use user_store::{UserAuthCredentialsStore, UserAuthTokenStore, UserStore};
