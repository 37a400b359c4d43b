pub mod server;

pub use ghrelay_config::Config;
pub use server::{AppState, Credentials, RelayServer, UploadForm};
