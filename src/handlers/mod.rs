//! 핸들러 모듈

pub mod auth;
pub mod connection;
pub mod game;
pub mod rooms;
pub mod videos;

pub use auth::*;
pub use connection::*;
pub use game::*;
pub use rooms::*;
pub use videos::*;
