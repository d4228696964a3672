pub mod acceptance;
pub mod dispatch;
pub mod expiration;
pub mod lifecycle;
