pub mod admin_log;
pub mod booking;
pub mod driver;
pub mod rating;
pub mod trip;
pub mod user;
pub mod vehicle;
