pub mod bookings;
pub mod ratings;
pub mod trips;
