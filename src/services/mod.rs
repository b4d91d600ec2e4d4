pub mod cleanup;
pub mod reservation;
pub mod seeder;

pub use cleanup::ExpirySweeper;
pub use reservation::{BookingResult, ReservationEngine, ReserveSeats, SeatChangeListener, SweepReport};
