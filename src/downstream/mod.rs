pub mod circuit;
pub mod proxy;

pub use proxy::{
    ConfirmResult, DownstreamProxy, Money, PaymentIntent, PaymentStatus, Reservation,
    ReservationRequest,
};
