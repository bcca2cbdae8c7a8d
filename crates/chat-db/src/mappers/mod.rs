//! Entity <-> model mappers

mod account;
mod device;
mod message;
