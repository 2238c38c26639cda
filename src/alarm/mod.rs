pub mod clock_time;
pub mod controller;
pub mod countdown;
pub mod model;
pub mod resolver;
pub mod selection;
pub mod session;
pub mod shift;

#[cfg(test)]
pub(crate) mod testing;
