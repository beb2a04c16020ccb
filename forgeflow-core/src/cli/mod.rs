mod check;
mod dump;
mod serve;

#[cfg(test)]
mod tests;

pub use check::{check, config_error_hint};
pub use dump::{RepresentationFormat, dump, render};
pub use serve::serve_until;
