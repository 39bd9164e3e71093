mod board;
mod detail;
mod profile;
mod public;

pub use board::BoardView;
pub use profile::ProfileView;
pub use public::PublicFeedView;
