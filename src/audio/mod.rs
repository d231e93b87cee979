pub mod player;
pub mod session;

pub use player::Player;
pub use session::{LoopMode, Session, SessionError, SessionSnapshot};
