mod inspect_playlist;

pub mod fairplay;

pub use self::fairplay::FairPlayCommand;
pub use self::inspect_playlist::InspectPlaylistCommand;
