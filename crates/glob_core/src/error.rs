//! Error types for the game simulation.

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all game simulation errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path (or bundled name) of the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Type definitions parsed but are inconsistent.
    #[error("Invalid type data: {0}")]
    InvalidData(String),

    /// Too many teams for the fixed 32-team masks.
    #[error("Cannot add team: a game holds at most {max} teams")]
    TooManyTeams {
        /// Maximum number of teams.
        max: usize,
    },

    /// Too many players for the fixed 32-player masks.
    #[error("Cannot add player: a game holds at most {max} players")]
    TooManyPlayers {
        /// Maximum number of players.
        max: usize,
    },

    /// A player references a team that does not exist.
    #[error("Player {player} references missing team {team}")]
    UnknownTeam {
        /// Player number.
        player: usize,
        /// Referenced team.
        team: usize,
    },

    /// Map dimensions are not usable.
    #[error("Invalid map size {width}x{height}: dimensions must be powers of two between 16 and 1024")]
    InvalidMapSize {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// Stream IO failed while saving or loading.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A section of a save game could not be encoded or decoded.
    #[error("Codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// The stream does not start with the save-game magic.
    #[error("Not a Globulation 2 save stream")]
    BadMagic,

    /// The byte order flag of a stream is unknown.
    #[error("Unknown byte order flag {0}")]
    BadByteOrder(u8),

    /// A corruption checkpoint did not match.
    #[error("Signature mismatch {section}: expected {expected:?}, found {found:?}")]
    SignatureMismatch {
        /// Section after which the signature is written.
        section: &'static str,
        /// Expected four bytes.
        expected: String,
        /// Bytes actually read.
        found: String,
    },

    /// Loaded data violates a structural invariant.
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    /// An order payload could not be decoded.
    #[error("Malformed order: {0}")]
    MalformedOrder(String),

    /// Desync detected in multiplayer.
    #[error("Desync detected at step {step}: local checksum {local:#010x}, remote checksum {remote:#010x}")]
    DesyncDetected {
        /// Step where desync occurred.
        step: u32,
        /// Local checksum.
        local: u32,
        /// Remote checksum.
        remote: u32,
    },
}

impl GameError {
    /// Build a signature mismatch error from raw bytes.
    #[must_use]
    pub fn signature(section: &'static str, expected: [u8; 4], found: [u8; 4]) -> Self {
        Self::SignatureMismatch {
            section,
            expected: String::from_utf8_lossy(&expected).into_owned(),
            found: String::from_utf8_lossy(&found).into_owned(),
        }
    }
}
