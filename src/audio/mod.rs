/*!
 * Audio primitives used by the timeline resynthesis.
 *
 * - `buffer`: in-memory mono sample buffer and its editing operations
 * - `stretch`: deterministic time-stretching to an exact length
 * - `wav`: WAV file reading and writing through `hound`
 */

pub use self::buffer::AudioBuffer;
pub use self::stretch::{stretch_to_len, StretchMode};

pub mod buffer;
pub mod stretch;
pub mod wav;
