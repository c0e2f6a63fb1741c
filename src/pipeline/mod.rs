/*!
 * The dubbing pipeline.
 *
 * - `orchestrator`: sequences the stages of a run and owns its cleanup
 * - `state`: run states and the run-scoped artifact registry
 * - `synthesis`: speaks translated utterances into clips
 * - `timeline`: places clips on a silent track at their original times
 * - `types`: time slots, utterances, clips and transcripts
 */

pub use self::orchestrator::{Backends, PipelineOrchestrator, ProgressCallback, RunFailure, RunRequest, RunSummary};
pub use self::state::{PipelineState, RunState};
pub use self::synthesis::{SynthesisPass, SynthesizedClips};
pub use self::timeline::{AssembledTrack, Placement, PlacementStats, TimelineSynthesizer, TrackHandle};
pub use self::types::{
    FallbackReason, SynthesizedClip, TimeSlot, Transcript, TranscriptSegment, TranslationOutcome, Utterance,
};

pub mod orchestrator;
pub mod state;
pub mod synthesis;
pub mod timeline;
pub mod types;
