/*!
 * Segment translation.
 *
 * - `pass`: translates transcript segments into utterances, tagging every
 *   result as translated or fallen back to the source text
 * - `cache`: per-run cache of already translated phrases
 * - `prompt`: system and user prompts for the LLM translators
 */

pub use self::cache::TranslationCache;
pub use self::pass::{TranslatedSegments, TranslationPass, TranslationStats};
pub use self::prompt::TranslationPrompt;

pub mod cache;
pub mod pass;
pub mod prompt;
