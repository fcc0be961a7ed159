//! Intra-Session Context Compressor (C8)
//!
//! Two trigger paths share one compaction core ([`core`]): [`proactive`]
//! checks the running token estimate before each dispatch call and
//! compresses preemptively once it crosses the target size; [`reactive`]
//! only fires once a call has actually returned a `context_overflow`
//! error. Both preserve the original request, the last
//! [`core::KEEP_LAST_K`] messages, and every code-bearing message, and
//! both fall back to a blunt truncation marker if the summarizer call
//! itself fails.

pub mod core;
pub mod proactive;
pub mod reactive;

pub use core::{compress, estimate_tokens, target_tokens, DEFAULT_TARGET_FRACTION, KEEP_LAST_K};
pub use proactive::{maybe_compress, should_compress};
pub use reactive::{compress_after_overflow, is_context_overflow};
