//! cuesmith - subtitle segmentation and alignment
//!
//! Builds timed subtitle cues from the character alignment of a
//! text-to-speech service, writes them as SRT, translates them in batches
//! through a chat-completion API and exports FCPXML timelines.

pub mod alignment;
pub mod cli;
pub mod config;
pub mod error;
pub mod fcpxml;
pub mod output;
pub mod progress;
pub mod segment;
pub mod subtitle;
pub mod translate;
pub mod workflow;
