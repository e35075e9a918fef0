//! pulsekit - on-device data core for a BLE wellness wearable
//!
//! pulsekit turns raw firmware notification payloads into a scored wellness
//! state through a small pipeline: TLV decoding → sample store (dedup,
//! persist, publish) → wellness scoring over rolling windows.
//!
//! ## Modules
//!
//! - **decoder**: stateless TLV packet decoding, never panics
//! - **store**: canonical deduplicated sample collection with a serialized
//!   mutation worker, JSON persistence, and publish/subscribe
//! - **wellness**: pure composite scoring from 6h/24h trailing windows
//! - **demo**: seeded synthetic day profiles for offline operation
//!
//! The BLE transport and all presentation live outside this crate; it only
//! consumes decoded transport bytes and hands back well-formed results.
//! There are no fatal error paths: malformed wire data decodes partially,
//! persistence failures degrade to empty reads, and missing history yields
//! an explicit unavailable sentinel.

pub mod decoder;
pub mod demo;
pub mod error;
pub mod store;
pub mod types;
pub mod wellness;

pub use decoder::decode_packet;
pub use demo::{DayProfile, DemoGenerator};
pub use error::StoreError;
pub use store::SampleStore;
pub use types::{DeviceSample, RecoveryPhase, WellnessSnapshot};
pub use wellness::WellnessEngine;
