pub mod decode;
pub mod store;

pub use decode::{AudioDecoder, DecodedAudio, RawAudio, TARGET_SAMPLE_RATE};
pub use store::{AudioAsset, AudioAssetStore, ScopedAsset};
