//! Model serialization.
//!
//! Checkpoints use the `SafeTensors` layout so they can be inspected with
//! standard tooling:
//! ```text
//! [8-byte header: u64 metadata length (little-endian)]
//! [JSON metadata: tensor names, dtypes, shapes, data_offsets]
//! [Raw tensor data: F32 values in little-endian]
//! ```

pub mod safetensors;

pub use safetensors::{
    load_safetensors, save_safetensors, LoadedSafeTensors, SafeTensorsMetadata, TensorMap,
    UserMetadata,
};
