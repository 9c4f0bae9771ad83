//! Binary encodings for vector payloads.
//!
//! - [`float16`]: IEEE binary16 and bfloat16 conversions and vector codecs
//! - [`sparse`]: the sparse float vector pair list

pub mod float16;
pub mod sparse;


pub use float16::{
    bf16_to_f32, decode_bfloat16_vector, decode_float16_vector, encode_bfloat16_vector,
    encode_float16_vector, f16_to_f32, f32_to_bf16, f32_to_f16,
};
pub use sparse::{decode_sparse, encode_sparse, SPARSE_PAIR_LEN};
