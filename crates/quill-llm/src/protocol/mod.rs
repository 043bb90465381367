//! Wire format types for the supported backend APIs
//!
//! Pure serde structs matching each backend's JSON. They exist only at the
//! serialization boundary; `convert` maps them to and from `types`.

pub mod nova;
pub mod openai;
pub mod shared;
