/*
[INPUT]:  Wire schema definitions and serde requirements
[OUTPUT]: Typed Rust structs/enums with serialization support
[POS]:    Data layer - tick and market status types shared by every layer
[UPDATE]: When the wire schema changes or new types are added
*/

pub mod enums;
pub mod models;

pub use enums::*;
pub use models::*;
