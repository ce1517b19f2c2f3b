//! Screen image analysis
//!
//! - `Region` - captured pixels that remember where they came from
//! - `isolator` - color masking, connected components, cropping
//! - `fuzzy` - OCR-tolerant string similarity
//! - `TextVerifier` - OCR plus fuzzy matching over regions

pub mod fuzzy;
pub mod isolator;
pub mod region;
pub mod verifier;

pub use fuzzy::{fuzzy_match, similarity, MatchResult};
pub use isolator::{
    color_mask, crop, isolate_multiple_regions, isolate_region, line_test, modify_color,
    ColorMode,
};
pub use region::Region;
pub use verifier::{TextVerifier, VerifyMode};
