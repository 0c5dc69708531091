pub mod error;
pub mod features;
pub mod profile;
pub mod quantity;
pub mod select;

pub use error::SelectorError;
pub use features::workload_features;
pub use profile::select_profile;
pub use quantity::{Quantity, QuantityRange};
pub use select::{filter_candidates, select_backend};
