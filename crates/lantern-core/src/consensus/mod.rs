pub mod light_client;
pub mod sync_committee;

pub use light_client::*;
pub use sync_committee::*;
