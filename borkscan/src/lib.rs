pub mod scan;
pub mod shared;

pub mod prelude {
    pub use super::scan::prelude::*;
    pub use super::shared::prelude::*;
}
