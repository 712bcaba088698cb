//! Collection modules.

pub mod close_collect;
pub mod month_plan;

pub use close_collect::{collect_closes, download_closes};
pub use month_plan::write_month_plan;
