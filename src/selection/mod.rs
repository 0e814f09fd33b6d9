mod engine;
mod policy;

pub use engine::{
    Candidate, Selection, SelectionOptions, last_downloaded_before_gap, select_missing,
};
pub use policy::{
    DateContext, DayLabel, EmptyDirectoryPolicy, NoOverlapPolicy, only_from_date, only_last_n,
};
