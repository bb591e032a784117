// Integration tests over on-disk fixtures

pub mod end_to_end;
pub mod helpers;
pub mod incremental;
