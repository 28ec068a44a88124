pub mod generate;
pub mod history;
pub mod logs;
pub mod migrate;
pub mod plan;
pub mod repair;
pub mod rollback;
pub mod status;
