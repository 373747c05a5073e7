pub mod ask;
pub mod classify;
pub mod doctor;
pub mod invoke;
pub mod serve;
pub mod status;
