pub mod ask;
pub mod env;
pub mod lambda;
pub mod serve;
