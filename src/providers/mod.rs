pub mod awesome_api;
pub mod normalize;
