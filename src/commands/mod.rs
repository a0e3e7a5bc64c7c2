pub mod add_code;
pub mod batch;
pub mod split;
pub mod status;
pub mod validate;
