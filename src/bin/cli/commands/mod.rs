pub mod add;
pub mod due;
pub mod edit;
pub mod ls;
pub mod review;
pub mod rm;
pub mod show;
