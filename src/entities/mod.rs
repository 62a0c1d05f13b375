pub mod prelude;

pub mod return_media;
pub mod return_requests;
pub mod users;
