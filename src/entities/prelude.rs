pub use super::return_media::Entity as ReturnMedia;
pub use super::return_requests::Entity as ReturnRequests;
pub use super::users::Entity as Users;
