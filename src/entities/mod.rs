pub mod auth_token;
pub mod user;
pub mod user_video_progress;
pub mod video;

pub use auth_token::Entity as AuthToken;
pub use user::Entity as User;
pub use user_video_progress::Entity as UserVideoProgress;
pub use video::Entity as Video;
