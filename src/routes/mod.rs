mod health_check;
mod subscriptions;
mod users;

pub use health_check::health_check;
pub use subscriptions::toggle_subscription;
pub use users::{
    change_password, channel_profile, current_user, login, logout, record_watch, refresh_token,
    register, update_account, update_avatar, update_cover_image, watch_history,
};
