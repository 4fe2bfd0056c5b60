pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;
pub mod jobs;

use crate::app::notifications::NotificationService;
use crate::app::users::UserLifecycleService;

#[derive(Clone)]
pub struct AppState {
    pub notifications: NotificationService,
    pub lifecycle: UserLifecycleService,
    pub admin_token: Option<String>,
}
