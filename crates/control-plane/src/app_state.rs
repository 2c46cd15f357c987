use crate::{
    config::{NotificationConfig, WatcherConfig},
    notify::DynNotifier,
    persistence,
};

/// Shared application state passed into handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: persistence::Db,
    /// HS256 secret operator JWTs are verified against.
    pub jwt_secret: String,
    pub notifier: DynNotifier,
    pub thresholds: NotificationConfig,
    pub watcher: WatcherConfig,
}

#[allow(dead_code)]
fn _assert_app_state_bounds() {
    fn assert_bounds<T: Clone + Send + Sync + 'static>() {}
    assert_bounds::<AppState>();
}
