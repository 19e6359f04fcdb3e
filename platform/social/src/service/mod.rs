mod block;
mod follow;
mod notification;
mod review;
mod user;

pub use block::{annotate_blocked_in, BlockAnnotated, BlockFilter};
pub use follow::{follow_page_in, FollowAnnotated, FollowDirectory};
pub use notification::{record_notification, CreateNotification, NotificationLedger};
pub use review::ReviewEdges;
pub use user::UserDirectory;
