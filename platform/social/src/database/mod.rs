mod block;
mod follow;
mod notification;
mod profile_image;
mod review;
mod user;
mod verification;

pub use block::*;
pub use follow::*;
pub use notification::*;
pub use profile_image::*;
pub use review::*;
pub use user::*;
pub use verification::*;
