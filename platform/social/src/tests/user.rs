use chrono::{Duration, Utc};
use common::database::Ulid;

use crate::database::{FollowDirection, NewOAuthUser, ProfileUpdate, User, UserFilter, VerificationRecord};
use crate::error::{SocialError, UnauthorizedReason};
use crate::tests::global::{mock_global_state, mock_user, verified};
use crate::verification::EmailVerifications;

const PASSWORD: &str = "pw123!!";

fn password_matches(user: &User, password: &str) -> bool {
	use argon2::{Argon2, PasswordHash, PasswordVerifier};

	let hash = user.password_hash.as_deref().unwrap();
	Argon2::default()
		.verify_password(password.as_bytes(), &PasswordHash::new(hash).unwrap())
		.is_ok()
}

fn profile(nickname: &str) -> ProfileUpdate {
	ProfileUpdate {
		nickname: nickname.to_string(),
		profile: Some("quack".to_string()),
		interests: vec!["ramen".to_string()],
	}
}

#[tokio::test]
async fn test_register_local_user() {
	let (global, verifications) = mock_global_state(Default::default());
	verifications.insert(verified("duck@quack.io")).await;

	let user = global
		.users
		.create_local_user("duck@quack.io", PASSWORD, PASSWORD)
		.await
		.unwrap();

	assert_eq!(user.serial_number, 1);
	assert_eq!(user.nickname.as_deref(), Some("1번째 오리"));
	assert_eq!(user.provider, "local");
	assert!(password_matches(&user, PASSWORD));
	assert_eq!(verifications.delete_count(), 1);
	assert!(verifications.get_verification_record("duck@quack.io").await.unwrap().is_none());

	verifications.insert(verified("goose@quack.io")).await;
	let second = global
		.users
		.create_local_user("goose@quack.io", PASSWORD, PASSWORD)
		.await
		.unwrap();
	assert_eq!(second.nickname.as_deref(), Some("2번째 오리"));
}

#[tokio::test]
async fn test_register_requires_verification() {
	let (global, verifications) = mock_global_state(Default::default());

	let err = global
		.users
		.create_local_user("duck@quack.io", PASSWORD, PASSWORD)
		.await
		.unwrap_err();
	assert!(matches!(err, SocialError::Unauthorized(UnauthorizedReason::EmailNotVerified)));

	verifications
		.insert(VerificationRecord {
			is_verified: false,
			..verified("duck@quack.io")
		})
		.await;

	let err = global
		.users
		.create_local_user("duck@quack.io", PASSWORD, PASSWORD)
		.await
		.unwrap_err();
	assert!(matches!(err, SocialError::Unauthorized(UnauthorizedReason::EmailNotVerified)));

	assert!(global.users.find_user(UserFilter::by_email("duck@quack.io")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_register_expired_verification() {
	let (global, verifications) = mock_global_state(Default::default());
	verifications
		.insert(VerificationRecord {
			created_at: Utc::now() - Duration::minutes(31),
			..verified("duck@quack.io")
		})
		.await;

	let err = global
		.users
		.create_local_user("duck@quack.io", PASSWORD, PASSWORD)
		.await
		.unwrap_err();
	assert!(matches!(err, SocialError::Unauthorized(UnauthorizedReason::VerificationExpired)));

	// nothing was written, and the record was not consumed
	assert!(global.users.find_user(UserFilter::by_email("duck@quack.io")).await.unwrap().is_none());
	assert_eq!(verifications.delete_count(), 0);
}

#[tokio::test]
async fn test_register_validates_input() {
	let (global, verifications) = mock_global_state(Default::default());
	verifications.insert(verified("duck@quack.io")).await;

	let err = global
		.users
		.create_local_user("duck@quack.io", PASSWORD, "pw123!?")
		.await
		.unwrap_err();
	assert!(matches!(err, SocialError::InvalidArgument { field: "password_confirmation", .. }));

	let err = global
		.users
		.create_local_user("duck@quack.io", "password", "password")
		.await
		.unwrap_err();
	assert!(matches!(err, SocialError::InvalidArgument { field: "password", .. }));

	let err = global
		.users
		.create_local_user("duck", PASSWORD, PASSWORD)
		.await
		.unwrap_err();
	assert!(matches!(err, SocialError::InvalidArgument { field: "email", .. }));
}

#[tokio::test]
async fn test_register_duplicate_email() {
	let (global, verifications) = mock_global_state(Default::default());
	verifications.insert(verified("duck@quack.io")).await;

	global
		.users
		.create_local_user("duck@quack.io", PASSWORD, PASSWORD)
		.await
		.unwrap();

	verifications.insert(verified("duck@quack.io")).await;
	let err = global
		.users
		.create_local_user("duck@quack.io", PASSWORD, PASSWORD)
		.await
		.unwrap_err();
	assert!(matches!(err, SocialError::Conflict("email already registered")));
}

#[tokio::test]
async fn test_concurrent_registration() {
	let (global, verifications) = mock_global_state(Default::default());
	verifications.insert(verified("duck@quack.io")).await;

	let handles = (0..2)
		.map(|_| {
			let global = global.clone();
			tokio::spawn(async move { global.users.create_local_user("duck@quack.io", PASSWORD, PASSWORD).await })
		})
		.collect::<Vec<_>>();

	let mut created = 0;
	let mut conflicts = 0;
	for handle in handles {
		match handle.await.unwrap() {
			Ok(_) => created += 1,
			Err(SocialError::Conflict(_)) => conflicts += 1,
			Err(err) => panic!("unexpected error: {err}"),
		}
	}

	assert_eq!(created, 1);
	assert_eq!(conflicts, 1);
	assert_eq!(verifications.delete_count(), 1);
}

#[tokio::test]
async fn test_find_user() {
	let (global, _) = mock_global_state(Default::default());
	let duck = mock_user(&global, "duck").await;
	mock_user(&global, "goose").await;

	let found = global
		.users
		.find_user(UserFilter {
			email: Some("duck@quack.io".to_string()),
			nickname: Some("duck".to_string()),
			..Default::default()
		})
		.await
		.unwrap();
	assert_eq!(found.map(|u| u.id), Some(duck.id));

	// every given field has to match
	let found = global
		.users
		.find_user(UserFilter {
			email: Some("duck@quack.io".to_string()),
			nickname: Some("goose".to_string()),
			..Default::default()
		})
		.await
		.unwrap();
	assert!(found.is_none());

	let err = global.users.find_user(UserFilter::default()).await.unwrap_err();
	assert!(matches!(err, SocialError::InvalidArgument { field: "filter", .. }));

	global.users.delete_user(duck.id).await.unwrap();
	assert!(global.users.find_user(UserFilter::by_id(duck.id)).await.unwrap().is_none());

	let err = global.users.delete_user(duck.id).await.unwrap_err();
	assert!(matches!(err, SocialError::NotFound("user")));
}

#[tokio::test]
async fn test_update_profile() {
	let (global, _) = mock_global_state(Default::default());
	let duck = mock_user(&global, "duck").await;
	mock_user(&global, "goose").await;

	// keeping one's own nickname is fine
	let updated = global.users.update_profile(duck.id, profile("duck")).await.unwrap();
	assert_eq!(updated.nickname.as_deref(), Some("duck"));
	assert_eq!(updated.profile.as_deref(), Some("quack"));
	assert_eq!(updated.interest1.as_deref(), Some("ramen"));
	assert_eq!(updated.interest2, None);

	let err = global.users.update_profile(duck.id, profile("goose")).await.unwrap_err();
	assert!(matches!(err, SocialError::Conflict("nickname already taken")));

	let err = global
		.users
		.update_profile(
			duck.id,
			ProfileUpdate {
				interests: vec!["a".to_string(), "b".to_string(), "c".to_string()],
				..profile("duck")
			},
		)
		.await
		.unwrap_err();
	assert!(matches!(err, SocialError::InvalidArgument { field: "interests", .. }));

	let err = global.users.update_profile(duck.id, profile("d")).await.unwrap_err();
	assert!(matches!(err, SocialError::InvalidArgument { field: "nickname", .. }));

	let err = global.users.update_profile(Ulid::new(), profile("swan")).await.unwrap_err();
	assert!(matches!(err, SocialError::NotFound("user")));

	assert!(global.users.is_nickname_taken("goose").await.unwrap());
	assert!(!global.users.is_nickname_taken("swan").await.unwrap());
}

#[tokio::test]
async fn test_deleted_users_release_their_nickname() {
	let (global, _) = mock_global_state(Default::default());
	let duck = mock_user(&global, "duck").await;
	let goose = mock_user(&global, "goose").await;

	global.users.delete_user(duck.id).await.unwrap();

	let updated = global.users.update_profile(goose.id, profile("duck")).await.unwrap();
	assert_eq!(updated.nickname.as_deref(), Some("duck"));
}

#[tokio::test]
async fn test_create_oauth_user() {
	let (global, _) = mock_global_state(Default::default());
	let duck = mock_user(&global, "duck").await;

	assert_eq!(duck.provider, "kakao");
	assert!(duck.password_hash.is_none());
	assert!(duck.profile_image.is_none());

	let err = global
		.users
		.create_oauth_user(NewOAuthUser {
			email: "other@quack.io".to_string(),
			nickname: "duck".to_string(),
			provider: "naver".to_string(),
			provider_key: "naver-1".to_string(),
		})
		.await
		.unwrap_err();
	assert!(matches!(err, SocialError::Conflict("nickname already taken")));
}

#[tokio::test]
async fn test_find_user_with_provider() {
	let (global, _) = mock_global_state(Default::default());
	let duck = mock_user(&global, "duck").await;
	mock_user(&global, "goose").await;

	let found = global.users.find_user_with_provider("kakao", "kakao-duck").await.unwrap();
	assert_eq!(found.map(|u| u.id), Some(duck.id));

	// the key is only unique within its provider
	assert!(global
		.users
		.find_user_with_provider("naver", "kakao-duck")
		.await
		.unwrap()
		.is_none());

	global.users.delete_user(duck.id).await.unwrap();
	assert!(global
		.users
		.find_user_with_provider("kakao", "kakao-duck")
		.await
		.unwrap()
		.is_none());
}

#[tokio::test]
async fn test_profile_image_swap() {
	let (global, _) = mock_global_state(Default::default());
	let duck = mock_user(&global, "duck").await;

	let user = global.users.update_profile_image(duck.id, "images/a.png").await.unwrap();
	assert_eq!(user.profile_image.as_deref(), Some("images/a.png"));

	let user = global.users.update_profile_image(duck.id, "images/b.png").await.unwrap();
	assert_eq!(user.profile_image.as_deref(), Some("images/b.png"));
	assert_eq!(
		global.users.get_user(duck.id).await.unwrap().profile_image.as_deref(),
		Some("images/b.png")
	);

	let user = global.users.delete_profile_image(duck.id).await.unwrap();
	assert!(user.profile_image.is_none());

	let err = global.users.update_profile_image(Ulid::new(), "images/c.png").await.unwrap_err();
	assert!(matches!(err, SocialError::NotFound("user")));
}

#[tokio::test]
async fn test_follow_page_for_viewer() {
	let (global, _) = mock_global_state(Default::default());
	let viewer = mock_user(&global, "viewer").await;
	let star = mock_user(&global, "star").await;
	let a = mock_user(&global, "duck_a").await;
	let b = mock_user(&global, "duck_b").await;

	global.follows.follow(a.id, star.id).await.unwrap();
	global.follows.follow(b.id, star.id).await.unwrap();
	global.blocks.block(viewer.id, a.id).await.unwrap();

	let page = global
		.users
		.get_follow_page_for(viewer.id, star.id, FollowDirection::Followers, 1, 10)
		.await
		.unwrap();

	assert_eq!(page.total_pages, 1);
	assert_eq!(
		page.items
			.iter()
			.map(|r| (r.record.id, r.blocked_by_viewer))
			.collect::<Vec<_>>(),
		vec![(b.id, false), (a.id, true)]
	);
}
