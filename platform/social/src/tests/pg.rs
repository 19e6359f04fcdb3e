use chrono::Utc;
use serial_test::serial;

use crate::database::{FollowDirection, NewOAuthUser, NotificationKind, User, VerificationRecord};
use crate::error::SocialError;
use crate::service::CreateNotification;
use crate::store::{Store, StoreError, Transaction};
use crate::tests::global::{mock_user, pg_global_state, PgGlobalState};

const PASSWORD: &str = "pw123!!";

async fn insert_verification(global: &PgGlobalState, record: VerificationRecord) {
	sqlx::query("INSERT INTO email_verifications (email, is_verified, created_at) VALUES ($1, $2, $3)")
		.bind(&record.email)
		.bind(record.is_verified)
		.bind(record.created_at)
		.execute(global.store.db().as_ref())
		.await
		.unwrap();
}

fn like(sender: &User, recipient: &User) -> CreateNotification {
	CreateNotification {
		sender_id: sender.id,
		recipient_id: recipient.id,
		kind: NotificationKind::ReviewLike,
		review_id: Some(1),
		content: None,
	}
}

#[serial]
#[tokio::test]
async fn test_serial_follow_direction_and_pagination() {
	let Some(global) = pg_global_state().await else {
		return;
	};

	let star = mock_user(&global, "star").await;
	let mut fans = Vec::new();
	for i in 0..7 {
		let fan = mock_user(&global, &format!("fan{i}")).await;
		global.follows.follow(fan.id, star.id).await.unwrap();
		fans.push(fan);
	}

	let first = global
		.follows
		.get_follow_page(star.id, FollowDirection::Followers, 1, 3)
		.await
		.unwrap();
	assert_eq!(first.total_pages, 3);
	assert_eq!(
		first.items.iter().map(|u| u.id).collect::<Vec<_>>(),
		vec![fans[6].id, fans[5].id, fans[4].id]
	);
	assert!(first.items.iter().all(|u| u.followee_count == 1));

	let last = global
		.follows
		.get_follow_page(star.id, FollowDirection::Followers, 3, 3)
		.await
		.unwrap();
	assert_eq!(last.items.iter().map(|u| u.id).collect::<Vec<_>>(), vec![fans[0].id]);

	let followees = global
		.follows
		.get_follow_page(fans[0].id, FollowDirection::Followees, 1, 10)
		.await
		.unwrap();
	assert_eq!(followees.items.iter().map(|u| u.id).collect::<Vec<_>>(), vec![star.id]);
	assert_eq!(followees.items[0].follower_count, 7);

	let none = global
		.follows
		.get_follow_page(star.id, FollowDirection::Followees, 1, 10)
		.await
		.unwrap();
	assert_eq!(none.total_pages, 0);

	// deleted fans drop out of both the page and the derived count
	global.users.delete_user(fans[6].id).await.unwrap();

	let first = global
		.follows
		.get_follow_page(star.id, FollowDirection::Followers, 1, 3)
		.await
		.unwrap();
	assert_eq!(first.items[0].id, fans[5].id);
	assert_eq!(global.users.get_user(star.id).await.unwrap().follower_count, 6);

	let err = global.follows.follow(fans[0].id, star.id).await.unwrap_err();
	assert!(matches!(err, SocialError::Conflict("already following")));
}

#[serial]
#[tokio::test]
async fn test_serial_annotate_blocked() {
	let Some(global) = pg_global_state().await else {
		return;
	};

	let viewer = mock_user(&global, "viewer").await;
	let a = mock_user(&global, "duck_a").await;
	let b = mock_user(&global, "duck_b").await;
	let c = mock_user(&global, "duck_c").await;

	global.blocks.block(viewer.id, b.id).await.unwrap();
	global.blocks.block(a.id, c.id).await.unwrap();

	let annotated = global
		.blocks
		.annotate_blocked(viewer.id, vec![c.clone(), b.clone(), a.clone(), b.clone()])
		.await
		.unwrap();

	assert_eq!(
		annotated
			.iter()
			.map(|r| (r.record.id, r.blocked_by_viewer))
			.collect::<Vec<_>>(),
		vec![(c.id, false), (b.id, true), (a.id, false), (b.id, true)]
	);

	let annotated = global.blocks.annotate_blocked(viewer.id, Vec::<User>::new()).await.unwrap();
	assert!(annotated.is_empty());
}

#[serial]
#[tokio::test]
async fn test_serial_notification_page() {
	let Some(global) = pg_global_state().await else {
		return;
	};

	let sender = mock_user(&global, "duck1").await;
	let recipient = mock_user(&global, "duck2").await;

	for _ in 0..7 {
		global.notifications.create_notification(like(&sender, &recipient)).await.unwrap();
	}

	let page = global
		.notifications
		.get_my_notifications_page(recipient.id, 1, 3)
		.await
		.unwrap();
	assert_eq!(page.total_pages, 3);
	assert_eq!(page.items.len(), 3);
	assert!(page.items.iter().all(|n| !n.is_read()));
	assert_eq!(page.items[0].message, "duck1님이 내 리뷰를 좋아합니다.");

	// every row was marked, not only the three on the page
	assert_eq!(global.notifications.unread_count(recipient.id).await.unwrap(), 0);

	let last = global
		.notifications
		.get_my_notifications_page(recipient.id, 3, 3)
		.await
		.unwrap();
	assert_eq!(last.items.len(), 1);
	assert!(last.items[0].is_read());
}

#[serial]
#[tokio::test]
async fn test_serial_page_leaves_later_notifications_unread() {
	let Some(global) = pg_global_state().await else {
		return;
	};

	let sender = mock_user(&global, "duck1").await;
	let recipient = mock_user(&global, "duck2").await;

	global.notifications.create_notification(like(&sender, &recipient)).await.unwrap();

	let mut tx = global.store.begin_snapshot().await.unwrap();
	assert_eq!(tx.count_notifications(recipient.id).await.unwrap(), 1);
	assert_eq!(tx.list_notifications(recipient.id, 0, 10).await.unwrap().len(), 1);

	// committed by another connection after the page was counted and listed
	global.notifications.create_notification(like(&sender, &recipient)).await.unwrap();

	assert_eq!(tx.mark_notifications_read(recipient.id, Utc::now()).await.unwrap(), 1);
	tx.commit().await.unwrap();

	assert_eq!(global.notifications.unread_count(recipient.id).await.unwrap(), 1);

	let page = global
		.notifications
		.get_my_notifications_page(recipient.id, 1, 10)
		.await
		.unwrap();
	assert_eq!(page.items.iter().filter(|n| !n.is_read()).count(), 1);
}

#[serial]
#[tokio::test]
async fn test_serial_concurrent_page_reads() {
	let Some(global) = pg_global_state().await else {
		return;
	};

	let sender = mock_user(&global, "duck1").await;
	let recipient = mock_user(&global, "duck2").await;

	for _ in 0..4 {
		global.notifications.create_notification(like(&sender, &recipient)).await.unwrap();
	}

	let handles = (0..4)
		.map(|_| {
			let global = global.clone();
			tokio::spawn(async move { global.notifications.get_my_notifications_page(recipient.id, 1, 10).await })
		})
		.collect::<Vec<_>>();

	let mut unread_seen = 0;
	for handle in handles {
		let page = handle.await.unwrap().unwrap();
		assert_eq!(page.items.len(), 4);
		unread_seen += page.items.iter().filter(|n| !n.is_read()).count();
	}

	assert_eq!(unread_seen, 4);
	assert_eq!(global.notifications.unread_count(recipient.id).await.unwrap(), 0);
}

#[serial]
#[tokio::test]
async fn test_serial_concurrent_registration() {
	let Some(global) = pg_global_state().await else {
		return;
	};

	insert_verification(
		&global,
		VerificationRecord {
			email: "duck@quack.io".to_string(),
			is_verified: true,
			created_at: Utc::now(),
		},
	)
	.await;

	let handles = (0..2)
		.map(|_| {
			let global = global.clone();
			tokio::spawn(async move { global.users.create_local_user("duck@quack.io", PASSWORD, PASSWORD).await })
		})
		.collect::<Vec<_>>();

	let mut created = Vec::new();
	let mut conflicts = 0;
	for handle in handles {
		match handle.await.unwrap() {
			Ok(user) => created.push(user),
			Err(SocialError::Conflict(_)) => conflicts += 1,
			Err(err) => panic!("unexpected error: {err}"),
		}
	}

	assert_eq!(created.len(), 1);
	assert_eq!(conflicts, 1);
	assert_eq!(created[0].nickname.as_deref(), Some("1번째 오리"));

	let (records,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM email_verifications")
		.fetch_one(global.store.db().as_ref())
		.await
		.unwrap();
	assert_eq!(records, 0);
}

#[serial]
#[tokio::test]
async fn test_serial_unique_violation_is_a_conflict() {
	let Some(global) = pg_global_state().await else {
		return;
	};

	mock_user(&global, "duck").await;

	// straight to the store, past the nickname check of the service
	let mut tx = global.store.begin().await.unwrap();
	let err = tx
		.insert_oauth_user(&NewOAuthUser {
			email: "other@quack.io".to_string(),
			nickname: "duck".to_string(),
			provider: "naver".to_string(),
			provider_key: "naver-1".to_string(),
		})
		.await
		.unwrap_err();

	assert!(matches!(&err, StoreError::UniqueViolation(constraint) if constraint == "users_nickname_active_key"));
	assert!(matches!(SocialError::from(err), SocialError::Conflict("nickname already taken")));
}

#[serial]
#[tokio::test]
async fn test_serial_find_user_with_provider() {
	let Some(global) = pg_global_state().await else {
		return;
	};

	let duck = mock_user(&global, "duck").await;
	mock_user(&global, "goose").await;

	let found = global.users.find_user_with_provider("kakao", "kakao-duck").await.unwrap();
	assert_eq!(found.map(|u| u.id), Some(duck.id));
	assert!(global
		.users
		.find_user_with_provider("naver", "kakao-duck")
		.await
		.unwrap()
		.is_none());
}

#[serial]
#[tokio::test]
async fn test_serial_bookmark() {
	let Some(global) = pg_global_state().await else {
		return;
	};

	let author = mock_user(&global, "author").await;
	let reader = mock_user(&global, "reader").await;

	let (review_id,): (i64,) = sqlx::query_as("INSERT INTO reviews (author_id) VALUES ($1) RETURNING id")
		.bind(author.id)
		.fetch_one(global.store.db().as_ref())
		.await
		.unwrap();

	global.reviews.bookmark(reader.id, review_id).await.unwrap();
	let err = global.reviews.bookmark(reader.id, review_id).await.unwrap_err();
	assert!(matches!(err, SocialError::Conflict("already bookmarked")));

	global.reviews.share(reader.id, review_id).await.unwrap();

	let err = global.reviews.share(reader.id, review_id + 1).await.unwrap_err();
	assert!(matches!(err, SocialError::NotFound("review")));
}
