use crate::error::SocialError;
use crate::tests::global::{mock_global_state, mock_user};

#[tokio::test]
async fn test_bookmark() {
	let (global, _) = mock_global_state(Default::default());
	let author = mock_user(&global, "author").await;
	let reader = mock_user(&global, "reader").await;
	let review_id = global.store.insert_review(author.id).await;

	let bookmark = global.reviews.bookmark(reader.id, review_id).await.unwrap();
	assert_eq!(bookmark.account_id, reader.id);
	assert_eq!(bookmark.review_id, review_id);

	let err = global.reviews.bookmark(reader.id, review_id).await.unwrap_err();
	assert!(matches!(err, SocialError::Conflict("already bookmarked")));

	global.reviews.unbookmark(reader.id, review_id).await.unwrap();

	let err = global.reviews.unbookmark(reader.id, review_id).await.unwrap_err();
	assert!(matches!(err, SocialError::Conflict("not bookmarked")));

	// a removed bookmark can be made again
	global.reviews.bookmark(reader.id, review_id).await.unwrap();
}

#[tokio::test]
async fn test_share() {
	let (global, _) = mock_global_state(Default::default());
	let author = mock_user(&global, "author").await;
	let reader = mock_user(&global, "reader").await;
	let review_id = global.store.insert_review(author.id).await;

	global.reviews.share(reader.id, review_id).await.unwrap();
	global.reviews.share(author.id, review_id).await.unwrap();

	let err = global.reviews.share(reader.id, review_id).await.unwrap_err();
	assert!(matches!(err, SocialError::Conflict("already shared")));
}

#[tokio::test]
async fn test_missing_review() {
	let (global, _) = mock_global_state(Default::default());
	let author = mock_user(&global, "author").await;
	let review_id = global.store.insert_review(author.id).await;

	global.store.delete_review(review_id).await;

	let err = global.reviews.bookmark(author.id, review_id).await.unwrap_err();
	assert!(matches!(err, SocialError::NotFound("review")));

	let err = global.reviews.unbookmark(author.id, review_id).await.unwrap_err();
	assert!(matches!(err, SocialError::NotFound("review")));

	let err = global.reviews.share(author.id, review_id + 1).await.unwrap_err();
	assert!(matches!(err, SocialError::NotFound("review")));
}
