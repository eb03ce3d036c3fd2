use chrono::{Duration, TimeZone, Utc};
use gigboard_config::DatabaseConfig;
use gigboard_database::{
    initialize_database, ConversationRepository, DatabaseError, MessageRepository,
    NewConversation, ParticipantPair, ParticipantRepository, PartyRepository,
};
use sqlx::SqlitePool;
use tempfile::TempDir;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

struct TestContext {
    _temp_dir: TempDir,
    pool: SqlitePool,
}

impl TestContext {
    async fn new() -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let config = DatabaseConfig {
            url: format!("sqlite://{}", temp_dir.path().join("repos.db").display()),
            max_connections: 4,
        };
        let pool = initialize_database(&config).await?;

        for (user_id, username) in [("u1", "alice"), ("u2", "bob"), ("u3", "carol")] {
            sqlx::query("INSERT INTO users (user_id, username, avatar_url) VALUES (?, ?, ?)")
                .bind(user_id)
                .bind(username)
                .bind(format!("https://cdn.example/{username}.png"))
                .execute(&pool)
                .await?;
        }
        sqlx::query("INSERT INTO jobs (job_id, client_id, title) VALUES ('j1', 'u1', 'Fix sink')")
            .execute(&pool)
            .await?;
        sqlx::query(
            "INSERT INTO applications (application_id, job_id, worker_id) VALUES ('a1', 'j1', 'u2')",
        )
        .execute(&pool)
        .await?;

        Ok(Self {
            _temp_dir: temp_dir,
            pool,
        })
    }

    fn conversations(&self) -> ConversationRepository {
        ConversationRepository::new(self.pool.clone())
    }

    fn messages(&self) -> MessageRepository {
        MessageRepository::new(self.pool.clone())
    }

    fn participants(&self) -> ParticipantRepository {
        ParticipantRepository::new(self.pool.clone())
    }
}

#[tokio::test]
async fn directory_lookups_resolve_context_owners() -> TestResult {
    let ctx = TestContext::new().await?;
    let parties = PartyRepository::new(ctx.pool.clone());

    let alice = parties.find_by_id("u1").await?.expect("alice exists");
    assert_eq!(alice.username, "alice");
    assert!(parties.exists("u2").await?);
    assert!(!parties.exists("ghost").await?);
    assert_eq!(parties.find_job_client("j1").await?.as_deref(), Some("u1"));
    assert_eq!(parties.find_application_worker("a1").await?.as_deref(), Some("u2"));
    assert!(parties.find_job_client("missing").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn conversation_is_found_regardless_of_argument_order() -> TestResult {
    let ctx = TestContext::new().await?;
    let repo = ctx.conversations();

    let mut request = NewConversation::between(ParticipantPair::new("u2", "u1"));
    request.job_id = Some("j1".to_string());
    request.client_id = Some("u1".to_string());
    let created = repo.create(&request).await?;

    let forward = repo.find_between(&ParticipantPair::new("u1", "u2")).await?;
    let backward = repo.find_between(&ParticipantPair::new("u2", "u1")).await?;
    assert_eq!(forward.as_ref().map(|c| c.id.as_str()), Some(created.id.as_str()));
    assert_eq!(forward, backward);
    assert_eq!(created.client_id.as_deref(), Some("u1"));
    assert!(created.last_message_at.is_none());

    let participants = ctx.participants().list_for_conversation(&created.id).await?;
    let ids: Vec<&str> = participants.iter().map(|p| p.user_id.as_str()).collect();
    assert_eq!(ids, vec!["u1", "u2"]);
    assert!(participants.iter().all(|p| p.last_read_at.is_none()));
    Ok(())
}

#[tokio::test]
async fn duplicate_pair_is_rejected_without_partial_rows() -> TestResult {
    let ctx = TestContext::new().await?;
    let repo = ctx.conversations();

    repo.create(&NewConversation::between(ParticipantPair::new("u1", "u2")))
        .await?;
    let error = repo
        .create(&NewConversation::between(ParticipantPair::new("u2", "u1")))
        .await
        .expect_err("second creation must violate the pair constraint");

    assert!(matches!(error, DatabaseError::Duplicate(_)), "got {error:?}");
    assert_eq!(repo.count().await?, 1);

    let participant_rows: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM conversation_participants")
            .fetch_one(&ctx.pool)
            .await?;
    assert_eq!(participant_rows, 2);
    Ok(())
}

#[tokio::test]
async fn append_sets_last_message_at_to_sent_at() -> TestResult {
    let ctx = TestContext::new().await?;
    let conversation = ctx
        .conversations()
        .create(&NewConversation::between(ParticipantPair::new("u1", "u2")))
        .await?;

    let message = ctx
        .messages()
        .append(&conversation.id, "u1", "hi", Utc::now())
        .await?;

    let reloaded = ctx
        .conversations()
        .find_by_id(&conversation.id)
        .await?
        .expect("conversation exists");
    assert_eq!(reloaded.last_message_at, Some(message.sent_at));
    assert_eq!(
        ctx.messages().find_by_id(&message.id).await?,
        Some(message)
    );
    Ok(())
}

#[tokio::test]
async fn sent_at_stays_strictly_increasing_when_clock_repeats() -> TestResult {
    let ctx = TestContext::new().await?;
    let conversation = ctx
        .conversations()
        .create(&NewConversation::between(ParticipantPair::new("u1", "u2")))
        .await?;
    let frozen = Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap();
    let earlier = frozen - Duration::seconds(30);

    let first = ctx.messages().append(&conversation.id, "u1", "a", frozen).await?;
    let second = ctx.messages().append(&conversation.id, "u2", "b", frozen).await?;
    let third = ctx.messages().append(&conversation.id, "u1", "c", earlier).await?;

    assert_eq!(first.sent_at, frozen);
    assert!(second.sent_at > first.sent_at);
    assert!(third.sent_at > second.sent_at);
    Ok(())
}

#[tokio::test]
async fn append_to_unknown_conversation_writes_nothing() -> TestResult {
    let ctx = TestContext::new().await?;

    let error = ctx
        .messages()
        .append("missing", "u1", "hello", Utc::now())
        .await
        .expect_err("append must fail for unknown conversation");
    assert!(matches!(error, DatabaseError::NotFound(_)));

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
        .fetch_one(&ctx.pool)
        .await?;
    assert_eq!(rows, 0);
    Ok(())
}

#[tokio::test]
async fn find_before_pages_backwards_without_overlap() -> TestResult {
    let ctx = TestContext::new().await?;
    let conversation = ctx
        .conversations()
        .create(&NewConversation::between(ParticipantPair::new("u1", "u2")))
        .await?;
    let repo = ctx.messages();
    for index in 0..5 {
        repo.append(&conversation.id, "u1", &format!("m{index}"), Utc::now())
            .await?;
    }

    let newest = repo.find_before(&conversation.id, None, 2).await?;
    let contents: Vec<&str> = newest.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["m4", "m3"]);

    let older = repo
        .find_before(&conversation.id, Some(newest[1].sent_at), 10)
        .await?;
    let contents: Vec<&str> = older.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["m2", "m1", "m0"]);
    assert_eq!(repo.count_for_conversation(&conversation.id).await?, 5);
    Ok(())
}

#[tokio::test]
async fn read_watermark_never_moves_backward() -> TestResult {
    let ctx = TestContext::new().await?;
    let conversation = ctx
        .conversations()
        .create(&NewConversation::between(ParticipantPair::new("u1", "u2")))
        .await?;
    let participants = ctx.participants();
    let later = Utc.with_ymd_and_hms(2031, 6, 1, 0, 0, 0).unwrap();
    let earlier = later - Duration::days(1);

    let first = participants.mark_read(&conversation.id, "u2", later).await?;
    let second = participants.mark_read(&conversation.id, "u2", earlier).await?;

    assert_eq!(first, later);
    assert_eq!(second, later);
    let stored = participants
        .find(&conversation.id, "u2")
        .await?
        .expect("participant exists");
    assert_eq!(stored.last_read_at, Some(later));
    Ok(())
}

#[tokio::test]
async fn mark_read_for_outsider_is_not_found() -> TestResult {
    let ctx = TestContext::new().await?;
    let conversation = ctx
        .conversations()
        .create(&NewConversation::between(ParticipantPair::new("u1", "u2")))
        .await?;

    let error = ctx
        .participants()
        .mark_read(&conversation.id, "u3", Utc::now())
        .await
        .expect_err("outsider cannot mark read");
    assert!(matches!(error, DatabaseError::NotFound(_)));
    assert!(!ctx.participants().is_participant(&conversation.id, "u3").await?);
    Ok(())
}

#[tokio::test]
async fn unread_flag_follows_watermark() -> TestResult {
    let ctx = TestContext::new().await?;
    let conversation = ctx
        .conversations()
        .create(&NewConversation::between(ParticipantPair::new("u1", "u2")))
        .await?;
    let participants = ctx.participants();

    assert!(!participants.is_unread(&conversation.id, "u2").await?);

    let message = ctx
        .messages()
        .append(&conversation.id, "u1", "ping", Utc::now())
        .await?;
    assert!(participants.is_unread(&conversation.id, "u2").await?);

    participants
        .mark_read(&conversation.id, "u2", message.sent_at)
        .await?;
    assert!(!participants.is_unread(&conversation.id, "u2").await?);
    Ok(())
}

#[tokio::test]
async fn mark_read_covers_messages_stamped_ahead_of_the_clock() -> TestResult {
    let ctx = TestContext::new().await?;
    let conversation = ctx
        .conversations()
        .create(&NewConversation::between(ParticipantPair::new("u1", "u2")))
        .await?;
    let participants = ctx.participants();
    let now = Utc::now();

    let mut last = None;
    for content in ["a", "b", "c"] {
        last = Some(
            ctx.messages()
                .append(&conversation.id, "u1", content, now + Duration::seconds(5))
                .await?,
        );
    }
    let last = last.expect("appended");
    assert!(last.sent_at > now);

    let watermark = participants.mark_read(&conversation.id, "u2", now).await?;

    assert_eq!(watermark, last.sent_at);
    assert!(!participants.is_unread(&conversation.id, "u2").await?);

    let next = ctx
        .messages()
        .append(&conversation.id, "u1", "d", now)
        .await?;
    assert!(next.sent_at > watermark);
    assert!(participants.is_unread(&conversation.id, "u2").await?);
    Ok(())
}

#[tokio::test]
async fn list_for_user_orders_by_recent_activity() -> TestResult {
    let ctx = TestContext::new().await?;
    let repo = ctx.conversations();
    let with_bob = repo
        .create(&NewConversation::between(ParticipantPair::new("u1", "u2")))
        .await?;
    let with_carol = repo
        .create(&NewConversation::between(ParticipantPair::new("u1", "u3")))
        .await?;

    ctx.messages()
        .append(&with_carol.id, "u3", "first", Utc::now())
        .await?;
    ctx.messages()
        .append(&with_bob.id, "u2", "latest", Utc::now() + Duration::seconds(1))
        .await?;

    let summaries = repo.list_for_user("u1").await?;
    assert_eq!(summaries.len(), 2);

    let top = &summaries[0];
    assert_eq!(top.conversation.id, with_bob.id);
    assert_eq!(
        top.counterpart.as_ref().map(|p| p.username.as_str()),
        Some("bob")
    );
    assert_eq!(
        top.last_message.as_ref().map(|m| m.content.as_str()),
        Some("latest")
    );
    assert!(top.is_unread);
    assert_eq!(summaries[1].conversation.id, with_carol.id);

    assert!(repo.list_for_user("nobody").await?.is_empty());
    Ok(())
}
