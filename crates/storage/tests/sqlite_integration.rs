use quest_core::model::{Activity, ActivityId, PlayRecordId, Question, Stage, ThemeConfig};
use storage::StorageError;
use storage::repository::{
    ActivityRepository, KeyValueStore, PlayCountRepository, PlayRecordRepository,
    PlayRecordUpdate,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn quest(id: u64) -> Activity {
    Activity::quest(
        ActivityId::new(id),
        "Cells",
        vec![Stage {
            title: "Basics".into(),
            lesson: "Cells are the unit of life.".into(),
            questions: vec![
                Question::multiple_choice("Powerhouse of the cell?", ["Nucleus", "Mitochondria"], 1, ""),
                Question::subjective("Name one organelle.", "Ribosome", "").with_points(30),
            ],
        }],
    )
    .with_theme(ThemeConfig::new(true, 90, true, 2).unwrap())
    .with_time_limit(60)
}

#[tokio::test]
async fn activities_round_trip_through_json_payload() {
    let repo = connect("memdb_activities").await;
    let original = quest(5);
    repo.upsert_activity(&original).await.unwrap();

    let fetched = repo.get_activity(ActivityId::new(5)).await.unwrap();
    assert_eq!(fetched, original);

    let mut renamed = original.clone();
    renamed.title = "Cells, revised".into();
    repo.upsert_activity(&renamed).await.unwrap();
    let listed = repo.list_activities(10).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title, "Cells, revised");

    let missing = repo.get_activity(ActivityId::new(6)).await;
    assert!(matches!(missing, Err(StorageError::NotFound)));
}

#[tokio::test]
async fn progress_slots_overwrite_and_delete() {
    let repo = connect("memdb_slots").await;
    assert!(repo.get("quest_progress_1").await.unwrap().is_none());

    repo.set("quest_progress_1", "{\"a\":1}").await.unwrap();
    repo.set("quest_progress_1", "{\"a\":2}").await.unwrap();
    assert_eq!(
        repo.get("quest_progress_1").await.unwrap().as_deref(),
        Some("{\"a\":2}")
    );

    repo.delete("quest_progress_1").await.unwrap();
    assert!(repo.get("quest_progress_1").await.unwrap().is_none());
}

#[tokio::test]
async fn play_records_and_counts_persist() {
    let repo = connect("memdb_records").await;
    let activity = ActivityId::new(3);

    let id = repo.record_play_start(activity).await.unwrap();
    let opened = repo.get_play_record(id).await.unwrap();
    assert_eq!(opened.activity_id, activity);
    assert_eq!(opened.score, None);
    assert!(!opened.completed);

    let update = PlayRecordUpdate {
        score: 180,
        completed: true,
        duration_secs: 75,
    };
    repo.update_play_record(id, &update).await.unwrap();
    let closed = repo.get_play_record(id).await.unwrap();
    assert_eq!(closed.score, Some(180));
    assert!(closed.completed);
    assert_eq!(closed.duration_secs, Some(75));

    let unknown = repo
        .update_play_record(PlayRecordId::generate(), &update)
        .await;
    assert!(matches!(unknown, Err(StorageError::NotFound)));

    assert_eq!(repo.play_count(activity).await.unwrap(), 0);
    assert_eq!(repo.increment_play_count(activity).await.unwrap(), 1);
    assert_eq!(repo.increment_play_count(activity).await.unwrap(), 2);
    assert_eq!(repo.play_count(activity).await.unwrap(), 2);
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = connect("memdb_migrate_twice").await;
    repo.migrate().await.expect("second migrate");
}
