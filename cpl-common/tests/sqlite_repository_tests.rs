//! Integration tests for the SQLite repository
//!
//! Exercises the keyed-entity contract (get, query, add, update) against a
//! real SQLite database, both in memory and on disk.

use cpl_common::db::{init_database, init_memory_database, SqliteRepository};
use cpl_common::models::{
    ActivityType, Location, OrganizationType, PipelineStage, Prospect, ProspectActivity,
    ProspectSource, Sentiment,
};
use cpl_common::{Error, Repository};
use tempfile::TempDir;
use uuid::Uuid;

fn sample_prospect(name: &str, city: &str) -> Prospect {
    let mut prospect = Prospect::new(
        name,
        OrganizationType::CivicOrg,
        Location::new(city, "OR", "United States").with_coordinates(45.52, -122.68),
        ProspectSource::Manual,
        Uuid::new_v4(),
    );
    prospect.population = Some(650_000);
    prospect.contact_email = Some("hello@example.org".to_string());
    prospect
}

#[tokio::test]
async fn test_round_trip_preserves_all_fields() {
    let pool = init_memory_database().await.unwrap();
    let repo: SqliteRepository<Prospect> = SqliteRepository::new(pool);

    let prospect = sample_prospect("Portland Neighbors", "Portland");
    repo.add(prospect.clone()).await.unwrap();

    let fetched = repo.get(prospect.id).await.unwrap().expect("prospect stored");
    assert_eq!(fetched, prospect);
}

#[tokio::test]
async fn test_get_missing_returns_none() {
    let pool = init_memory_database().await.unwrap();
    let repo: SqliteRepository<Prospect> = SqliteRepository::new(pool);

    assert!(repo.get(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_persists_changes() {
    let pool = init_memory_database().await.unwrap();
    let repo: SqliteRepository<Prospect> = SqliteRepository::new(pool);

    let mut prospect = repo.add(sample_prospect("Eugene Green", "Eugene")).await.unwrap();
    prospect.pipeline_stage = PipelineStage::Contacted;
    prospect.audit.touch(Uuid::new_v4());
    repo.update(prospect.clone()).await.unwrap();

    let fetched = repo.get(prospect.id).await.unwrap().unwrap();
    assert_eq!(fetched.pipeline_stage, PipelineStage::Contacted);
}

#[tokio::test]
async fn test_update_unknown_id_is_not_found() {
    let pool = init_memory_database().await.unwrap();
    let repo: SqliteRepository<Prospect> = SqliteRepository::new(pool);

    let result = repo.update(sample_prospect("Nobody", "Nowhere")).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_add_duplicate_id_is_rejected() {
    let pool = init_memory_database().await.unwrap();
    let repo: SqliteRepository<Prospect> = SqliteRepository::new(pool);

    let prospect = sample_prospect("Salem Cleanups", "Salem");
    repo.add(prospect.clone()).await.unwrap();
    assert!(matches!(repo.add(prospect).await, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn test_query_filters_in_insertion_order() {
    let pool = init_memory_database().await.unwrap();
    let repo: SqliteRepository<Prospect> = SqliteRepository::new(pool);

    for (name, city) in [("A", "Bend"), ("B", "Medford"), ("C", "Bend")] {
        repo.add(sample_prospect(name, city)).await.unwrap();
    }

    let in_bend = repo
        .query(&|p: &Prospect| p.location.city == "Bend")
        .await
        .unwrap();
    let names: Vec<&str> = in_bend.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["A", "C"]);
}

#[tokio::test]
async fn test_entity_types_use_separate_tables() {
    let pool = init_memory_database().await.unwrap();
    let prospects: SqliteRepository<Prospect> = SqliteRepository::new(pool.clone());
    let activities: SqliteRepository<ProspectActivity> = SqliteRepository::new(pool);

    let prospect = prospects.add(sample_prospect("Ashland", "Ashland")).await.unwrap();
    let mut reply = ProspectActivity::new(
        prospect.id,
        ActivityType::Reply,
        "Re: partnership",
        "Sounds great!",
        Uuid::nil(),
    );
    reply.sentiment = Some(Sentiment::Positive);
    activities.add(reply.clone()).await.unwrap();

    assert_eq!(prospects.all().await.unwrap().len(), 1);
    let stored = activities.all().await.unwrap();
    assert_eq!(stored, vec![reply]);
}

#[tokio::test]
async fn test_file_database_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("cpl.db");

    let prospect = sample_prospect("Corvallis Trails", "Corvallis");
    {
        let pool = init_database(&db_path).await.unwrap();
        let repo: SqliteRepository<Prospect> = SqliteRepository::new(pool.clone());
        repo.add(prospect.clone()).await.unwrap();
        pool.close().await;
    }

    let pool = init_database(&db_path).await.unwrap();
    let repo: SqliteRepository<Prospect> = SqliteRepository::new(pool);
    assert_eq!(repo.get(prospect.id).await.unwrap(), Some(prospect));
}
