//! Integration tests for fit scoring and geographic gaps

mod helpers;

use cpl_common::events::PipelineEvent;
use cpl_common::geo::distance_miles;
use cpl_common::models::{EventStatus, OrganizationType, PartnerStatus};
use cpl_pipeline::services::OutreachConfig;
use helpers::*;
use uuid::Uuid;

async fn seed_events(
    ctx: &TestContext,
    city: &str,
    point: (f64, f64),
    count: usize,
    status: EventStatus,
) {
    for _ in 0..count {
        ctx.repos.events.add(event_at(city, point, status)).await.unwrap();
    }
}

#[test]
fn test_distance_reference_points() {
    assert_eq!(distance_miles(SEATTLE.0, SEATTLE.1, SEATTLE.0, SEATTLE.1), 0.0);

    let d = distance_miles(SEATTLE.0, SEATTLE.1, PORTLAND.0, PORTLAND.1);
    assert!((140.0..=150.0).contains(&d), "Seattle to Portland was {} miles", d);
}

#[tokio::test]
async fn test_total_is_sum_of_bounded_parts() {
    let ctx = TestContext::new(OutreachConfig::default());
    seed_events(&ctx, "Seattle", SEATTLE, 25, EventStatus::Active).await;
    ctx.repos.partners.add(partner_at("Portland Green", "Portland", PORTLAND)).await.unwrap();

    let mut candidates = vec![
        prospect("No Coordinates", OrganizationType::Hoa),
        prospect_at("Seattle Parks", "Seattle", SEATTLE),
        prospect_at("Spokane Civic", "Spokane", SPOKANE),
        prospect_at("Portland Friends", "Portland", PORTLAND),
    ];
    candidates[1].population = Some(750_000);
    candidates[2].organization_type = OrganizationType::parse("Chamber of Commerce");

    for candidate in candidates {
        let score = ctx.services.scoring.score(&candidate).await.unwrap();
        assert_eq!(
            score.total,
            score.type_score + score.population_score + score.density_score + score.gap_score
        );
        assert!(score.type_score <= 15);
        assert!(score.population_score <= 25);
        assert!(score.density_score <= 30);
        assert!(score.gap_score <= 30);
        assert!(score.total <= 100);
    }
}

#[tokio::test]
async fn test_density_counts_active_nearby_events_only() {
    let ctx = TestContext::new(OutreachConfig::default());
    seed_events(&ctx, "Seattle", SEATTLE, 3, EventStatus::Active).await;
    seed_events(&ctx, "Bellevue", BELLEVUE, 1, EventStatus::Completed).await;
    seed_events(&ctx, "Seattle", SEATTLE, 2, EventStatus::Cancelled).await;
    seed_events(&ctx, "Spokane", SPOKANE, 4, EventStatus::Active).await;

    let seattle = prospect_at("Seattle Parks", "Seattle", SEATTLE);
    assert_eq!(ctx.services.scoring.count_nearby_events(&seattle).await.unwrap(), 4);

    let score = ctx.services.scoring.score(&seattle).await.unwrap();
    // Nonprofit 12, unknown population 10, 4 events => 6, no partners => 30
    assert_eq!(score.type_score, 12);
    assert_eq!(score.population_score, 10);
    assert_eq!(score.density_score, 6);
    assert_eq!(score.gap_score, 30);
    assert_eq!(score.total, 58);
}

#[tokio::test]
async fn test_gap_score_uses_nearest_serving_partner() {
    let ctx = TestContext::new(OutreachConfig::default());
    let seattle = prospect_at("Seattle Parks", "Seattle", SEATTLE);

    ctx.repos.partners.add(partner_at("Portland Green", "Portland", PORTLAND)).await.unwrap();
    assert_eq!(ctx.services.scoring.score(&seattle).await.unwrap().gap_score, 30);

    let mut unlisted = partner_at("Quiet Crew", "Bellevue", BELLEVUE);
    unlisted.is_publicly_listed = false;
    ctx.repos.partners.add(unlisted).await.unwrap();
    let mut inactive = partner_at("Old Crew", "Seattle", SEATTLE);
    inactive.status = PartnerStatus::Inactive;
    ctx.repos.partners.add(inactive).await.unwrap();
    assert_eq!(ctx.services.scoring.score(&seattle).await.unwrap().gap_score, 30);

    ctx.repos.partners.add(partner_at("Eastside Crew", "Bellevue", BELLEVUE)).await.unwrap();
    assert_eq!(ctx.services.scoring.score(&seattle).await.unwrap().gap_score, 0);
}

#[tokio::test]
async fn test_unknown_location_scores_neutral_gap() {
    let ctx = TestContext::new(OutreachConfig::default());
    seed_events(&ctx, "Seattle", SEATTLE, 5, EventStatus::Active).await;

    let score = ctx
        .services
        .scoring
        .score(&prospect("Somewhere", OrganizationType::Municipality))
        .await
        .unwrap();
    assert_eq!(score.density_score, 0);
    assert_eq!(score.gap_score, 15);
    assert_eq!(score.total, 15 + 10 + 15);
}

#[tokio::test]
async fn test_calculate_fit_score_persists_and_emits() {
    let ctx = TestContext::new(OutreachConfig::default());
    let mut rx = ctx.event_bus.subscribe();
    let stored = ctx.add_prospect(prospect_at("Seattle Parks", "Seattle", SEATTLE)).await;
    assert_eq!(stored.fit_score.total, 0);

    let score = ctx.services.scoring.calculate_fit_score(stored.id).await.unwrap().unwrap();
    assert_eq!(ctx.reload(stored.id).await.fit_score, score);

    match rx.try_recv().unwrap() {
        PipelineEvent::ProspectScored { prospect_id, total, .. } => {
            assert_eq!(prospect_id, stored.id);
            assert_eq!(total, score.total);
        }
        other => panic!("Unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_calculate_fit_score_unknown_prospect() {
    let ctx = TestContext::new(OutreachConfig::default());
    let result = ctx.services.scoring.calculate_fit_score(Uuid::new_v4()).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_recalculate_writes_only_changed_scores() {
    let ctx = TestContext::new(OutreachConfig::default());
    let seattle = ctx.add_prospect(prospect_at("Seattle Parks", "Seattle", SEATTLE)).await;
    let spokane = ctx.add_prospect(prospect_at("Spokane Civic", "Spokane", SPOKANE)).await;

    assert_eq!(ctx.services.scoring.recalculate_all_scores(Uuid::nil()).await.unwrap(), 2);
    assert_eq!(ctx.services.scoring.recalculate_all_scores(Uuid::nil()).await.unwrap(), 0);

    // Events near Seattle change only the Seattle score
    seed_events(&ctx, "Seattle", SEATTLE, 2, EventStatus::Active).await;
    assert_eq!(ctx.services.scoring.recalculate_all_scores(Uuid::nil()).await.unwrap(), 1);

    assert_eq!(ctx.reload(seattle.id).await.fit_score.density_score, 3);
    assert_eq!(ctx.reload(spokane.id).await.fit_score.density_score, 0);
}

#[tokio::test]
async fn test_geographic_gaps_scenario() {
    let ctx = TestContext::new(OutreachConfig::default());
    seed_events(&ctx, "Seattle", SEATTLE, 2, EventStatus::Active).await;
    ctx.repos.partners.add(partner_at("Seattle Crew", "Seattle", SEATTLE)).await.unwrap();
    seed_events(&ctx, "Spokane", SPOKANE, 1, EventStatus::Active).await;
    seed_events(&ctx, "Portland", PORTLAND, 3, EventStatus::Cancelled).await;

    let gaps = ctx.services.scoring.get_geographic_gaps().await.unwrap();

    assert_eq!(gaps.len(), 1, "gaps: {:?}", gaps);
    assert_eq!(gaps[0].city, "Spokane");
    assert_eq!(gaps[0].event_count, 1);
    let nearest = gaps[0].nearest_partner_miles.unwrap();
    assert!(nearest > 200.0 && nearest < 250.0, "nearest partner {}", nearest);
}

#[tokio::test]
async fn test_gaps_group_cities_ignoring_case_and_sort_by_count() {
    let ctx = TestContext::new(OutreachConfig::default());
    seed_events(&ctx, "Spokane", SPOKANE, 1, EventStatus::Active).await;
    seed_events(&ctx, "Portland", PORTLAND, 1, EventStatus::Active).await;
    seed_events(&ctx, "PORTLAND", PORTLAND, 1, EventStatus::Full).await;

    let gaps = ctx.services.scoring.get_geographic_gaps().await.unwrap();

    assert_eq!(gaps.len(), 2);
    assert_eq!(gaps[0].city, "Portland");
    assert_eq!(gaps[0].event_count, 2);
    assert_eq!(gaps[0].nearest_partner_miles, None);
    assert_eq!(gaps[1].city, "Spokane");
}
