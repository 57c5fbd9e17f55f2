//! End-to-end portal flows through the service container
//!
//! Exercises the onboarding, visibility, social, and admin policies together
//! against an in-memory database and directory.

use std::sync::Arc;

use campus_hub::db::models::{badge_types, cycles, roles};
use campus_hub::db::notes::CreateNoteInput;
use campus_hub::db::{self, identities};
use campus_hub::services::OnboardingSubmission;
use campus_hub::{DirectoryProvider, InMemoryDirectory, PortalError, Services};

fn setup() -> (Services, Arc<InMemoryDirectory>) {
    let pool = db::open_in_memory_pool().unwrap();
    let directory = Arc::new(InMemoryDirectory::new());
    let services = Services::new(pool, directory.clone(), vec!["principal".to_string()]);
    (services, directory)
}

fn submission(name: &str, usn: &str, branch: &str, semester: &str, cycle: Option<&str>) -> OnboardingSubmission {
    OnboardingSubmission {
        full_name: name.to_string(),
        usn: usn.to_string(),
        branch: branch.to_string(),
        semester: semester.to_string(),
        cycle: cycle.map(str::to_string),
        email: None,
        bio: None,
    }
}

fn note(subject: &str, branch: &str, semester: &str, cycle: &str) -> CreateNoteInput {
    CreateNoteInput {
        title: format!("{} module 1", subject),
        url: "https://drive.example/n".to_string(),
        subject: subject.to_string(),
        branch: branch.to_string(),
        semester: semester.to_string(),
        note_type: "notes".to_string(),
        cycle: cycle.to_string(),
        uploaded_by: None,
    }
}

async fn onboard(services: &Services, id: &str, usn: &str, branch: &str, semester: &str, cycle: Option<&str>) {
    services
        .onboarding
        .complete_onboarding(id, submission(&format!("Student {}", id), usn, branch, semester, cycle))
        .await
        .unwrap();
}

#[tokio::test]
async fn onboarding_creates_exactly_one_identity() {
    let (services, directory) = setup();

    onboard(&services, "user-1", "4jc22cs001", "CSE", "3", None).await;

    let mut conn = db::get_conn(&services.pool).unwrap();
    assert_eq!(identities::identity_count(&mut conn).unwrap(), 1);

    let found = identities::find_by_usn(&mut conn, "4JC22CS001").unwrap().unwrap();
    assert_eq!(found.id, "user-1");
    assert_eq!(found.branch, "CSE");

    let mirrored = directory.get_profile("user-1").await.unwrap().unwrap();
    assert!(mirrored.onboarding_complete);
}

#[tokio::test]
async fn conflicting_usn_is_rejected_without_writes() {
    let (services, directory) = setup();

    onboard(&services, "user-1", "4JC22CS001", "CSE", "3", None).await;

    let result = services
        .onboarding
        .complete_onboarding("user-2", submission("Imposter", "4JC22CS001", "ECE", "5", None))
        .await;
    assert!(matches!(result, Err(PortalError::Conflict(_))));

    let mut conn = db::get_conn(&services.pool).unwrap();
    assert_eq!(identities::identity_count(&mut conn).unwrap(), 1);
    assert!(directory.get_profile("user-2").await.unwrap().is_none());
}

#[tokio::test]
async fn follow_toggle_round_trips_and_counts() {
    let (services, _) = setup();

    onboard(&services, "a", "4JC22CS001", "CSE", "3", None).await;
    onboard(&services, "b", "4JC22CS002", "CSE", "3", None).await;

    let baseline = services.social.follow_stats("b").unwrap();
    assert_eq!(baseline.follower_count, 0);

    let on = services.social.toggle_follow("a", "b").unwrap();
    assert!(on.following);
    assert!(services.social.is_following("a", "b").unwrap());
    assert_eq!(services.social.follow_stats("b").unwrap().follower_count, 1);

    let off = services.social.toggle_follow("a", "b").unwrap();
    assert!(!off.following);
    assert!(!services.social.is_following("a", "b").unwrap());

    let after = services.social.follow_stats("b").unwrap();
    assert_eq!(after.follower_count, 0);
    assert_eq!(after.following_count, 0);
}

#[tokio::test]
async fn follower_count_reflects_distinct_edges() {
    let (services, _) = setup();

    onboard(&services, "x", "4JC22CS010", "CSE", "3", None).await;
    for (id, usn) in [("f1", "4JC22CS011"), ("f2", "4JC22CS012"), ("f3", "4JC22CS013")] {
        onboard(&services, id, usn, "CSE", "3", None).await;
        services.social.toggle_follow(id, "x").unwrap();
    }

    let stats = services.social.follow_stats("x").unwrap();
    assert_eq!(stats.follower_count, 3);

    let followers = services.social.list_followers("x").unwrap();
    assert_eq!(followers.len(), 3);
}

#[tokio::test]
async fn entry_level_visibility_is_cycle_scoped() {
    let (services, _) = setup();

    onboard(&services, "p-viewer", "4JC25CS001", "CSE", "1", Some(cycles::P_CYCLE)).await;
    onboard(&services, "c-viewer", "4JC25CS002", "CSE", "1", Some(cycles::C_CYCLE)).await;
    onboard(&services, "uploader", "4JC25CS003", "CSE", "1", Some(cycles::P_CYCLE)).await;

    services
        .visibility
        .upload_note("uploader", note("Physics", "CSE", "1", cycles::P_CYCLE))
        .unwrap();

    let p_view = services.visibility.list_subject("p-viewer", "Physics").unwrap();
    assert_eq!(p_view.len(), 1);

    let c_view = services.visibility.list_subject("c-viewer", "Physics").unwrap();
    assert!(c_view.is_empty());
}

#[tokio::test]
async fn upper_semester_visibility_is_branch_scoped() {
    let (services, _) = setup();

    onboard(&services, "cse-5", "4JC22CS001", "CSE", "5", None).await;
    onboard(&services, "ece-5", "4JC22EC001", "ECE", "5", None).await;
    onboard(&services, "cse-3", "4JC23CS001", "CSE", "3", None).await;

    services
        .visibility
        .upload_note("cse-5", note("DBMS", "CSE", "5", cycles::NONE))
        .unwrap();

    assert_eq!(services.visibility.list_subject("cse-5", "DBMS").unwrap().len(), 1);
    assert!(services.visibility.list_subject("ece-5", "DBMS").unwrap().is_empty());
    assert!(services.visibility.list_subject("cse-3", "DBMS").unwrap().is_empty());
}

#[tokio::test]
async fn bulk_promote_moves_matching_semesters_only() {
    let (services, _) = setup();

    onboard(&services, "principal", "4JC00AD001", "CSE", "7", None).await;
    onboard(&services, "s1", "4JC23CS001", "CSE", "3", None).await;
    onboard(&services, "s2", "4JC23CS002", "CSE", "3", None).await;
    onboard(&services, "s3", "4JC23CS003", "CSE", "3", None).await;
    onboard(&services, "s4", "4JC22CS004", "CSE", "4", None).await;

    let outcome = services
        .admin
        .bulk_promote_semester("principal", "3", "4")
        .await
        .unwrap();
    assert_eq!(outcome.count, 3);
    assert_eq!(outcome.mirror_failures, 0);

    let mut conn = db::get_conn(&services.pool).unwrap();
    let at_four = identities::list_identities(
        &mut conn,
        &identities::IdentityQuery {
            semester: Some("4".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(at_four.len(), 4);

    let at_three = identities::list_identities(
        &mut conn,
        &identities::IdentityQuery {
            semester: Some("3".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(at_three.is_empty());
}

#[tokio::test]
async fn badge_grants_are_not_deduplicated() {
    let (services, _) = setup();

    onboard(&services, "principal", "4JC00AD001", "CSE", "7", None).await;

    services
        .admin
        .grant_badge("principal", "4JC22CS001", badge_types::CONTRIBUTOR)
        .unwrap();
    services
        .admin
        .grant_badge("principal", "4jc22cs001", badge_types::CONTRIBUTOR)
        .unwrap();

    let listed = services.admin.list_badges("4JC22CS001").unwrap();
    assert_eq!(listed.len(), 2);
}

#[tokio::test]
async fn admin_operations_refuse_students() {
    let (services, _) = setup();

    onboard(&services, "student", "4JC23CS001", "CSE", "3", None).await;

    assert!(matches!(
        services.admin.grant_badge("student", "4JC23CS001", badge_types::ELITE),
        Err(PortalError::Forbidden(_))
    ));
    assert!(matches!(
        services.admin.bulk_promote_semester("student", "3", "4").await,
        Err(PortalError::Forbidden(_))
    ));
    assert!(matches!(
        services
            .admin
            .bulk_switch_cycle("student", cycles::P_CYCLE, cycles::C_CYCLE)
            .await,
        Err(PortalError::Forbidden(_))
    ));
}

#[tokio::test]
async fn admin_allowlist_grants_role_at_onboarding() {
    let (services, _) = setup();

    onboard(&services, "principal", "4JC00AD001", "CSE", "7", None).await;

    let mut conn = db::get_conn(&services.pool).unwrap();
    let principal = identities::get_identity(&mut conn, "principal").unwrap().unwrap();
    assert_eq!(principal.role, roles::ADMIN);
}

#[tokio::test]
async fn sync_profile_repairs_from_directory() {
    let (services, directory) = setup();

    onboard(&services, "user-1", "4JC22CS001", "CSE", "3", None).await;

    // Simulate local loss by promoting through the directory only
    let mut profile = directory.get_profile("user-1").await.unwrap().unwrap();
    profile.semester = "5".to_string();
    directory.put_profile("user-1", &profile).await.unwrap();

    let repaired = services.onboarding.sync_profile("user-1").await.unwrap();
    assert_eq!(repaired.semester, "5");
}

#[tokio::test]
async fn profile_view_tracks_social_mutations() {
    let (services, _) = setup();

    onboard(&services, "x", "4JC22CS001", "CSE", "3", None).await;
    onboard(&services, "fan", "4JC22CS002", "CSE", "3", None).await;

    let before = services.social.profile("x").unwrap();
    assert_eq!(before["follower_count"].as_i64(), Some(0));

    services.social.toggle_follow("fan", "x").unwrap();

    let after = services.social.profile("x").unwrap();
    assert_eq!(after["follower_count"].as_i64(), Some(1));
}
